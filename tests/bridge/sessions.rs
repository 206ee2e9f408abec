use crate::common::{hold_frames, TestClient};
use serial_test::serial;
use spyglass::bridge;
use spyglass::bridge::transport::EvalResponse;

#[test]
#[serial]
fn test_command_round_trip() {
    let server = bridge::start(0).unwrap();
    let mut client = TestClient::connect(server.port);

    assert_eq!(client.eval_output("1 + 1"), "2\n");
    assert_eq!(client.eval_output("print('hi')"), "hi\n");
    assert_eq!(client.eval_output("x = 5"), "");
    assert_eq!(client.eval_output("x"), "5\n");
    assert_eq!(client.eval_output("print(x)\n"), "5\n");
}

#[test]
#[serial]
fn test_fault_is_textual_and_session_survives() {
    let server = bridge::start(0).unwrap();
    let mut client = TestClient::connect(server.port);

    client.eval_output("x = 3");
    assert_eq!(client.eval_output("x / 0"), "error: division by zero\n");
    assert_eq!(client.eval_output("unbound"), "error: unbound not found\n");
    // Bindings made before the fault are intact.
    assert_eq!(client.eval_output("x"), "3\n");
}

#[test]
#[serial]
fn test_incomplete_fragment_accumulates() {
    let server = bridge::start(0).unwrap();
    let mut client = TestClient::connect(server.port);

    let response = client.eval("xs = [1,");
    assert_eq!(
        response,
        EvalResponse::Result {
            more: true,
            output: String::new()
        }
    );

    assert_eq!(client.eval_output("xs = [1,\n2, 3]"), "");
    assert_eq!(client.eval_output("len(xs)"), "3\n");
}

#[test]
#[serial]
fn test_sessions_are_isolated() {
    let server = bridge::start(0).unwrap();
    let mut first = TestClient::connect(server.port);
    let mut second = TestClient::connect(server.port);

    first.eval_output("secret = 41");
    assert_eq!(second.eval_output("secret"), "error: secret not found\n");

    // Identical source against fresh namespaces behaves identically.
    assert_eq!(first.eval_output("7 * 6"), second.eval_output("7 * 6"));
}

#[test]
#[serial]
fn test_toolkit_banner_is_bound() {
    let server = bridge::start(0).unwrap();
    let mut client = TestClient::connect(server.port);

    let banner = client.eval_output("print(banner)");
    assert!(banner.contains("spyglass console"), "banner: {banner}");
}

#[test]
#[serial]
fn test_thread_dump_shows_instrumented_threads() {
    let main_hold = hold_frames("dump-main", vec!["main_outer", "main_inner"]);
    let worker_hold = hold_frames("dump-worker", vec!["worker_loop"]);

    let server = bridge::start(0).unwrap();
    let mut client = TestClient::connect(server.port);

    let dump = client.eval_output("threads()");
    assert!(dump.contains("\"dump-main\""), "dump: {dump}");
    assert!(dump.contains("\"dump-worker\""), "dump: {dump}");
    assert!(dump.contains("worker_loop"));

    // Innermost frame first within a thread block.
    let inner = dump.find("main_inner").unwrap();
    let outer = dump.find("main_outer").unwrap();
    assert!(inner < outer, "dump: {dump}");

    // Selector narrows the dump to one thread.
    let dump = client.eval_output("threads('dump-worker')");
    assert!(dump.contains("\"dump-worker\""));
    assert!(!dump.contains("\"dump-main\""));

    let missing = client.eval_output("threads('no-such-thread')");
    assert!(missing.starts_with("error: no thread matches"));

    drop(worker_hold);
    drop(main_hold);
}

#[test]
#[serial]
fn test_frame_cursor_over_the_wire() {
    let hold = hold_frames("cursor-wire", vec!["wire_outer", "wire_inner"]);

    let server = bridge::start(0).unwrap();
    let mut client = TestClient::connect(server.port);

    assert_eq!(client.eval_output("q = frame('cursor-wire')"), "");
    assert_eq!(client.eval_output("q['ticks']"), "7\n");

    // Rendering a frame shows the context of its active frame.
    assert!(client.eval_output("q").contains("wire_inner"));

    assert!(client.eval_output("q.up()").contains("wire_outer"));
    // Outermost frame: up() stays put.
    assert!(client.eval_output("q.up()").contains("wire_outer"));
    assert!(client.eval_output("q.down()").contains("wire_inner"));

    assert!(client.eval_output("q.locals()").contains("ticks"));

    // The cursor is read-only.
    assert_eq!(
        client.eval_output("q['ticks'] = 0"),
        "error: unsupported operation: frame cursor is read-only, investigation only\n"
    );

    drop(hold);
}

#[test]
#[serial]
fn test_heap_report_over_the_wire() {
    let server = bridge::start(0).unwrap();
    let mut client = TestClient::connect(server.port);

    let report = client.eval_output("heap()");
    assert!(report.contains("resident:"), "report: {report}");
    assert!(report.contains("virtual:"), "report: {report}");
}
