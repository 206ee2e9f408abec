use serial_test::serial;
use spyglass::bridge;
use std::net::{TcpListener, TcpStream};

#[test]
#[serial]
fn test_start_reports_reachable_port() {
    let server = bridge::start(0).unwrap();
    assert_ne!(server.port, 0);
    TcpStream::connect(("127.0.0.1", server.port)).unwrap();
}

#[test]
#[serial]
fn test_occupied_port_falls_back_to_os_assigned() {
    // Occupy a port, then ask the bridge for exactly that one.
    let blocker = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let taken = blocker.local_addr().unwrap().port();

    let server = bridge::start(taken).unwrap();
    assert_ne!(server.port, 0);
    assert_ne!(server.port, taken);
    TcpStream::connect(("127.0.0.1", server.port)).unwrap();

    drop(blocker);
}
