use spyglass::bridge::transport::{EvalRequest, EvalResponse, Transport};
use spyglass::interp::value::Value;
use spyglass::stack::FrameGuard;
use std::net::TcpStream;
use std::sync::mpsc;
use std::thread;
use std::thread::JoinHandle;

/// A console client talking the bridge wire protocol.
pub struct TestClient {
    transport: Transport,
}

impl TestClient {
    pub fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port)).expect("connect to bridge");
        Self {
            transport: Transport::new(stream).expect("transport"),
        }
    }

    pub fn eval(&mut self, source: &str) -> EvalResponse {
        self.transport
            .write_request(&EvalRequest {
                source: source.to_string(),
            })
            .expect("send request");
        self.transport.read_response().expect("read response")
    }

    /// Evaluate a complete command and return its output text.
    pub fn eval_output(&mut self, source: &str) -> String {
        match self.eval(source) {
            EvalResponse::Result {
                more: false,
                output,
            } => output,
            other => panic!("unexpected response to `{source}`: {other:?}"),
        }
    }
}

/// A named thread holding a chain of live frames until released. The
/// innermost frame publishes a `ticks` local.
pub struct FrameHold {
    release: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

pub fn hold_frames(thread_name: &str, functions: Vec<&'static str>) -> FrameHold {
    let (release_tx, release_rx) = mpsc::channel();
    let (ready_tx, ready_rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name(thread_name.to_string())
        .spawn(move || {
            let guards: Vec<FrameGuard> = functions
                .iter()
                .map(|function| FrameGuard::new(function, file!(), line!()))
                .collect();
            if let Some(innermost) = guards.last() {
                innermost.publish_local("ticks", Value::Int(7));
            }
            ready_tx.send(()).expect("report readiness");
            let _ = release_rx.recv();
            drop(guards);
        })
        .expect("spawn frame holder");
    ready_rx.recv().expect("await frame holder");
    FrameHold {
        release: release_tx,
        handle: Some(handle),
    }
}

impl Drop for FrameHold {
    fn drop(&mut self) {
        let _ = self.release.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
