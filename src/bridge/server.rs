//! Server bootstrap and accept loop.
//!
//! The accept thread owns the listener; the caller learns the bound port (or
//! the bind fault) through shared [`ServerState`], polled on a short
//! interval. This keeps `start` synchronous for embedders while the server
//! itself never blocks the caller's thread.

use crate::bridge::error::{BridgeError, BridgeResult};
use crate::bridge::{session, toolkit};
use crate::interp::Interpreter;
use crate::{record_frame, spy_info, spy_warn, weak_error};
use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Upper bound on the bootstrap rendezvous. Binding either succeeds or fails
/// almost immediately; hitting this means the accept thread wedged.
const BOOTSTRAP_CEILING: Duration = Duration::from_secs(5);

/// A running console server. The accept thread is detached and serves
/// connections for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundServer {
    pub port: u16,
}

#[derive(Default)]
struct ServerState {
    /// Zero until the listener is bound.
    bound_port: AtomicU16,
    failed: AtomicBool,
    error: Mutex<Option<BridgeError>>,
}

impl ServerState {
    fn report_bound(&self, port: u16) {
        self.bound_port.store(port, Ordering::Release);
    }

    fn report_failure(&self, fault: BridgeError) {
        if let Ok(mut slot) = self.error.lock() {
            *slot = Some(fault);
        }
        self.failed.store(true, Ordering::Release);
    }

    fn take_error(&self) -> BridgeError {
        self.error
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or_else(|| {
                BridgeError::Bind(io::Error::other("accept thread failed without a report"))
            })
    }
}

/// Start the console server on `preferred_port` (0 = OS-assigned) and wait
/// until it is reachable. Returns the actually bound port, which differs from
/// the preferred one when that port was taken.
pub fn start(preferred_port: u16) -> BridgeResult<BoundServer> {
    let state = Arc::new(ServerState::default());
    let accept_state = state.clone();
    thread::Builder::new()
        .name("spy-accept".to_string())
        .spawn(move || accept_loop(accept_state, preferred_port))?;

    let begun = Instant::now();
    loop {
        let port = state.bound_port.load(Ordering::Acquire);
        if port != 0 {
            return Ok(BoundServer { port });
        }
        if state.failed.load(Ordering::Acquire) {
            return Err(state.take_error());
        }
        if begun.elapsed() >= BOOTSTRAP_CEILING {
            return Err(BridgeError::BootstrapTimeout(BOOTSTRAP_CEILING));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn accept_loop(state: Arc<ServerState>, preferred_port: u16) {
    let _frame = record_frame!("accept_loop");

    let listener = match bind(preferred_port) {
        Ok(listener) => listener,
        Err(fault) => {
            state.report_failure(fault);
            return;
        }
    };
    match listener.local_addr() {
        Ok(addr) => {
            spy_info!(target: "bridge", "console server listening on {addr}");
            state.report_bound(addr.port());
        }
        Err(e) => {
            state.report_failure(e.into());
            return;
        }
    }

    let interpreter = Arc::new(Interpreter::with_natives(toolkit::natives()));
    let mut session_no: u64 = 0;
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                spy_warn!(target: "bridge", "accept failed: {e}");
                continue;
            }
        };
        session_no += 1;
        weak_error!(spawn_session(stream, interpreter.clone(), session_no));
    }
}

fn spawn_session(
    stream: TcpStream,
    interpreter: Arc<Interpreter>,
    session_no: u64,
) -> BridgeResult<()> {
    thread::Builder::new()
        .name(format!("spy-session-{session_no}"))
        .spawn(move || {
            let _frame = record_frame!("session_worker");
            weak_error!(session::run(stream, &interpreter), "session ended:");
        })?;
    Ok(())
}

/// Bind the preferred port; when it is already taken, retry exactly once with
/// an OS-assigned port. Any other fault is final.
fn bind(preferred_port: u16) -> BridgeResult<TcpListener> {
    match TcpListener::bind(("127.0.0.1", preferred_port)).map_err(BridgeError::Bind) {
        Ok(listener) => Ok(listener),
        Err(fault) if fault.is_recoverable() && preferred_port != 0 => {
            spy_warn!(
                target: "bridge",
                "port {preferred_port} is taken, falling back to an os-assigned one"
            );
            TcpListener::bind(("127.0.0.1", 0)).map_err(BridgeError::Bind)
        }
        Err(fault) => Err(fault),
    }
}
