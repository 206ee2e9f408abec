//! The console bridge: TCP server bootstrap, per-connection sessions, wire
//! framing, and the toolkit loaded into every session.

pub mod error;
pub mod server;
pub mod session;
pub mod toolkit;
pub mod transport;

pub use error::{BridgeError, BridgeResult};
pub use server::{start, BoundServer};
