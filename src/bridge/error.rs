use crate::interp::error::EvalError;
use std::io;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    // --------------------------------- bootstrap -------------------------------------------------
    #[error("bind failed: {0}")]
    Bind(#[source] io::Error),
    #[error("server did not report a port within {0:?}")]
    BootstrapTimeout(Duration),

    // --------------------------------- session / transport ---------------------------------------
    #[error("peer disconnected")]
    Disconnected,
    #[error("malformed message: {0}")]
    Protocol(String),
    #[error("toolkit load failed: {0}")]
    ToolkitLoad(#[source] EvalError),
    #[error("remote fault: {0}")]
    RemoteFault(String),

    // --------------------------------- passthrough -----------------------------------------------
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// True for the one bootstrap fault worth a retry: the preferred port is
    /// taken and an OS-assigned one will do.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BridgeError::Bind(e) if e.kind() == io::ErrorKind::AddrInUse)
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
