//! Wire framing for bridge messages: Content-Length framed JSON over TCP.
//! Both sides of the connection use the same [`Transport`].

use crate::bridge::error::{BridgeError, BridgeResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

/// Upper bound on a framed payload. A header announcing more is rejected
/// before anything is allocated for it.
const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// One command submitted by the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRequest {
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvalResponse {
    /// Outcome of one command. `more` asks the operator console to keep
    /// accumulating input lines before resubmitting.
    Result { more: bool, output: String },
    /// The session cannot continue; the connection closes after this.
    Fault { message: String },
}

pub struct Transport {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Transport {
    pub fn new(stream: TcpStream) -> BridgeResult<Self> {
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            reader,
            writer: stream,
        })
    }

    pub fn read_request(&mut self) -> BridgeResult<EvalRequest> {
        read_frame(&mut self.reader)
    }

    pub fn write_request(&mut self, request: &EvalRequest) -> BridgeResult<()> {
        write_frame(&mut self.writer, request)
    }

    pub fn read_response(&mut self) -> BridgeResult<EvalResponse> {
        read_frame(&mut self.reader)
    }

    pub fn write_response(&mut self, response: &EvalResponse) -> BridgeResult<()> {
        write_frame(&mut self.writer, response)
    }
}

fn read_frame<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> BridgeResult<T> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let read_n = reader.read_line(&mut line)?;
        if read_n == 0 {
            return Err(BridgeError::Disconnected);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if let Some(v) = line.strip_prefix("Content-Length:") {
            let len = v
                .trim()
                .parse()
                .map_err(|_| BridgeError::Protocol(format!("bad Content-Length `{line}`")))?;
            content_length = Some(len);
        }
    }

    let len =
        content_length.ok_or_else(|| BridgeError::Protocol("missing Content-Length".into()))?;
    if len > MAX_FRAME_LEN {
        return Err(BridgeError::Protocol(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"
        )));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(serde_json::from_slice(&buf)?)
}

fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> BridgeResult<()> {
    let payload = serde_json::to_vec(message)?;
    write!(writer, "Content-Length: {}\r\n\r\n", payload.len())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}
