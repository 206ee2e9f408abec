//! Interactive operator console.
//!
//! A thin rustyline loop over the bridge transport: lines are accumulated
//! while the server reports an incomplete fragment, a completed command goes
//! into history as one entry.

pub mod print;

use crate::bridge::error::BridgeError;
use crate::bridge::transport::{EvalRequest, EvalResponse, Transport};
use crate::console::print::style::{BannerView, EndpointView, ErrorView};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::net::TcpStream;

const PROMPT: &str = "(spy) ";
const CONTINUATION_PROMPT: &str = "  ... ";

/// Attach an interactive console to a bridge at `host:port` and serve the
/// operator until Ctrl-D or a fatal session fault.
pub fn connect(host: &str, port: u16) -> anyhow::Result<()> {
    let stream = TcpStream::connect((host, port))?;
    let mut transport = Transport::new(stream)?;
    println!("connected to {}", EndpointView::from(format!("{host}:{port}")));

    // The toolkit binds a banner; asking for it doubles as the load-fault
    // check, since a broken toolkit answers the first request with a fault.
    match submit(&mut transport, "print(banner)")? {
        EvalResponse::Result { output, .. } => print!("{}", BannerView::from(output)),
        EvalResponse::Fault { message } => {
            println!("{}", ErrorView::from(&message));
            return Err(BridgeError::RemoteFault(message).into());
        }
    }

    let mut editor = DefaultEditor::new()?;
    let mut pending = String::new();
    loop {
        let prompt = if pending.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        };
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                pending.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        if !pending.is_empty() {
            pending.push('\n');
        }
        pending.push_str(&line);

        match submit(&mut transport, &pending)? {
            EvalResponse::Result { more: true, .. } => {}
            EvalResponse::Result { more: false, output } => {
                let _ = editor.add_history_entry(&pending);
                pending.clear();
                print!("{output}");
            }
            EvalResponse::Fault { message } => {
                println!("{}", ErrorView::from(&message));
                return Err(BridgeError::RemoteFault(message).into());
            }
        }
    }

    Ok(())
}

fn submit(transport: &mut Transport, source: &str) -> anyhow::Result<EvalResponse> {
    transport.write_request(&EvalRequest {
        source: source.to_string(),
    })?;
    Ok(transport.read_response()?)
}
