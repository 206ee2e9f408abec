//! One operator session: toolkit load, then a strictly sequential
//! request/response command loop over a framed transport.

use crate::bridge::error::{BridgeError, BridgeResult};
use crate::bridge::toolkit;
use crate::bridge::transport::{EvalResponse, Transport};
use crate::interp::namespace::Namespace;
use crate::interp::{CommandOutcome, Interpreter};
use crate::spy_info;
use std::net::TcpStream;

/// Serve one connection until the peer disconnects. Each session owns an
/// isolated namespace seeded from the toolkit prelude; a prelude fault is
/// reported to the peer and ends only this connection.
pub fn run(stream: TcpStream, interpreter: &Interpreter) -> BridgeResult<()> {
    let peer = stream.peer_addr()?;
    let mut transport = Transport::new(stream)?;

    let mut ns = Namespace::new();
    if let Err(fault) = toolkit::load(interpreter, &mut ns) {
        transport.write_response(&EvalResponse::Fault {
            message: fault.to_string(),
        })?;
        return Err(fault);
    }
    spy_info!(target: "bridge", "session with {peer} opened");

    loop {
        let request = match transport.read_request() {
            Ok(request) => request,
            Err(BridgeError::Disconnected) => break,
            Err(fault) => return Err(fault),
        };
        let outcome = interpreter.execute(&request.source, &mut ns);
        transport.write_response(&render_response(outcome))?;
    }

    spy_info!(target: "bridge", "session with {peer} closed");
    Ok(())
}

/// Flatten an outcome for the wire: printed output first, then the rendered
/// expression value on its own line.
fn render_response(outcome: CommandOutcome) -> EvalResponse {
    let mut output = outcome.output;
    if let Some(value) = outcome.value {
        output.push_str(&value);
        output.push('\n');
    }
    EvalResponse::Result {
        more: outcome.more_input,
        output,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_output_precedes_value_on_the_wire() {
        let response = render_response(CommandOutcome {
            more_input: false,
            output: "hi\n".to_string(),
            value: Some("42".to_string()),
        });
        assert_eq!(
            response,
            EvalResponse::Result {
                more: false,
                output: "hi\n42\n".to_string()
            }
        );
    }

    #[test]
    fn test_incomplete_outcome_asks_for_more() {
        let response = render_response(CommandOutcome {
            more_input: true,
            output: String::new(),
            value: None,
        });
        assert_eq!(
            response,
            EvalResponse::Result {
                more: true,
                output: String::new()
            }
        );
    }
}
