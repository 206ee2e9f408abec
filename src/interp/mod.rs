//! Command interpreter: a small dynamically typed command language evaluated
//! against a persistent per-session namespace.
//!
//! Each submitted command is classified as an expression, a statement, or an
//! incomplete fragment. Expressions are rewritten into an assignment to a
//! reserved result slot so their value survives evaluation and can be
//! rendered after any output the command produced.

pub mod error;
pub mod eval;
pub mod namespace;
pub mod parser;
pub mod value;

use self::error::{EvalError, EvalResult};
use self::eval::{eval_expr, exec_stmt, EvalCtx};
use self::namespace::{Namespace, RESULT_SLOT};
use self::parser::{classify, Classified};
use self::value::{render, NativeFn, Value};
use std::collections::HashMap;

/// Result of interpreting one command.
#[derive(Debug, Default, PartialEq)]
pub struct CommandOutcome {
    /// Source was an incomplete fragment, the caller should accumulate more
    /// lines and resubmit.
    pub more_input: bool,
    /// Everything the command printed, in order.
    pub output: String,
    /// Rendering of the expression value, if the command was an expression
    /// that produced one. Suppressed for `()`.
    pub value: Option<String>,
}

impl CommandOutcome {
    fn incomplete() -> Self {
        CommandOutcome {
            more_input: true,
            ..Default::default()
        }
    }
}

/// Stateless command interpreter. Namespaces are owned by callers, so a
/// single interpreter serves any number of concurrent sessions.
pub struct Interpreter {
    natives: HashMap<&'static str, NativeFn>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            natives: HashMap::new(),
        }
    }

    /// An interpreter whose `native(name)` builtin resolves the given
    /// host-provided functions.
    pub fn with_natives(natives: impl IntoIterator<Item = NativeFn>) -> Self {
        Self {
            natives: natives.into_iter().map(|f| (f.name, f)).collect(),
        }
    }

    /// Interpret one command against `ns`. Faults never escape: a failed
    /// parse or evaluation is reported inside the outcome's output, the
    /// session stays usable and the namespace keeps every binding made
    /// before the fault.
    pub fn execute(&self, source: &str, ns: &mut Namespace) -> CommandOutcome {
        match self.run(source, ns) {
            Ok(outcome) => outcome,
            Err(e) => CommandOutcome {
                more_input: false,
                output: format!("error: {e}\n"),
                value: None,
            },
        }
    }

    /// Like [`Self::execute`] but faults propagate to the caller and an
    /// incomplete fragment is an error. Used for toolkit sources, which are
    /// trusted to be complete and must fail loudly when they are not.
    pub fn execute_strict(&self, source: &str, ns: &mut Namespace) -> EvalResult<CommandOutcome> {
        let outcome = self.run(source, ns)?;
        if outcome.more_input {
            return Err(EvalError::TruncatedSource);
        }
        Ok(outcome)
    }

    fn run(&self, source: &str, ns: &mut Namespace) -> EvalResult<CommandOutcome> {
        if source.trim().is_empty() {
            return Ok(CommandOutcome::default());
        }

        let mut output = String::new();
        let mut ctx = EvalCtx {
            out: &mut output,
            natives: &self.natives,
        };

        let value = match classify(source)? {
            Classified::Incomplete => return Ok(CommandOutcome::incomplete()),
            Classified::Statement(stmt) => {
                exec_stmt(&mut ctx, ns, &stmt)?;
                None
            }
            Classified::Expression(expr) => {
                // Capture through the result slot so the value is observable
                // in the namespace afterwards, then clear the slot.
                let value = eval_expr(&mut ctx, ns, &expr)?;
                ns.insert(RESULT_SLOT, value);
                match ns.remove(RESULT_SLOT) {
                    Some(Value::Unit) | None => None,
                    Some(value) => Some(render(&value)),
                }
            }
        };

        Ok(CommandOutcome {
            more_input: false,
            output,
            value,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_expression_value_is_separate_from_output() {
        let interp = Interpreter::new();
        let mut ns = Namespace::new();

        let outcome = interp.execute("1 + 1", &mut ns);
        assert_eq!(outcome.value.as_deref(), Some("2"));
        assert_eq!(outcome.output, "");
        assert!(!outcome.more_input);
    }

    #[test]
    fn test_output_precedes_value() {
        let interp = Interpreter::new();
        let mut ns = Namespace::new();

        let outcome = interp.execute("print(len([1, 2, 3]))", &mut ns);
        assert_eq!(outcome.output, "3\n");
        assert_eq!(outcome.value, None);
    }

    #[test]
    fn test_statement_produces_no_value() {
        let interp = Interpreter::new();
        let mut ns = Namespace::new();

        let outcome = interp.execute("x = 41", &mut ns);
        assert_eq!(outcome.value, None);
        assert_eq!(outcome.output, "");

        let outcome = interp.execute("x + 1", &mut ns);
        assert_eq!(outcome.value.as_deref(), Some("42"));
    }

    #[test]
    fn test_fault_is_reported_not_fatal() {
        let interp = Interpreter::new();
        let mut ns = Namespace::new();

        interp.execute("x = 1", &mut ns);
        let outcome = interp.execute("x / 0", &mut ns);
        assert_eq!(outcome.output, "error: division by zero\n");
        assert_eq!(outcome.value, None);

        // Session stays usable, bindings survive.
        let outcome = interp.execute("x", &mut ns);
        assert_eq!(outcome.value.as_deref(), Some("1"));
    }

    #[test]
    fn test_incomplete_fragment_asks_for_more() {
        let interp = Interpreter::new();
        let mut ns = Namespace::new();

        let outcome = interp.execute("xs = [1,", &mut ns);
        assert!(outcome.more_input);
        assert_eq!(outcome.output, "");

        let outcome = interp.execute("xs = [1,\n2]", &mut ns);
        assert!(!outcome.more_input);
        assert_eq!(interp.execute("len(xs)", &mut ns).value.as_deref(), Some("2"));
    }

    #[test]
    fn test_blank_command_is_a_no_op() {
        let interp = Interpreter::new();
        let mut ns = Namespace::new();

        let outcome = interp.execute("  \n", &mut ns);
        assert_eq!(outcome, CommandOutcome::default());
    }

    #[test]
    fn test_strict_rejects_fragment_and_fault() {
        let interp = Interpreter::new();
        let mut ns = Namespace::new();

        assert!(matches!(
            interp.execute_strict("[1,", &mut ns),
            Err(EvalError::TruncatedSource)
        ));
        assert!(matches!(
            interp.execute_strict("1 / 0", &mut ns),
            Err(EvalError::DivisionByZero)
        ));
        assert!(interp.execute_strict("greeting = 'hi'", &mut ns).is_ok());
    }

    #[test]
    fn test_result_slot_not_left_behind() {
        let interp = Interpreter::new();
        let mut ns = Namespace::new();

        interp.execute("1 + 1", &mut ns);
        assert!(ns.get(super::RESULT_SLOT).is_none());
    }
}
