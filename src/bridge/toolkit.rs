//! The session toolkit: native introspection functions plus the prelude that
//! binds them into every session namespace.
//!
//! The prelude is ordinary command-language source and loads through the
//! normal interpreter path, so a broken prelude or an unregistered native
//! surfaces as a load fault instead of a half-initialized session.

use crate::bridge::error::{BridgeError, BridgeResult};
use crate::interp::error::{EvalError, EvalResult};
use crate::interp::eval::EvalCtx;
use crate::interp::namespace::Namespace;
use crate::interp::value::{type_name, NativeFn, Value};
use crate::interp::Interpreter;
use crate::stack::heap::heap_stats;
use crate::stack::{registry, render_stack_dump, FrameCursor, ThreadSelector};
use std::sync::{Arc, Mutex};

pub const PRELUDE: &str = "\
frame = native('frame')
threads = native('threads')
heap = native('heap')
banner = 'spyglass console. threads() dumps stacks, frame(thread?) opens a cursor, heap() reports memory.'
";

/// Native functions the prelude resolves through `native(name)`.
pub fn natives() -> Vec<NativeFn> {
    vec![
        NativeFn {
            name: "frame",
            call: native_frame,
        },
        NativeFn {
            name: "threads",
            call: native_threads,
        },
        NativeFn {
            name: "heap",
            call: native_heap,
        },
    ]
}

/// Compile the prelude into a scratch namespace and merge its bindings into
/// the session namespace. Run once per session, before the first command.
pub fn load(interpreter: &Interpreter, ns: &mut Namespace) -> BridgeResult<()> {
    let mut scratch = Namespace::new();
    for line in PRELUDE.lines() {
        interpreter
            .execute_strict(line, &mut scratch)
            .map_err(BridgeError::ToolkitLoad)?;
    }
    for (name, value) in scratch.into_bindings() {
        ns.insert(name, value);
    }
    Ok(())
}

/// A thread selector argument: an id, a name substring, or nothing.
fn selector_arg(callee: &str, args: &[Value]) -> EvalResult<Option<ThreadSelector>> {
    match args {
        [] => Ok(None),
        [Value::Int(id)] if *id >= 0 => Ok(Some(ThreadSelector::Id(*id as u64))),
        [Value::Str(name)] => Ok(Some(ThreadSelector::Name(name.clone()))),
        [other] => Err(EvalError::Type(format!(
            "thread selector must be an id or a name substring, got {}",
            type_name(other)
        ))),
        _ => Err(EvalError::Arity {
            callee: callee.to_string(),
            expected: "at most one",
            got: args.len(),
        }),
    }
}

fn native_frame(_ctx: &mut EvalCtx<'_>, args: Vec<Value>) -> EvalResult<Value> {
    let selector = selector_arg("frame", &args)?;
    let cursor = FrameCursor::focus(selector.as_ref())?;
    Ok(Value::Frame(Arc::new(Mutex::new(cursor))))
}

fn native_threads(_ctx: &mut EvalCtx<'_>, args: Vec<Value>) -> EvalResult<Value> {
    let selector = selector_arg("threads", &args)?;
    let dumps = registry().snapshot(selector.as_ref())?;
    Ok(Value::Verbatim(render_stack_dump(&dumps)))
}

fn native_heap(_ctx: &mut EvalCtx<'_>, args: Vec<Value>) -> EvalResult<Value> {
    if !args.is_empty() {
        return Err(EvalError::Arity {
            callee: "heap".to_string(),
            expected: "no",
            got: args.len(),
        });
    }
    Ok(Value::Verbatim(heap_stats()?))
}
