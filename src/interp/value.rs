//! Dynamically typed values of the command language and their canonical rendering.

use crate::interp::error::{EvalError, EvalResult};
use crate::interp::eval::EvalCtx;
use crate::stack::cursor::FrameCursor;
use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Mutex};

const TAB: &str = "\t";

/// Longest collection rendering that stays on a single line.
pub const MAX_INLINE_WIDTH: usize = 80;

/// Shared handle to a live frame cursor. Mutated in place by `up()`/`down()`
/// so a cursor bound to a name keeps its navigation state between commands.
pub type FrameHandle = Arc<Mutex<FrameCursor>>;

/// A native function exposed into the builtin scope or resolved by `native(name)`.
#[derive(Clone, Copy)]
pub struct NativeFn {
    pub name: &'static str,
    pub call: fn(&mut EvalCtx<'_>, Vec<Value>) -> EvalResult<Value>,
}

impl Debug for NativeFn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    NativeFn(NativeFn),
    Frame(FrameHandle),
    /// Pre-rendered multi-line text, transmitted verbatim (never quoted).
    Verbatim(String),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::NativeFn(a), Value::NativeFn(b)) => a.name == b.name,
            (Value::Frame(a), Value::Frame(b)) => Arc::ptr_eq(a, b),
            (Value::Verbatim(a), Value::Verbatim(b)) => a == b,
            _ => false,
        }
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Unit => "unit",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::Bool(_) => "bool",
        Value::Str(_) => "str",
        Value::List(_) => "list",
        Value::Map(_) => "map",
        Value::NativeFn(_) => "native fn",
        Value::Frame(_) => "frame",
        Value::Verbatim(_) => "text",
    }
}

/// Canonical rendering: deterministic (map keys sorted), bounded line width,
/// strings quoted. This is what the operator sees as a command result.
pub fn render(value: &Value) -> String {
    render_at(value, 0)
}

/// Like [`render`] but strings and pre-rendered text stay raw.
/// Used by `print` and `str`.
pub fn display(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Verbatim(text) => text.clone(),
        _ => render(value),
    }
}

fn render_at(value: &Value, depth: usize) -> String {
    match value {
        Value::Unit => "()".to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => render_float(*v),
        Value::Bool(v) => v.to_string(),
        Value::Str(s) => format!("{s:?}"),
        Value::List(items) => {
            let inline = format!("[{}]", items.iter().map(render).join(", "));
            if inline.len() <= MAX_INLINE_WIDTH {
                return inline;
            }
            let tabs = TAB.repeat(depth + 1);
            let body = items
                .iter()
                .map(|item| format!("{tabs}{},", render_at(item, depth + 1)))
                .join("\n");
            format!("[\n{body}\n{}]", TAB.repeat(depth))
        }
        Value::Map(entries) => {
            let mut keys: Vec<&String> = entries.keys().collect();
            keys.sort();

            let inline = format!(
                "{{{}}}",
                keys.iter()
                    .map(|k| format!("{k:?}: {}", render(&entries[k.as_str()])))
                    .join(", ")
            );
            if inline.len() <= MAX_INLINE_WIDTH {
                return inline;
            }
            let tabs = TAB.repeat(depth + 1);
            let body = keys
                .iter()
                .map(|k| format!("{tabs}{k:?}: {},", render_at(&entries[k.as_str()], depth + 1)))
                .join("\n");
            format!("{{\n{body}\n{}}}", TAB.repeat(depth))
        }
        Value::NativeFn(f) => format!("<native fn {}>", f.name),
        Value::Frame(handle) => match handle.lock() {
            Ok(cursor) => cursor.context(),
            Err(_) => "<poisoned frame cursor>".to_string(),
        },
        Value::Verbatim(text) => text.clone(),
    }
}

fn render_float(value: f64) -> String {
    let repr = format!("{value}");
    if repr.contains(['.', 'e', 'n', 'i']) {
        repr
    } else {
        format!("{repr}.0")
    }
}

/// Coerce a call argument to a string key, for map indexing and lookups.
pub fn expect_str(value: &Value, what: &'static str) -> EvalResult<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(EvalError::Type(format!(
            "{what} must be a str, got {}",
            type_name(other)
        ))),
    }
}
