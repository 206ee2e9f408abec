//! Tree-walking evaluator over a session namespace.

use crate::interp::error::{EvalError, EvalResult};
use crate::interp::namespace::{Namespace, Scope, ScopeChain};
use crate::interp::parser::{BinOp, Expr, Stmt, UnaryOp};
use crate::interp::value::{display, expect_str, type_name, NativeFn, Value};
use indexmap::IndexMap;
use itertools::Itertools;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Evaluation context: the per-command output sink plus the native functions
/// resolvable through `native(name)`.
pub struct EvalCtx<'a> {
    pub out: &'a mut String,
    pub natives: &'a HashMap<&'static str, NativeFn>,
}

/// Builtin scope, searched after session bindings.
pub static BUILTINS: Lazy<HashMap<&'static str, NativeFn>> = Lazy::new(|| {
    let table: [NativeFn; 6] = [
        NativeFn {
            name: "print",
            call: builtin_print,
        },
        NativeFn {
            name: "len",
            call: builtin_len,
        },
        NativeFn {
            name: "type",
            call: builtin_type,
        },
        NativeFn {
            name: "str",
            call: builtin_str,
        },
        NativeFn {
            name: "keys",
            call: builtin_keys,
        },
        NativeFn {
            name: "native",
            call: builtin_native,
        },
    ];
    table.into_iter().map(|f| (f.name, f)).collect()
});

pub struct BuiltinScope;

impl Scope for BuiltinScope {
    fn fetch(&self, name: &str) -> Option<Value> {
        BUILTINS.get(name).map(|f| Value::NativeFn(*f))
    }
}

pub fn exec_stmt(ctx: &mut EvalCtx<'_>, ns: &mut Namespace, stmt: &Stmt) -> EvalResult<()> {
    match stmt {
        Stmt::Assign(name, expr) => {
            let value = eval_expr(ctx, ns, expr)?;
            ns.insert(name.clone(), value);
            Ok(())
        }
        Stmt::IndexAssign(name, index, expr) => {
            let index = eval_expr(ctx, ns, index)?;
            let value = eval_expr(ctx, ns, expr)?;
            let target = ns
                .get_mut(name)
                .ok_or_else(|| EvalError::NotFound(name.clone()))?;
            match target {
                Value::List(items) => {
                    let idx = resolve_index(&index, items.len())?;
                    items[idx] = value;
                    Ok(())
                }
                Value::Map(entries) => {
                    let key = expect_str(&index, "map key")?;
                    entries.insert(key, value);
                    Ok(())
                }
                Value::Frame(_) => Err(EvalError::UnsupportedOperation(
                    "frame cursor is read-only, investigation only",
                )),
                other => Err(EvalError::Type(format!(
                    "cannot assign into a {}",
                    type_name(other)
                ))),
            }
        }
        Stmt::Delete(name) => match ns.remove(name) {
            Some(_) => Ok(()),
            None => Err(EvalError::NotFound(name.clone())),
        },
    }
}

pub fn eval_expr(ctx: &mut EvalCtx<'_>, ns: &mut Namespace, expr: &Expr) -> EvalResult<Value> {
    match expr {
        Expr::Int(v) => Ok(Value::Int(*v)),
        Expr::Float(v) => Ok(Value::Float(*v)),
        Expr::Bool(v) => Ok(Value::Bool(*v)),
        Expr::Str(v) => Ok(Value::Str(v.clone())),
        Expr::Ident(name) => ScopeChain::new(vec![&*ns, &BuiltinScope]).lookup(name),
        Expr::List(items) => {
            let values = items
                .iter()
                .map(|item| eval_expr(ctx, ns, item))
                .collect::<EvalResult<Vec<_>>>()?;
            Ok(Value::List(values))
        }
        Expr::Map(entries) => {
            let mut map = IndexMap::with_capacity(entries.len());
            for (key, value) in entries {
                let key = expect_str(&eval_expr(ctx, ns, key)?, "map key")?;
                let value = eval_expr(ctx, ns, value)?;
                map.insert(key, value);
            }
            Ok(Value::Map(map))
        }
        Expr::Unary(op, operand) => {
            let operand = eval_expr(ctx, ns, operand)?;
            eval_unary(*op, operand)
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = eval_expr(ctx, ns, lhs)?;
            let rhs = eval_expr(ctx, ns, rhs)?;
            eval_binary(*op, lhs, rhs)
        }
        Expr::Index(target, index) => {
            let target = eval_expr(ctx, ns, target)?;
            let index = eval_expr(ctx, ns, index)?;
            eval_index(&target, &index)
        }
        Expr::Call(callee, args) => {
            let callee = eval_expr(ctx, ns, callee)?;
            let args = args
                .iter()
                .map(|arg| eval_expr(ctx, ns, arg))
                .collect::<EvalResult<Vec<_>>>()?;
            match callee {
                Value::NativeFn(f) => (f.call)(ctx, args),
                other => Err(EvalError::NotCallable(type_name(&other))),
            }
        }
        Expr::MethodCall(target, name, args) => {
            let target = eval_expr(ctx, ns, target)?;
            let args = args
                .iter()
                .map(|arg| eval_expr(ctx, ns, arg))
                .collect::<EvalResult<Vec<_>>>()?;
            match target {
                Value::Frame(handle) => frame_method(&handle, name, args),
                other => Err(EvalError::UnknownMethod(type_name(&other), name.clone())),
            }
        }
    }
}

fn frame_method(
    handle: &crate::interp::value::FrameHandle,
    name: &str,
    args: Vec<Value>,
) -> EvalResult<Value> {
    if !args.is_empty() {
        return Err(EvalError::Arity {
            callee: name.to_string(),
            expected: "no",
            got: args.len(),
        });
    }
    let mut cursor = handle
        .lock()
        .map_err(|_| EvalError::Introspection("frame cursor lock poisoned".to_string()))?;
    match name {
        "up" => {
            cursor.up();
            drop(cursor);
            Ok(Value::Frame(handle.clone()))
        }
        "down" => {
            cursor.down();
            drop(cursor);
            Ok(Value::Frame(handle.clone()))
        }
        "context" => Ok(Value::Verbatim(cursor.context())),
        "locals" => Ok(Value::Map(cursor.locals())),
        "globals" => Ok(Value::Map(cursor.globals())),
        _ => Err(EvalError::UnknownMethod("frame", name.to_string())),
    }
}

fn eval_unary(op: UnaryOp, operand: Value) -> EvalResult<Value> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Int(v)) => v.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
        (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        (op, operand) => Err(EvalError::Type(format!(
            "unary {} is not defined for {}",
            match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            },
            type_name(&operand)
        ))),
    }
}

fn eval_binary(op: BinOp, lhs: Value, rhs: Value) -> EvalResult<Value> {
    use BinOp::*;

    match op {
        Add => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_add(b).map(Value::Int).ok_or(EvalError::Overflow)
            }
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (lhs, rhs) => numeric_binary(Add, lhs, rhs),
        },
        Sub | Mul | Div | Rem => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => match op {
                Sub => a.checked_sub(b).map(Value::Int).ok_or(EvalError::Overflow),
                Mul => a.checked_mul(b).map(Value::Int).ok_or(EvalError::Overflow),
                Div if b == 0 => Err(EvalError::DivisionByZero),
                Div => Ok(Value::Int(a / b)),
                Rem if b == 0 => Err(EvalError::DivisionByZero),
                Rem => Ok(Value::Int(a % b)),
                _ => unreachable!(),
            },
            (lhs, rhs) => numeric_binary(op, lhs, rhs),
        },
        Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        Lt | Le | Gt | Ge => {
            let ordering = match (&lhs, &rhs) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => as_f64(&lhs)?.partial_cmp(&as_f64(&rhs)?),
            };
            let ordering = ordering.ok_or_else(|| {
                EvalError::Type(format!(
                    "{} and {} are not comparable",
                    type_name(&lhs),
                    type_name(&rhs)
                ))
            })?;
            Ok(Value::Bool(match op {
                Lt => ordering.is_lt(),
                Le => ordering.is_le(),
                Gt => ordering.is_gt(),
                Ge => ordering.is_ge(),
                _ => unreachable!(),
            }))
        }
    }
}

fn numeric_binary(op: BinOp, lhs: Value, rhs: Value) -> EvalResult<Value> {
    let (a, b) = (as_f64(&lhs)?, as_f64(&rhs)?);
    Ok(Value::Float(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Rem => a % b,
        _ => unreachable!(),
    }))
}

fn as_f64(value: &Value) -> EvalResult<f64> {
    match value {
        Value::Int(v) => Ok(*v as f64),
        Value::Float(v) => Ok(*v),
        other => Err(EvalError::Type(format!(
            "{} is not a number",
            type_name(other)
        ))),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (as_f64(lhs), as_f64(rhs)) {
        (Ok(a), Ok(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn eval_index(target: &Value, index: &Value) -> EvalResult<Value> {
    match target {
        Value::List(items) => {
            let idx = resolve_index(index, items.len())?;
            Ok(items[idx].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let idx = resolve_index(index, chars.len())?;
            Ok(Value::Str(chars[idx].to_string()))
        }
        Value::Map(entries) => {
            let key = expect_str(index, "map key")?;
            entries
                .get(&key)
                .cloned()
                .ok_or(EvalError::NotFound(key))
        }
        Value::Frame(handle) => {
            let name = expect_str(index, "variable name")?;
            let cursor = handle
                .lock()
                .map_err(|_| EvalError::Introspection("frame cursor lock poisoned".to_string()))?;
            cursor.variable_lookup(&name)
        }
        other => Err(EvalError::Type(format!(
            "{} is not indexable",
            type_name(other)
        ))),
    }
}

fn resolve_index(index: &Value, len: usize) -> EvalResult<usize> {
    let raw = match index {
        Value::Int(v) => *v,
        other => {
            return Err(EvalError::Type(format!(
                "index must be an int, got {}",
                type_name(other)
            )))
        }
    };
    let idx = if raw < 0 { raw + len as i64 } else { raw };
    if idx < 0 || idx as usize >= len {
        return Err(EvalError::IndexOutOfRange(raw, len));
    }
    Ok(idx as usize)
}

// --------------------------------- builtins ------------------------------------------------------

fn builtin_print(ctx: &mut EvalCtx<'_>, args: Vec<Value>) -> EvalResult<Value> {
    let line = args.iter().map(display).join(" ");
    ctx.out.push_str(&line);
    ctx.out.push('\n');
    Ok(Value::Unit)
}

fn builtin_len(_ctx: &mut EvalCtx<'_>, args: Vec<Value>) -> EvalResult<Value> {
    let value = one_arg("len", args)?;
    let len = match &value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        other => {
            return Err(EvalError::Type(format!(
                "{} has no length",
                type_name(other)
            )))
        }
    };
    Ok(Value::Int(len as i64))
}

fn builtin_type(_ctx: &mut EvalCtx<'_>, args: Vec<Value>) -> EvalResult<Value> {
    let value = one_arg("type", args)?;
    Ok(Value::Str(type_name(&value).to_string()))
}

fn builtin_str(_ctx: &mut EvalCtx<'_>, args: Vec<Value>) -> EvalResult<Value> {
    let value = one_arg("str", args)?;
    Ok(Value::Str(display(&value)))
}

fn builtin_keys(_ctx: &mut EvalCtx<'_>, args: Vec<Value>) -> EvalResult<Value> {
    match one_arg("keys", args)? {
        Value::Map(entries) => Ok(Value::List(
            entries.keys().map(|k| Value::Str(k.clone())).collect(),
        )),
        other => Err(EvalError::Type(format!(
            "keys expects a map, got {}",
            type_name(&other)
        ))),
    }
}

fn builtin_native(ctx: &mut EvalCtx<'_>, args: Vec<Value>) -> EvalResult<Value> {
    let name = expect_str(&one_arg("native", args)?, "native function name")?;
    ctx.natives
        .get(name.as_str())
        .map(|f| Value::NativeFn(*f))
        .ok_or(EvalError::UnknownNative(name))
}

fn one_arg(callee: &'static str, mut args: Vec<Value>) -> EvalResult<Value> {
    if args.len() != 1 {
        return Err(EvalError::Arity {
            callee: callee.to_string(),
            expected: "exactly one",
            got: args.len(),
        });
    }
    Ok(args.remove(0))
}
