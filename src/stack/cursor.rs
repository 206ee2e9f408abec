//! Live frame cursor: navigation over one thread's recorded call chain.

use crate::interp::error::{EvalError, EvalResult};
use crate::interp::eval::BuiltinScope;
use crate::interp::namespace::{MapScope, ScopeChain};
use crate::interp::value::Value;
use crate::stack::{registry, FrameData, ThreadEntry, ThreadSelector};
use indexmap::IndexMap;
use std::fmt::Write as _;
use std::fs;
use std::sync::Arc;

/// Source lines shown on each side of the active line.
const CONTEXT_RADIUS: usize = 3;

/// A cursor over the live call chain of one instrumented thread.
///
/// The cursor tracks a position in the stack, not a copy of it: the chain
/// underneath may move on while the cursor is held, and every read observes
/// the stack as it is at that moment. The position is anchored at the
/// outermost frame, so frames pushed underneath never move it; only a stack
/// that shrank past the cursor clamps it back to the innermost frame.
/// Navigation history lets `down()` return to exactly the frame a preceding
/// `up()` left.
#[derive(Debug)]
pub struct FrameCursor {
    entry: Arc<ThreadEntry>,
    /// Index into the recorded stack, 0 = outermost.
    position: usize,
    history: Vec<usize>,
}

impl FrameCursor {
    /// Focus the first thread matching `selector`, or the first instrumented
    /// thread with recorded frames when no selector is given.
    pub fn focus(selector: Option<&ThreadSelector>) -> EvalResult<Self> {
        let entry = match selector {
            Some(selector) => registry()
                .find(selector)
                .ok_or_else(|| EvalError::NoSuchThread(selector.to_string()))?,
            None => registry().first_active().ok_or_else(|| {
                EvalError::Introspection("no instrumented thread has recorded frames".to_string())
            })?,
        };
        let depth = entry.stack.lock().map(|s| s.len()).unwrap_or(0);
        if depth == 0 {
            return Err(EvalError::EmptyStack(entry.name.clone()));
        }
        Ok(Self {
            entry,
            position: depth - 1,
            history: vec![],
        })
    }

    /// Step to the caller of the current frame. No-op at the outermost frame.
    pub fn up(&mut self) {
        let position = self.clamped_position();
        if position > 0 {
            self.history.push(position);
            self.position = position - 1;
        }
    }

    /// Return to the frame the matching `up()` left. No-op without history.
    pub fn down(&mut self) {
        if let Some(previous) = self.history.pop() {
            self.position = previous;
        }
    }

    /// `file:line - function` plus surrounding source with the active line
    /// marked. Falls back to the line captured at frame push when the source
    /// file is not readable here.
    pub fn context(&self) -> String {
        let Some(frame) = self.active_frame() else {
            return format!("<thread \"{}\" has no recorded frames>", self.entry.name);
        };
        let mut out = format!("{}:{} - {}", frame.file, frame.line, frame.function);
        match read_context(&frame.file, frame.line) {
            Some(listing) => {
                out.push('\n');
                out.push_str(&listing);
            }
            None => {
                if let Some(source) = &frame.source_line {
                    let _ = write!(out, "\n> {:>5}  {}", frame.line, source.trim_end());
                }
            }
        }
        out
    }

    /// Locals the active frame's guard has published.
    pub fn locals(&self) -> IndexMap<String, Value> {
        self.active_frame()
            .map(|frame| frame.locals)
            .unwrap_or_default()
    }

    /// Process-level published globals.
    pub fn globals(&self) -> IndexMap<String, Value> {
        registry().globals()
    }

    /// Resolve `name` through the frame's scope chain: locals, then process
    /// globals, then builtins.
    pub fn variable_lookup(&self, name: &str) -> EvalResult<Value> {
        let locals = self.locals();
        let globals = self.globals();
        let local_scope = MapScope(&locals);
        let global_scope = MapScope(&globals);
        ScopeChain::new(vec![&local_scope, &global_scope, &BuiltinScope]).lookup(name)
    }

    /// The stored position, pulled back to the innermost frame when the
    /// live stack has shrunk underneath it.
    fn clamped_position(&self) -> usize {
        let depth = self.entry.stack.lock().map(|s| s.len()).unwrap_or(0);
        if depth == 0 {
            0
        } else {
            self.position.min(depth - 1)
        }
    }

    /// The frame the cursor points at.
    fn active_frame(&self) -> Option<FrameData> {
        let stack = self.entry.stack.lock().ok()?;
        if stack.is_empty() {
            return None;
        }
        Some(stack[self.position.min(stack.len() - 1)].clone())
    }
}

fn read_context(file: &str, line: u32) -> Option<String> {
    let text = fs::read_to_string(file).ok()?;
    let active = line.saturating_sub(1) as usize;
    let first = active.saturating_sub(CONTEXT_RADIUS);

    let mut out = String::new();
    for (idx, source) in text
        .lines()
        .enumerate()
        .skip(first)
        .take(2 * CONTEXT_RADIUS + 1)
    {
        let marker = if idx == active { '>' } else { ' ' };
        let _ = writeln!(out, "{marker} {:>5}  {}", idx + 1, source);
    }
    if out.is_empty() {
        return None;
    }
    Some(out)
}
