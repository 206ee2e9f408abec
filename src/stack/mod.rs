//! Instrumented call-stack introspection.
//!
//! Threads participate by installing [`FrameGuard`]s (usually through
//! [`record_frame!`](crate::record_frame)); each guard pushes one frame onto
//! its thread's recorded stack and pops it on drop. The process-global
//! [`ThreadRegistry`] exposes read-only views over those stacks: point-in-time
//! snapshots and live [`FrameCursor`]s. It never stops or touches threads that
//! do not opt in.

pub mod cursor;
pub mod heap;

use crate::interp::error::{EvalError, EvalResult};
use crate::interp::value::Value;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::fmt::Write as _;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

pub use cursor::FrameCursor;

static REGISTRY: Lazy<ThreadRegistry> = Lazy::new(ThreadRegistry::default);

/// The process-global registry.
pub fn registry() -> &'static ThreadRegistry {
    &REGISTRY
}

/// Install a stack frame for the current function, recording the call site.
/// Bind the result; the frame is retired when the guard drops.
#[macro_export]
macro_rules! record_frame {
    ($function:expr) => {
        $crate::stack::FrameGuard::new($function, file!(), line!())
    };
}

/// Picks threads out of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadSelector {
    Id(u64),
    /// Substring match on the thread name, first registered match wins.
    Name(String),
}

impl std::fmt::Display for ThreadSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadSelector::Id(id) => write!(f, "#{id}"),
            ThreadSelector::Name(name) => write!(f, "{name}"),
        }
    }
}

/// One recorded frame, owned by the guard that pushed it.
#[derive(Debug, Clone)]
pub(crate) struct FrameData {
    pub function: String,
    pub file: String,
    pub line: u32,
    /// Captured at push so context survives an unreadable source tree.
    pub source_line: Option<String>,
    pub locals: IndexMap<String, Value>,
}

/// One frame of a snapshot, fully detached from the live stack.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub function: String,
    pub file: String,
    pub line: u32,
    pub source_line: Option<String>,
}

/// Snapshot of one thread's recorded stack, frames innermost-first.
#[derive(Debug, Clone)]
pub struct ThreadDump {
    pub thread_id: u64,
    pub thread_name: String,
    pub frames: Vec<FrameRecord>,
}

#[derive(Debug)]
pub(crate) struct ThreadEntry {
    pub id: u64,
    pub name: String,
    pub stack: Mutex<Vec<FrameData>>,
}

/// Read-only capability over the stacks of instrumented threads, plus the
/// process-level published globals visible to every frame cursor.
#[derive(Default)]
pub struct ThreadRegistry {
    threads: Mutex<Vec<Arc<ThreadEntry>>>,
    next_id: AtomicU64,
    globals: Mutex<IndexMap<String, Value>>,
}

thread_local! {
    static CURRENT_ENTRY: RefCell<Option<RegisteredThread>> = const { RefCell::new(None) };
}

/// Thread-local handle to the owning thread's registry entry. Dropped when
/// the thread exits, which retires the entry so dead threads neither leak
/// nor keep matching selectors.
struct RegisteredThread {
    entry: Arc<ThreadEntry>,
}

impl Drop for RegisteredThread {
    fn drop(&mut self) {
        REGISTRY.deregister(self.entry.id);
    }
}

impl ThreadRegistry {
    /// The current thread's entry, registering it on first use. The entry
    /// takes the OS thread name, or `unnamed-<id>` for anonymous threads.
    fn current_entry(&self) -> Arc<ThreadEntry> {
        CURRENT_ENTRY.with(|slot| {
            let mut slot = slot.borrow_mut();
            if let Some(registered) = slot.as_ref() {
                return registered.entry.clone();
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            let name = thread::current()
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("unnamed-{id}"));
            let entry = Arc::new(ThreadEntry {
                id,
                name,
                stack: Mutex::new(vec![]),
            });
            self.threads
                .lock()
                .expect("thread list poisoned")
                .push(entry.clone());
            *slot = Some(RegisteredThread {
                entry: entry.clone(),
            });
            entry
        })
    }

    fn deregister(&self, id: u64) {
        if let Ok(mut threads) = self.threads.lock() {
            threads.retain(|entry| entry.id != id);
        }
    }

    pub(crate) fn find(&self, selector: &ThreadSelector) -> Option<Arc<ThreadEntry>> {
        let threads = self.threads.lock().expect("thread list poisoned");
        threads
            .iter()
            .find(|entry| match selector {
                ThreadSelector::Id(id) => entry.id == *id,
                ThreadSelector::Name(sub) => entry.name.contains(sub),
            })
            .cloned()
    }

    pub(crate) fn first_active(&self) -> Option<Arc<ThreadEntry>> {
        let threads = self.threads.lock().expect("thread list poisoned");
        threads
            .iter()
            .find(|entry| !entry.stack.lock().map(|s| s.is_empty()).unwrap_or(true))
            .cloned()
    }

    /// Bind a process-level global, visible through every frame cursor's
    /// scope chain.
    pub fn publish_global(&self, name: impl Into<String>, value: Value) {
        self.globals
            .lock()
            .expect("globals poisoned")
            .insert(name.into(), value);
    }

    pub(crate) fn globals(&self) -> IndexMap<String, Value> {
        self.globals.lock().expect("globals poisoned").clone()
    }

    /// Point-in-time capture. With a selector, the first matching thread
    /// (missing → `NoSuchThread`, matching but idle → `EmptyStack`); without
    /// one, every thread that currently has recorded frames. Each stack is
    /// locked only for the instant it is copied out.
    pub fn snapshot(&self, selector: Option<&ThreadSelector>) -> EvalResult<Vec<ThreadDump>> {
        match selector {
            Some(selector) => {
                let entry = self
                    .find(selector)
                    .ok_or_else(|| EvalError::NoSuchThread(selector.to_string()))?;
                let dump = dump_entry(&entry);
                if dump.frames.is_empty() {
                    return Err(EvalError::EmptyStack(entry.name.clone()));
                }
                Ok(vec![dump])
            }
            None => {
                let threads = self.threads.lock().expect("thread list poisoned").clone();
                Ok(threads
                    .iter()
                    .map(|entry| dump_entry(entry))
                    .filter(|dump| !dump.frames.is_empty())
                    .collect())
            }
        }
    }
}

fn dump_entry(entry: &ThreadEntry) -> ThreadDump {
    let stack = match entry.stack.lock() {
        Ok(stack) => stack.clone(),
        Err(_) => vec![],
    };
    ThreadDump {
        thread_id: entry.id,
        thread_name: entry.name.clone(),
        // Guards push caller-first, dumps read innermost-first.
        frames: stack
            .iter()
            .rev()
            .map(|frame| FrameRecord {
                function: frame.function.clone(),
                file: frame.file.clone(),
                line: frame.line,
                source_line: frame
                    .source_line
                    .clone()
                    .or_else(|| read_source_line(&frame.file, frame.line)),
            })
            .collect(),
    }
}

/// Render dumps the way the operator sees them: one block per thread, frames
/// numbered innermost-first.
pub fn render_stack_dump(dumps: &[ThreadDump]) -> String {
    let mut out = String::new();
    for dump in dumps {
        let _ = writeln!(out, "thread #{} \"{}\"", dump.thread_id, dump.thread_name);
        for (depth, frame) in dump.frames.iter().enumerate() {
            let _ = writeln!(
                out,
                "  #{depth} {} at {}:{}",
                frame.function, frame.file, frame.line
            );
            if let Some(source) = &frame.source_line {
                let _ = writeln!(out, "      {}", source.trim_end());
            }
        }
    }
    out
}

/// RAII frame marker. Construction pushes a frame onto the current thread's
/// recorded stack (registering the thread on first use); drop pops it.
pub struct FrameGuard {
    entry: Arc<ThreadEntry>,
}

impl FrameGuard {
    pub fn new(function: &str, file: &str, line: u32) -> Self {
        let entry = REGISTRY.current_entry();
        let frame = FrameData {
            function: function.to_string(),
            file: file.to_string(),
            line,
            source_line: read_source_line(file, line),
            locals: IndexMap::new(),
        };
        if let Ok(mut stack) = entry.stack.lock() {
            stack.push(frame);
        }
        Self { entry }
    }

    /// Retarget the active line as execution advances through the function.
    pub fn at_line(&self, line: u32) {
        self.with_frame(|frame| {
            frame.line = line;
            frame.source_line = read_source_line(&frame.file, line);
        });
    }

    /// Expose a local to frame cursors, replacing any earlier value under
    /// the same name.
    pub fn publish_local(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.with_frame(|frame| {
            frame.locals.insert(name, value);
        });
    }

    fn with_frame(&self, apply: impl FnOnce(&mut FrameData)) {
        if let Ok(mut stack) = self.entry.stack.lock() {
            if let Some(frame) = stack.last_mut() {
                apply(frame);
            }
        }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if let Ok(mut stack) = self.entry.stack.lock() {
            stack.pop();
        }
    }
}

pub(crate) fn read_source_line(file: &str, line: u32) -> Option<String> {
    let text = fs::read_to_string(file).ok()?;
    text.lines()
        .nth(line.saturating_sub(1) as usize)
        .map(str::to_string)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_guard_lifecycle_and_snapshot() {
        let handle = thread::Builder::new()
            .name("snapshot-probe".to_string())
            .spawn(|| {
                let _outer = FrameGuard::new("probe_outer", "no/such/file.rs", 10);
                let inner = FrameGuard::new("probe_inner", "no/such/file.rs", 20);
                inner.at_line(21);

                let selector = ThreadSelector::Name("snapshot-probe".to_string());
                let dumps = registry().snapshot(Some(&selector)).unwrap();
                assert_eq!(dumps.len(), 1);
                assert_eq!(dumps[0].thread_name, "snapshot-probe");

                let functions: Vec<&str> = dumps[0]
                    .frames
                    .iter()
                    .map(|f| f.function.as_str())
                    .collect();
                assert_eq!(functions, vec!["probe_inner", "probe_outer"]);
                assert_eq!(dumps[0].frames[0].line, 21);

                drop(inner);
                let dumps = registry().snapshot(Some(&selector)).unwrap();
                assert_eq!(dumps[0].frames.len(), 1);
            })
            .unwrap();
        handle.join().unwrap();

        // Thread exit retires its registry entry.
        let selector = ThreadSelector::Name("snapshot-probe".to_string());
        assert!(matches!(
            registry().snapshot(Some(&selector)),
            Err(EvalError::NoSuchThread(_))
        ));
    }

    #[test]
    fn test_exited_thread_does_not_shadow_a_live_one() {
        thread::Builder::new()
            .name("shade-old".to_string())
            .spawn(|| drop(record_frame!("finished")))
            .unwrap()
            .join()
            .unwrap();

        let (ready_tx, ready_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let live = thread::Builder::new()
            .name("shade-new".to_string())
            .spawn(move || {
                let _guard = record_frame!("running");
                ready_tx.send(()).unwrap();
                let _ = release_rx.recv();
            })
            .unwrap();
        ready_rx.recv().unwrap();

        // The exited thread is gone, so the shared name substring resolves
        // to the live thread instead of a dead entry with an empty stack.
        let dumps = registry()
            .snapshot(Some(&ThreadSelector::Name("shade".to_string())))
            .unwrap();
        assert_eq!(dumps[0].thread_name, "shade-new");

        release_tx.send(()).unwrap();
        live.join().unwrap();
    }

    #[test]
    fn test_unknown_selector() {
        assert!(matches!(
            registry().snapshot(Some(&ThreadSelector::Name("no-such-thread".to_string()))),
            Err(EvalError::NoSuchThread(_))
        ));
        assert!(matches!(
            registry().snapshot(Some(&ThreadSelector::Id(u64::MAX))),
            Err(EvalError::NoSuchThread(_))
        ));
    }

    #[test]
    fn test_dump_rendering() {
        let dumps = vec![ThreadDump {
            thread_id: 7,
            thread_name: "worker".to_string(),
            frames: vec![FrameRecord {
                function: "step".to_string(),
                file: "src/worker.rs".to_string(),
                line: 12,
                source_line: Some("        let step = queue.pop();".to_string()),
            }],
        }];

        let rendered = render_stack_dump(&dumps);
        assert!(rendered.contains("thread #7 \"worker\""));
        assert!(rendered.contains("#0 step at src/worker.rs:12"));
        assert!(rendered.contains("let step = queue.pop();"));
    }

    #[test]
    fn test_published_local_is_visible() {
        let handle = thread::Builder::new()
            .name("locals-probe".to_string())
            .spawn(|| {
                let guard = record_frame!("locals_probe");
                guard.publish_local("ticks", Value::Int(99));

                let cursor = FrameCursor::focus(Some(&ThreadSelector::Name(
                    "locals-probe".to_string(),
                )))
                .unwrap();
                assert_eq!(cursor.variable_lookup("ticks").unwrap(), Value::Int(99));
            })
            .unwrap();
        handle.join().unwrap();
    }
}
