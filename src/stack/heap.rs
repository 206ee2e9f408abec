//! Point-in-time memory report for the host process.

use crate::interp::error::{EvalError, EvalResult};
use std::fmt::Write as _;
use sysinfo::{Pid, ProcessRefreshKind, System};

/// Resident and virtual memory of the current process, rendered as the
/// operator-facing report behind the `heap()` toolkit symbol.
pub fn heap_stats() -> EvalResult<String> {
    let pid = sysinfo::get_current_pid()
        .map_err(|e| EvalError::Introspection(format!("cannot resolve own pid: {e}")))?;

    let mut system = System::new();
    system.refresh_process_specifics(pid, ProcessRefreshKind::new().with_memory());
    let process = system
        .process(pid)
        .ok_or_else(|| EvalError::Introspection(format!("process {pid} not visible")))?;

    Ok(render_report(pid, process.memory(), process.virtual_memory()))
}

fn render_report(pid: Pid, resident: u64, virtual_size: u64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "memory of process {pid}:");
    let _ = writeln!(out, "  resident: {}", human_bytes(resident));
    let _ = write!(out, "  virtual:  {}", human_bytes(virtual_size));
    out
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {} ({bytes} bytes)", UNITS[unit])
    }
}
