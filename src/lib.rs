//! Spyglass embeds a debugging console server inside a live process.
//!
//! Call [`bridge::start`] from the embedding application, instrument the
//! threads worth inspecting with [`record_frame!`], then attach an operator
//! console with `spy connect <port>` (or [`console::connect`]). Each
//! connection gets its own persistent namespace and the introspection
//! toolkit: `threads()`, `frame()`, `heap()`.

pub mod bridge;
pub mod console;
pub mod interp;
pub mod log;
pub mod stack;

/// Default console port, derived from the process id so several instrumented
/// processes on one host get distinct defaults. Ports below 1024 are shifted
/// out of the privileged range.
pub fn default_port() -> u16 {
    port_for_pid(std::process::id())
}

fn port_for_pid(pid: u32) -> u16 {
    let mut port = (pid % u16::MAX as u32) as u16;
    while port < 1024 {
        port += 1000;
    }
    port
}
