//! Signal delivery to child processes by PID (Unix only).
//!
//! All functions treat an already-gone process as success, so repeated
//! stops are harmless.

use std::io;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// Interrupt a process with SIGINT, as Ctrl+C would.
pub fn interrupt_pid(pid: u32) -> io::Result<()> {
    send_signal(pid, Signal::SIGINT)
}

/// Ask a process to terminate with SIGTERM.
pub fn terminate_pid(pid: u32) -> io::Result<()> {
    send_signal(pid, Signal::SIGTERM)
}

/// Force a process to exit with SIGKILL.
pub fn kill_pid(pid: u32) -> io::Result<()> {
    send_signal(pid, Signal::SIGKILL)
}

fn send_signal(pid: u32, sig: Signal) -> io::Result<()> {
    let raw = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid pid {pid}")))?;

    match signal::kill(Pid::from_raw(raw), sig) {
        // Process may have already exited
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::other(e)),
    }
}
