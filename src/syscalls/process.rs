//! Process management syscalls
//!
//! Implements: exec, exit, wait_child, get_pid, get_ppid

use crate::errors::KResult;
use crate::kernel;
use crate::process::lifecycle;
use crate::process::types::{Pid, Task};
use crate::scheduler::context;

/// Create a new process running `task` with a private copy of `args`.
/// Returns the new pid. The caller's open descriptors are shared with the
/// child (unless the child is idle or init, which inherit nothing).
pub fn exec(task: Task, args: &[u8]) -> KResult<Pid> {
    let mut g = kernel::lock();
    lifecycle::exec(&mut g, task, args)
}

/// The calling process's pid.
pub fn get_pid() -> Pid {
    context::current().pid
}

/// The calling process's parent pid; `None` for idle and init.
pub fn get_ppid() -> Option<Pid> {
    let g = kernel::lock();
    g.procs
        .get(context::current().pid)
        .expect("caller must be alive")
        .parent
}

/// Terminate the calling process with `status`. Never returns.
///
/// The status is meaningful only when the calling thread is the process's
/// last. Init first reaps every remaining child before dying.
pub fn exit(status: i32) -> ! {
    context::exit_current(status)
}

/// Wait for a child to exit and reap it, returning `(pid, status)`.
///
/// `Some(pid)` waits for that specific direct child; `None` waits for any
/// child, reaping the oldest exited one, and fails once the caller has no
/// children at all.
pub fn wait_child(which: Option<Pid>) -> KResult<(Pid, i32)> {
    let mut g = kernel::lock();
    lifecycle::wait_child(&mut g, which)
}
