//! Thread management syscalls
//!
//! Implements: create_thread, thread_self, thread_join, thread_detach,
//! thread_exit

use crate::errors::KResult;
use crate::kernel;
use crate::process::thread as kthread;
use crate::process::types::{Task, Tid};
use crate::scheduler::context;

/// Create a new thread in the calling process, running `task` with a
/// private copy of `args`. Returns its tid.
pub fn create_thread(task: Task, args: &[u8]) -> KResult<Tid> {
    let mut g = kernel::lock();
    kthread::create_thread(&mut g, task, args)
}

/// The calling thread's own tid.
pub fn thread_self() -> Tid {
    kthread::thread_self()
}

/// Block until `tid` exits and return its exit status.
///
/// Fails on unknown tids, self-joins, and detached threads — including a
/// target that becomes detached while the caller is blocked.
pub fn thread_join(tid: Tid) -> KResult<i32> {
    let mut g = kernel::lock();
    kthread::join(&mut g, tid)
}

/// Detach `tid`: it can no longer be joined, and its record is reclaimed
/// as soon as it has exited.
pub fn thread_detach(tid: Tid) -> KResult<()> {
    let mut g = kernel::lock();
    kthread::detach(&mut g, tid)
}

/// Terminate the calling thread with `status`. Never returns.
pub fn thread_exit(status: i32) -> ! {
    context::thread_exit_current(status)
}
