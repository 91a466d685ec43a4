//! Execution contexts and task trampolines
//!
//! Every kernel task runs on its own host thread. A spawned context parks
//! until the creator finishes initializing its control records and calls
//! `wakeup` — only then is the task released to run. The trampoline runs
//! the task body outside the kernel lock, then performs exit bookkeeping
//! exactly once.
//!
//! `exit`/`thread_exit` never return to their caller: they unwind the task
//! with a private panic payload which the trampoline catches. A panic that
//! is *not* that payload is contained as well and treated as the task
//! returning a failure status, so one broken task cannot wedge the kernel.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::thread;

use crate::errors::{KResult, KernelError};
use crate::kernel::{self, KernelGuard};
use crate::process::types::{Pid, Tid};
use crate::process::{lifecycle, thread as kthread};

/// Exit status recorded when a task body panics instead of exiting.
pub const PANIC_EXIT_STATUS: i32 = -1;

/// Identity of the task bound to the current host thread.
#[derive(Clone, Copy)]
pub(crate) struct Current {
    pub pid: Pid,
    pub tid: Tid,
}

thread_local! {
    static CURRENT: Cell<Option<Current>> = const { Cell::new(None) };
}

pub(crate) fn set_current(pid: Pid, tid: Tid) {
    CURRENT.with(|c| c.set(Some(Current { pid, tid })));
}

pub(crate) fn clear_current() {
    CURRENT.with(|c| c.set(None));
}

/// The calling thread's task identity. Syscalls may only be issued from
/// kernel tasks; anything else is a caller bug.
pub(crate) fn current() -> Current {
    CURRENT
        .with(|c| c.get())
        .expect("syscall issued from a thread that is not a kernel task")
}

/// Which exit semantics the trampoline applies when the task body finishes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskKind {
    /// Main thread of a process: finishing means process exit.
    ProcessMain,
    /// Secondary thread: finishing means thread exit only.
    Thread,
}

/// Panic payload carrying an early exit out of a task body.
struct ExitUnwind {
    process: bool,
    status: i32,
}

/// Terminate the current process. Never returns.
pub(crate) fn exit_current(status: i32) -> ! {
    panic::panic_any(ExitUnwind {
        process: true,
        status,
    })
}

/// Terminate the current thread. Never returns.
pub(crate) fn thread_exit_current(status: i32) -> ! {
    panic::panic_any(ExitUnwind {
        process: false,
        status,
    })
}

static EXIT_HOOK: Once = Once::new();

/// Keep the default panic hook from printing a backtrace for every exit
/// unwind; real panics still go through the previous hook.
pub(crate) fn install_exit_hook() {
    EXIT_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<ExitUnwind>().is_none() {
                previous(info);
            }
        }));
    });
}

/// Spawn the host thread backing a new execution context. The context
/// parks until `wakeup(tid)`.
pub(crate) fn spawn(g: &mut KernelGuard, pid: Pid, tid: Tid, kind: TaskKind) -> KResult<()> {
    let name = format!("task-{}.{}", pid, tid.index());
    let handle = thread::Builder::new()
        .name(name)
        .spawn(move || run_task(pid, tid, kind))
        .map_err(|e| KernelError::SpawnFailed(e.to_string()))?;
    g.handles.push(handle);
    Ok(())
}

/// Release a parked context to run.
pub(crate) fn wakeup(g: &mut KernelGuard, tid: Tid) {
    if let Some(t) = g.threads.get_mut(tid) {
        t.started = true;
        t.wake.signal();
    }
}

fn run_task(pid: Pid, tid: Tid, kind: TaskKind) {
    // Park until the creator has finished wiring our control records.
    let (task, args) = {
        let mut g = kernel::lock();
        loop {
            let Some(t) = g.threads.get(tid) else {
                // Unwound by the creator before ever starting.
                return;
            };
            if t.started {
                break;
            }
            let cv = t.wake.clone();
            cv.wait(&mut g);
        }
        set_current(pid, tid);
        let t = g.threads.get(tid).expect("thread record vanished before start");
        (t.task, t.args.clone())
    };

    // Run the task body outside the kernel lock.
    let (process_exit, status) = match panic::catch_unwind(AssertUnwindSafe(|| task(&args))) {
        Ok(status) => (kind == TaskKind::ProcessMain, status),
        Err(payload) => match payload.downcast::<ExitUnwind>() {
            Ok(exit) => (exit.process, exit.status),
            Err(_) => {
                log::error!(
                    "task {}.{} panicked; recording exit status {}",
                    pid,
                    tid.index(),
                    PANIC_EXIT_STATUS
                );
                (kind == TaskKind::ProcessMain, PANIC_EXIT_STATUS)
            }
        },
    };

    let mut g = kernel::lock();
    if process_exit {
        lifecycle::exit_process(&mut g, status);
    } else {
        kthread::terminate_current(&mut g, status);
    }
    drop(g);
    clear_current();
}
