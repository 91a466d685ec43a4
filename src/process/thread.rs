//! Thread create / join / detach / exit bookkeeping
//!
//! Thread control blocks live in a generational arena; a tid is only valid
//! while its record exists and belongs to the calling process. Records are
//! released by whichever of exit, detach, or last-join happens last, always
//! through the single `release_thread` path.

use crate::errors::{KResult, KernelError};
use crate::kernel::KernelGuard;
use crate::process::lifecycle;
use crate::scheduler::context::{self, TaskKind};

use super::types::{Task, ThreadCb, Tid};

/// Create a new thread in the current process, running `task` with a
/// private copy of `args`. The context is released to run only after its
/// control block is linked.
pub(crate) fn create_thread(g: &mut KernelGuard, task: Task, args: &[u8]) -> KResult<Tid> {
    let pid = context::current().pid;
    let tcb = ThreadCb::new(pid, task, args.to_vec());
    let tid = g.threads.insert(tcb).ok_or(KernelError::NoFreeThread)?;
    {
        let pcb = g.procs.get_mut(pid).expect("caller must be alive");
        pcb.threads.push(tid);
        pcb.thread_count += 1;
    }
    if let Err(e) = context::spawn(g, pid, tid, TaskKind::Thread) {
        let pcb = g.procs.get_mut(pid).expect("caller must be alive");
        pcb.threads.retain(|&t| t != tid);
        pcb.thread_count -= 1;
        g.threads.remove(tid);
        return Err(e);
    }
    context::wakeup(g, tid);
    log::trace!("pid {} created thread {:?}", pid, tid);
    Ok(tid)
}

/// The calling thread's own tid.
pub(crate) fn thread_self() -> Tid {
    context::current().tid
}

/// Block until `tid` exits and collect its status.
///
/// Rejects unknown tids, self-joins, and detached threads. If the target
/// becomes detached while we are blocked, the join fails: detach steals
/// the thread from its joiners.
pub(crate) fn join(g: &mut KernelGuard, tid: Tid) -> KResult<i32> {
    let me = context::current();
    let listed = g
        .procs
        .get(me.pid)
        .expect("caller must be alive")
        .threads
        .contains(&tid);
    if !listed {
        return Err(KernelError::NoSuchThread);
    }
    if tid == me.tid {
        return Err(KernelError::JoinSelf);
    }
    {
        let t = g.threads.get(tid).expect("listed thread has a record");
        if t.detached {
            return Err(KernelError::ThreadDetached);
        }
    }

    g.threads
        .get_mut(tid)
        .expect("listed thread has a record")
        .waiters += 1;

    loop {
        let t = g
            .threads
            .get(tid)
            .expect("a joined record is never freed while waiters > 0");
        if t.exited || t.detached {
            break;
        }
        let cv = t.exit_cv.clone();
        cv.wait(g);
    }

    let (stolen, status, release) = {
        let t = g.threads.get_mut(tid).expect("record pinned by waiter");
        t.waiters -= 1;
        let release = t.waiters == 0 && t.exited;
        (t.detached, t.exit_status, release)
    };
    if release {
        release_thread(g, tid);
    }
    if stolen {
        Err(KernelError::ThreadDetached)
    } else {
        Ok(status)
    }
}

/// Detach `tid` from its joiners.
///
/// Fails on unknown tids, on threads that already exited (a fully reaped
/// thread can be neither joined nor detached — though cleanup still runs if
/// the record is now unreferenced), and on already-detached threads. On a
/// live thread the detached flag is set and all joiners are woken so they
/// can observe it and fail their join.
pub(crate) fn detach(g: &mut KernelGuard, tid: Tid) -> KResult<()> {
    let me = context::current();
    let listed = g
        .procs
        .get(me.pid)
        .expect("caller must be alive")
        .threads
        .contains(&tid);
    if !listed {
        return Err(KernelError::NoSuchThread);
    }

    let release = {
        let t = g.threads.get_mut(tid).expect("listed thread has a record");
        if t.detached {
            return Err(KernelError::AlreadyDetached);
        }
        if !t.exited {
            t.detached = true;
            t.exit_cv.broadcast();
            return Ok(());
        }
        t.waiters == 0
    };
    if release {
        release_thread(g, tid);
    }
    Err(KernelError::ThreadExited)
}

/// Thread-exit bookkeeping for the calling thread, shared by `thread_exit`
/// and the tail of process exit.
///
/// Marks the record exited, wakes joiners, and — when this was the
/// process's last live thread — turns the process into a zombie. The host
/// thread terminates right after this returns.
pub(crate) fn terminate_current(g: &mut KernelGuard, status: i32) {
    let me = context::current();
    {
        let t = g
            .threads
            .get_mut(me.tid)
            .expect("running thread has a record");
        t.exited = true;
        t.exit_status = status;
        t.exit_cv.broadcast();
    }
    let remaining = {
        let pcb = g.procs.get_mut(me.pid).expect("running process is alive");
        pcb.thread_count -= 1;
        pcb.thread_count
    };
    let release = {
        let t = g.threads.get(me.tid).expect("running thread has a record");
        t.detached && t.waiters == 0
    };
    if release {
        release_thread(g, me.tid);
    }
    if remaining == 0 {
        lifecycle::zombify(g, me.pid);
    }
}

/// The single release path for thread records.
fn release_thread(g: &mut KernelGuard, tid: Tid) {
    let t = g
        .threads
        .remove(tid)
        .expect("releasing a thread record twice");
    assert!(t.waiters == 0, "freeing a thread record with waiters");
    if let Some(pcb) = g.procs.get_mut(t.owner) {
        pcb.threads.retain(|&x| x != tid);
    }
}
