//! Process lifecycle: creation, exit, wait, reparenting, reaping
//!
//! UNIX-style parent/child/zombie semantics over the fixed process table.
//! A process with no live threads becomes a zombie; its parent (or init,
//! after reparenting) reaps it, which is the only path that returns a
//! process slot to the free list.

use crate::errors::{KResult, KernelError};
use crate::fs::fcb;
use crate::kernel::KernelGuard;
use crate::process::thread as kthread;
use crate::scheduler::context::{self, TaskKind};

use super::types::{Pid, ProcState, Task, ThreadCb, INIT_PID, MAX_OPEN_FILES, MAX_PROCESSES};

/// Create a new process running `task` with a private copy of `args`.
///
/// Ordinary processes (pid > 1) are linked as children of the caller and
/// share the caller's open descriptors by reference. The idle and init
/// processes are parentless and inherit nothing. The new main thread is
/// released to run only after the record is fully wired; every failure
/// path returns the partially built record to the free list.
pub(crate) fn exec(g: &mut KernelGuard, task: Task, args: &[u8]) -> KResult<Pid> {
    let pid = g
        .procs
        .acquire(None)
        .ok_or(KernelError::NoFreeProcess)?;

    if pid > INIT_PID {
        let parent = context::current().pid;
        let fid_table = {
            let ppcb = g.procs.get_mut(parent).expect("caller must be alive");
            ppcb.children.push(pid);
            ppcb.fid_table
        };
        for id in fid_table.iter().flatten() {
            fcb::incref(g, *id);
        }
        let pcb = g.procs.get_mut(pid).expect("slot just acquired");
        pcb.parent = Some(parent);
        pcb.fid_table = fid_table;
    }

    {
        let pcb = g.procs.get_mut(pid).expect("slot just acquired");
        pcb.main_task = Some(task);
        pcb.args = args.to_vec();
    }

    // Spawn the main thread. Release it to run only once everything else
    // is in place.
    let tcb = ThreadCb::new(pid, task, args.to_vec());
    let tid = match g.threads.insert(tcb) {
        Some(tid) => tid,
        None => {
            unwind_exec(g, pid);
            return Err(KernelError::NoFreeThread);
        }
    };
    {
        let pcb = g.procs.get_mut(pid).expect("slot just acquired");
        pcb.threads.push(tid);
        pcb.thread_count = 1;
    }
    if let Err(e) = context::spawn(g, pid, tid, TaskKind::ProcessMain) {
        g.threads.remove(tid);
        unwind_exec(g, pid);
        return Err(e);
    }
    context::wakeup(g, tid);

    log::debug!("exec: pid {} spawned ({} byte args)", pid, args.len());
    Ok(pid)
}

/// Roll back a partially built process record.
fn unwind_exec(g: &mut KernelGuard, pid: Pid) {
    let (parent, fid_table) = {
        let pcb = g.procs.get_mut(pid).expect("unwinding a free slot");
        (
            pcb.parent.take(),
            std::mem::replace(&mut pcb.fid_table, [None; MAX_OPEN_FILES]),
        )
    };
    if let Some(pp) = parent {
        if let Some(ppcb) = g.procs.get_mut(pp) {
            ppcb.children.retain(|&c| c != pid);
        }
    }
    for id in fid_table.into_iter().flatten() {
        fcb::decref(g, id);
    }
    g.procs.release(pid);
}

/// Process-exit semantics, invoked by the trampoline of the exiting thread.
///
/// Init must first reap every remaining child (its own and the orphans it
/// has inherited) so no descendant is ever left unreachable. The exit
/// status is meaningful only when the calling thread is the process's last.
pub(crate) fn exit_process(g: &mut KernelGuard, status: i32) {
    let pid = context::current().pid;
    if pid == INIT_PID {
        while wait_any(g).is_ok() {}
    }
    if let Some(pcb) = g.procs.get_mut(pid) {
        pcb.exit_status = status;
    }
    kthread::terminate_current(g, status);
}

/// Wait for a child to exit and reap it.
pub(crate) fn wait_child(g: &mut KernelGuard, which: Option<Pid>) -> KResult<(Pid, i32)> {
    match which {
        Some(pid) => wait_specific(g, pid),
        None => wait_any(g),
    }
}

fn wait_specific(g: &mut KernelGuard, cpid: Pid) -> KResult<(Pid, i32)> {
    let me = context::current().pid;
    if cpid as usize >= MAX_PROCESSES {
        return Err(KernelError::NoSuchProcess);
    }
    let is_my_child = g
        .procs
        .get(cpid)
        .map(|c| c.parent == Some(me))
        .unwrap_or(false);
    if !is_my_child {
        return Err(KernelError::NoSuchProcess);
    }

    loop {
        // Re-validate after every wakeup: a sibling waiter may have reaped
        // the child, and its slot may even carry a new process by now.
        let Some(child) = g.procs.get(cpid) else {
            return Err(KernelError::NoSuchProcess);
        };
        if child.parent != Some(me) {
            return Err(KernelError::NoSuchProcess);
        }
        if child.state == ProcState::Zombie {
            break;
        }
        let cv = g
            .procs
            .get(me)
            .expect("waiting process must be alive")
            .child_exit
            .clone();
        cv.wait(g);
    }

    let status = cleanup_zombie(g, cpid);
    Ok((cpid, status))
}

fn wait_any(g: &mut KernelGuard) -> KResult<(Pid, i32)> {
    let me = context::current().pid;
    loop {
        let pcb = g.procs.get(me).expect("waiting process must be alive");
        if pcb.children.is_empty() {
            return Err(KernelError::NoSuchProcess);
        }
        if let Some(&head) = pcb.exited.front() {
            let status = cleanup_zombie(g, head);
            return Ok((head, status));
        }
        let cv = pcb.child_exit.clone();
        cv.wait(g);
    }
}

/// Reap a zombie: copy its status out, unlink it from its parent's child
/// bookkeeping, drop its remaining thread records, and free its slot.
pub(crate) fn cleanup_zombie(g: &mut KernelGuard, pid: Pid) -> i32 {
    let (status, parent, threads) = {
        let pcb = g.procs.get_mut(pid).expect("reaping a free process slot");
        assert_eq!(pcb.state, ProcState::Zombie, "reaping a non-zombie process");
        (
            pcb.exit_status,
            pcb.parent,
            std::mem::take(&mut pcb.threads),
        )
    };
    if let Some(pp) = parent {
        if let Some(ppcb) = g.procs.get_mut(pp) {
            ppcb.children.retain(|&c| c != pid);
            ppcb.exited.retain(|&c| c != pid);
        }
    }
    // No thread of this process can still be running or joined: zombie
    // means all threads exited, and joiners are threads of the same process.
    for tid in threads {
        if let Some(t) = g.threads.remove(tid) {
            assert!(t.waiters == 0, "freeing a thread record with waiters");
        }
    }
    g.procs.release(pid);
    status
}

/// Turn a process whose last thread just exited into a zombie.
///
/// Children (alive and zombie alike) are handed to init, the dying
/// process's own exited queue is appended to init's (waking init), the
/// process is queued on its parent's exited list (waking the parent), its
/// descriptors are released, and its argument buffer is dropped.
pub(crate) fn zombify(g: &mut KernelGuard, pid: Pid) {
    let parent = g
        .procs
        .get(pid)
        .expect("zombifying a free slot")
        .parent;

    if pid != INIT_PID && parent.is_some() {
        let (children, exited_kids) = {
            let pcb = g.procs.get_mut(pid).expect("zombifying a free slot");
            (
                std::mem::take(&mut pcb.children),
                std::mem::take(&mut pcb.exited),
            )
        };
        for &child in &children {
            g.procs
                .get_mut(child)
                .expect("child list holds only unreaped children")
                .parent = Some(INIT_PID);
        }
        {
            let init = g
                .procs
                .get_mut(INIT_PID)
                .expect("init outlives every other process");
            init.children.extend(children);
            if !exited_kids.is_empty() {
                init.exited.extend(exited_kids);
                init.child_exit.broadcast();
            }
        }
        let pp = parent.expect("checked above");
        let ppcb = g
            .procs
            .get_mut(pp)
            .expect("a live process's parent slot is occupied");
        ppcb.exited.push_back(pid);
        ppcb.child_exit.broadcast();
    }

    let fid_table = {
        let pcb = g.procs.get_mut(pid).expect("zombifying a free slot");
        debug_assert!(pcb.children.is_empty());
        debug_assert!(pcb.exited.is_empty());
        pcb.args = Vec::new();
        std::mem::replace(&mut pcb.fid_table, [None; MAX_OPEN_FILES])
    };
    for id in fid_table.into_iter().flatten() {
        fcb::decref(g, id);
    }

    g.procs
        .get_mut(pid)
        .expect("zombifying a free slot")
        .state = ProcState::Zombie;
    log::debug!("pid {} is now a zombie", pid);

    if pid == INIT_PID {
        g.init_exit.broadcast();
    }
}
