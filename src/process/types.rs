//! Process and thread type definitions
//!
//! This module contains the type definitions used by the process subsystem:
//! the process control block, the thread control block, table limits, and
//! the task entry-point type.

use std::collections::VecDeque;

use crate::fs::fcb::FcbId;
use crate::registry::Id;
use crate::scheduler::condvar::CondVar;

/// Process ID type: the process-table slot index.
pub type Pid = u32;

/// Thread ID type: a generational handle to a thread control block.
pub type Tid = Id<ThreadCb>;

/// Entry point of a kernel task. The argument buffer is the task's private
/// copy, owned by its control block; the return value is its exit status.
pub type Task = fn(&[u8]) -> i32;

/// The idle process occupies slot 0 and has no parent.
pub const IDLE_PID: Pid = 0;
/// The init process occupies slot 1, has no parent, and inherits orphans.
pub const INIT_PID: Pid = 1;

/// Maximum number of processes supported
pub const MAX_PROCESSES: usize = 64;
/// Maximum number of live thread control blocks, kernel-wide
pub const MAX_THREADS: usize = 256;
/// Maximum number of open file descriptors per process
pub const MAX_OPEN_FILES: usize = 16;

/// Process state enumeration. A free table slot is simply empty; there is
/// no `Free` state to alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Alive,
    Zombie,
}

/// Process control block.
///
/// Child bookkeeping uses plain owned collections: `children` holds every
/// unreaped child (alive or zombie), `exited` additionally queues zombie
/// children oldest-first for `wait(any)`.
pub struct Pcb {
    pub state: ProcState,
    pub parent: Option<Pid>,
    pub children: Vec<Pid>,
    pub exited: VecDeque<Pid>,
    /// Signalled whenever one of this process's children exits.
    pub child_exit: CondVar,
    pub main_task: Option<Task>,
    /// Argument buffer, copied from the creator and owned here.
    pub args: Vec<u8>,
    pub exit_status: i32,
    /// Every unreleased thread control block of this process.
    pub threads: Vec<Tid>,
    /// Number of threads that have not yet exited.
    pub thread_count: usize,
    pub fid_table: [Option<FcbId>; MAX_OPEN_FILES],
}

impl Pcb {
    pub fn new(parent: Option<Pid>) -> Self {
        Self {
            state: ProcState::Alive,
            parent,
            children: Vec::new(),
            exited: VecDeque::new(),
            child_exit: CondVar::new(),
            main_task: None,
            args: Vec::new(),
            exit_status: 0,
            threads: Vec::new(),
            thread_count: 0,
            fid_table: [None; MAX_OPEN_FILES],
        }
    }
}

/// Thread control block, distinct from the host execution context.
///
/// Lifetime rule: the record is released by whichever of exit, detach, or
/// last-join happens last, i.e. once `exited && waiters == 0` holds for a
/// detached or joined thread. It is never released while `waiters > 0`.
pub struct ThreadCb {
    pub owner: Pid,
    pub task: Task,
    /// Argument buffer, copied from the creator and owned here.
    pub args: Vec<u8>,
    pub detached: bool,
    pub exited: bool,
    pub exit_status: i32,
    /// Number of joiners currently blocked on (or finishing with) this record.
    pub waiters: usize,
    /// Start handshake: the spawned context parks until this flips.
    pub started: bool,
    /// Signalled on exit and on detach, so joiners re-check both flags.
    pub exit_cv: CondVar,
    /// Signals the start handshake.
    pub wake: CondVar,
}

impl ThreadCb {
    pub fn new(owner: Pid, task: Task, args: Vec<u8>) -> Self {
        Self {
            owner,
            task,
            args,
            detached: false,
            exited: false,
            exit_status: 0,
            waiters: 0,
            started: false,
            exit_cv: CondVar::new(),
            wake: CondVar::new(),
        }
    }
}
