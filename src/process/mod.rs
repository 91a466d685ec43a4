//! Process and thread lifecycle manager
//!
//! The process table, per-thread control records, exec/exit/wait/join/
//! detach semantics, orphan reparenting to init, and zombie reaping.
//!
//! ## Module Organization
//!
//! - `types`: Pid/Tid/Task, table limits, `Pcb` and `ThreadCb`
//! - `table`: the fixed process arena and its free list
//! - `lifecycle`: exec, process exit, wait, reparenting, reaping
//! - `thread`: thread create/self/join/detach/exit bookkeeping
//! - `info`: the read-only process-table introspection stream

pub mod info;
pub mod lifecycle;
pub mod table;
pub mod thread;
pub mod types;

pub use info::{ProcInfo, InfoCb, PROCINFO_ARGS_MAX, PROCINFO_NO_PARENT, PROCINFO_RECORD_SIZE};
pub use types::{
    Pid, ProcState, Task, Tid, IDLE_PID, INIT_PID, MAX_OPEN_FILES, MAX_PROCESSES, MAX_THREADS,
};
