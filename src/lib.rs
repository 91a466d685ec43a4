//! nukern — a hosted cooperative kernel core
//!
//! The kernel runs entirely in user space: kernel tasks are host threads,
//! one global kernel lock serializes every syscall, and all blocking goes
//! through condition variables that release that lock while suspended.
//! State is purely in-memory for the life of a boot cycle.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Syscall Surface                         │
//! │  exec/exit/wait · threads · pipe/socket · read/write/close  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  (global kernel lock)
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │ Process/Thread  │ │  IPC Transport  │ │  File Layer     │
//! │ table · zombies │ │ pipes · sockets │ │ Fcb refcounts   │
//! │ join/detach     │ │ port registry   │ │ fid tables      │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Scheduler: contexts, condvars, trampolines           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use nukern::{boot, pipe, read, write, close};
//!
//! fn init(_args: &[u8]) -> i32 {
//!     let (r, w) = pipe().unwrap();
//!     write(w, b"hello").unwrap();
//!     close(w).unwrap();
//!     let mut buf = [0u8; 16];
//!     let n = read(r, &mut buf).unwrap();
//!     assert_eq!(&buf[..n], b"hello");
//!     close(r).unwrap();
//!     0
//! }
//!
//! assert_eq!(boot(init, &[]).unwrap(), 0);
//! ```

pub mod errors;
pub mod fs;
pub mod ipc;
pub mod kernel;
pub mod process;
pub mod registry;
pub mod scheduler;
pub mod syscalls;

pub use errors::{KResult, KernelError};
pub use fs::Fid;
pub use ipc::{Port, ShutdownMode, MAX_PORT, MAX_PIPES, MAX_SOCKETS, PIPE_BUF_SIZE};
pub use kernel::boot;
pub use process::{
    Pid, ProcInfo, Task, Tid, IDLE_PID, INIT_PID, MAX_OPEN_FILES, MAX_PROCESSES, MAX_THREADS,
    PROCINFO_ARGS_MAX, PROCINFO_NO_PARENT, PROCINFO_RECORD_SIZE,
};
pub use syscalls::{
    accept, close, connect, create_thread, exec, exit, get_pid, get_ppid, listen, open_info, pipe,
    read, shutdown, socket, thread_detach, thread_exit, thread_join, thread_self, wait_child,
    write,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
