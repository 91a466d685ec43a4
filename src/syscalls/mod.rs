//! The syscall surface
//!
//! Free functions callable from kernel tasks. Every entry acquires the
//! global kernel lock; blocking calls release it while suspended.

pub mod fd;
pub mod ipc;
pub mod process;
pub mod thread;

pub use fd::{close, open_info, read, write};
pub use ipc::{accept, connect, listen, pipe, shutdown, socket};
pub use process::{exec, exit, get_pid, get_ppid, wait_child};
pub use thread::{create_thread, thread_detach, thread_exit, thread_join, thread_self};
