//! Kernel error taxonomy
//!
//! Every fallible syscall returns `KResult<T>`. Resource exhaustion and
//! protocol misuse are ordinary error values; broken internal invariants
//! (reaping a non-zombie, freeing a record with waiters) are asserted, not
//! returned.

use thiserror::Error;

/// Errors reported by the syscall surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    // Resource exhaustion
    #[error("process table exhausted")]
    NoFreeProcess,
    #[error("thread table exhausted")]
    NoFreeThread,
    #[error("descriptor table exhausted")]
    NoFreeDescriptor,
    #[error("pipe table exhausted")]
    NoFreePipe,
    #[error("socket table exhausted")]
    NoFreeSocket,
    #[error("could not spawn execution context: {0}")]
    SpawnFailed(String),

    // Process / thread protocol misuse
    #[error("no such process")]
    NoSuchProcess,
    #[error("no such thread in this process")]
    NoSuchThread,
    #[error("a thread cannot join itself")]
    JoinSelf,
    #[error("thread is detached")]
    ThreadDetached,
    #[error("thread is already detached")]
    AlreadyDetached,
    #[error("thread has already exited")]
    ThreadExited,

    // Descriptor misuse
    #[error("bad file descriptor")]
    BadDescriptor,
    #[error("stream does not support this operation")]
    InvalidOperation,

    // Pipe / socket transport
    #[error("read end closed")]
    BrokenPipe,
    #[error("operation not valid in this socket state")]
    InvalidSocketState,
    #[error("bad or missing port")]
    BadPort,
    #[error("port already has a listener")]
    PortInUse,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("connection timed out")]
    TimedOut,
    #[error("socket is not connected")]
    NotConnected,
}

/// Convenience alias used throughout the crate.
pub type KResult<T> = Result<T, KernelError>;
