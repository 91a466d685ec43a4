//! Inter-process communication transport
//!
//! ## Module Organization
//!
//! - `pipe`: fixed-capacity blocking byte pipes with half-close semantics
//! - `socket`: the listen/connect/accept rendez-vous protocol over pipes
//! - `port`: the process-wide port-to-listener registry

pub mod pipe;
pub mod port;
pub mod socket;

pub use pipe::{PIPE_BUF_SIZE, MAX_PIPES};
pub use port::{Port, MAX_PORT};
pub use socket::{ShutdownMode, MAX_SOCKETS};
