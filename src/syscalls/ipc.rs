//! IPC syscalls
//!
//! Implements: pipe, socket, listen, connect, accept, shutdown

use std::time::Duration;

use crate::errors::KResult;
use crate::fs::fcb::Fid;
use crate::ipc::port::Port;
use crate::ipc::socket::{self, ShutdownMode};
use crate::ipc::pipe;
use crate::kernel;

/// Create a pipe, returning `(read_end, write_end)` descriptors.
pub fn pipe() -> KResult<(Fid, Fid)> {
    let mut g = kernel::lock();
    pipe::sys_pipe(&mut g)
}

/// Create an unbound socket, optionally carrying the port it may later
/// listen on. Returns its descriptor.
pub fn socket(port: Option<Port>) -> KResult<Fid> {
    let mut g = kernel::lock();
    socket::sys_socket(&mut g, port)
}

/// Start listening on the socket's port. Fails if the socket is not
/// unbound, has no port, or the port already has a listener.
pub fn listen(fid: Fid) -> KResult<()> {
    let mut g = kernel::lock();
    socket::sys_listen(&mut g, fid)
}

/// Connect to the listener on `port`, blocking until accepted. With a
/// timeout, gives up (and unqueues the pending request) once it elapses;
/// `None` waits indefinitely.
pub fn connect(fid: Fid, port: Port, timeout: Option<Duration>) -> KResult<()> {
    let mut g = kernel::lock();
    socket::sys_connect(&mut g, fid, port, timeout)
}

/// Accept the oldest pending connection on a listening socket, returning
/// the descriptor of the new server-side peer. Fails if the listener is
/// closed while blocked.
pub fn accept(fid: Fid) -> KResult<Fid> {
    let mut g = kernel::lock();
    socket::sys_accept(&mut g, fid)
}

/// Close one or both directions of a connected socket.
pub fn shutdown(fid: Fid, mode: ShutdownMode) -> KResult<()> {
    let mut g = kernel::lock();
    socket::sys_shutdown(&mut g, fid, mode)
}
