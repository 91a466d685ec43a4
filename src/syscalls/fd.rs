//! Descriptor syscalls
//!
//! Implements: read, write, close, open_info. Operations dispatch on the
//! descriptor's backing object; a stream that does not support the
//! requested direction rejects it synchronously.

use crate::errors::{KResult, KernelError};
use crate::fs::fcb::{self, Fid, StreamObj};
use crate::ipc::{pipe, socket};
use crate::kernel;
use crate::process::info;

/// Read from a descriptor. Pipe and socket reads block per the transport
/// rules; 0 means end of stream.
pub fn read(fid: Fid, buf: &mut [u8]) -> KResult<usize> {
    let mut g = kernel::lock();
    let fcb_id = fcb::resolve(&g, fid)?;
    let object = g.fcbs.get(fcb_id).expect("resolved fcb").object;
    match object {
        StreamObj::PipeRead(p) => pipe::read(&mut g, p, buf),
        StreamObj::Socket(s) => socket::read(&mut g, s, buf),
        StreamObj::ProcInfo(_) => Ok(info::read(&mut g, fcb_id, buf)),
        StreamObj::PipeWrite(_) | StreamObj::Null => Err(KernelError::InvalidOperation),
    }
}

/// Write the whole buffer to a descriptor. Pipe and socket writes block
/// per the transport rules.
pub fn write(fid: Fid, buf: &[u8]) -> KResult<usize> {
    let mut g = kernel::lock();
    let fcb_id = fcb::resolve(&g, fid)?;
    let object = g.fcbs.get(fcb_id).expect("resolved fcb").object;
    match object {
        StreamObj::PipeWrite(p) => pipe::write(&mut g, p, buf),
        StreamObj::Socket(s) => socket::write(&mut g, s, buf),
        StreamObj::PipeRead(_) | StreamObj::ProcInfo(_) | StreamObj::Null => {
            Err(KernelError::InvalidOperation)
        }
    }
}

/// Close a descriptor of the calling process, releasing its reference to
/// the backing stream.
pub fn close(fid: Fid) -> KResult<()> {
    let mut g = kernel::lock();
    fcb::close_fid(&mut g, fid)
}

/// Open a read-only stream over the process table.
pub fn open_info() -> KResult<Fid> {
    let mut g = kernel::lock();
    info::open_info(&mut g)
}
