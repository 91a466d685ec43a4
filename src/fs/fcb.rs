//! Open-file records and per-process descriptor tables
//!
//! Each process owns a fixed table of descriptors; a descriptor resolves to
//! a shared, reference-counted `Fcb` whose backing object is a tagged
//! variant — the payload is only reachable under the matching tag, so a
//! pipe end can never be driven with socket operations. Descriptor
//! duplication across `exec` shares the Fcb and bumps its count; the last
//! release closes the backing stream.

use crate::errors::{KResult, KernelError};
use crate::ipc::pipe::{self, PipeEnd, PipeId};
use crate::ipc::socket::{self, SocketId};
use crate::kernel::KernelGuard;
use crate::process::info::InfoCb;
use crate::registry::Id;
use crate::scheduler::context;

/// Per-process descriptor index.
pub type Fid = usize;

pub type FcbId = Id<Fcb>;

/// Maximum number of live open-file records, kernel-wide.
pub const MAX_FILES: usize = 512;

/// Backing object of an open-file record.
#[derive(Debug, Clone, Copy)]
pub enum StreamObj {
    /// Reserved but not yet wired; rejects all I/O.
    Null,
    PipeRead(PipeId),
    PipeWrite(PipeId),
    Socket(SocketId),
    ProcInfo(InfoCb),
}

/// Open-file record shared between descriptor-table entries.
pub struct Fcb {
    pub refcount: usize,
    pub object: StreamObj,
}

/// Reserve `n` descriptors in the calling process and allocate one fresh
/// Fcb per descriptor, atomically: on any partial failure everything
/// reserved so far is rolled back.
pub(crate) fn reserve(g: &mut KernelGuard, n: usize) -> KResult<Vec<(Fid, FcbId)>> {
    let pid = context::current().pid;
    let free_fids: Vec<Fid> = {
        let pcb = g.procs.get(pid).expect("caller must be alive");
        pcb.fid_table
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(fid, _)| fid)
            .take(n)
            .collect()
    };
    if free_fids.len() < n {
        return Err(KernelError::NoFreeDescriptor);
    }

    let mut reserved = Vec::with_capacity(n);
    for &fid in &free_fids {
        match g.fcbs.insert(Fcb {
            refcount: 1,
            object: StreamObj::Null,
        }) {
            Some(id) => {
                g.procs.get_mut(pid).expect("caller must be alive").fid_table[fid] = Some(id);
                reserved.push((fid, id));
            }
            None => {
                unreserve(g, &reserved);
                return Err(KernelError::NoFreeDescriptor);
            }
        }
    }
    Ok(reserved)
}

/// Roll back a reservation whose stream objects were never wired.
pub(crate) fn unreserve(g: &mut KernelGuard, reserved: &[(Fid, FcbId)]) {
    let pid = context::current().pid;
    for &(fid, id) in reserved {
        g.procs.get_mut(pid).expect("caller must be alive").fid_table[fid] = None;
        let fcb = g.fcbs.remove(id).expect("unreserving a freed fcb");
        debug_assert_eq!(fcb.refcount, 1, "unreserve after sharing");
    }
}

pub(crate) fn set_object(g: &mut KernelGuard, id: FcbId, object: StreamObj) {
    g.fcbs
        .get_mut(id)
        .expect("wiring a freed fcb")
        .object = object;
}

pub(crate) fn incref(g: &mut KernelGuard, id: FcbId) {
    g.fcbs
        .get_mut(id)
        .expect("incref on a freed fcb")
        .refcount += 1;
}

/// Drop one reference; the last release closes the backing stream and
/// frees the record.
pub(crate) fn decref(g: &mut KernelGuard, id: FcbId) {
    let remaining = {
        let fcb = g.fcbs.get_mut(id).expect("decref on a freed fcb");
        debug_assert!(fcb.refcount > 0, "fcb reference count underflow");
        fcb.refcount -= 1;
        fcb.refcount
    };
    if remaining > 0 {
        return;
    }
    let fcb = g.fcbs.remove(id).expect("last reference");
    match fcb.object {
        StreamObj::Null | StreamObj::ProcInfo(_) => {}
        StreamObj::PipeRead(p) => pipe::close_end(g, p, PipeEnd::Read),
        StreamObj::PipeWrite(p) => pipe::close_end(g, p, PipeEnd::Write),
        StreamObj::Socket(s) => socket::close(g, s),
    }
}

/// Resolve a descriptor of the calling process.
pub(crate) fn resolve(g: &KernelGuard, fid: Fid) -> KResult<FcbId> {
    let pid = context::current().pid;
    g.procs
        .get(pid)
        .expect("caller must be alive")
        .fid_table
        .get(fid)
        .copied()
        .flatten()
        .ok_or(KernelError::BadDescriptor)
}

/// Close a descriptor: unlink it from the calling process and drop its
/// reference.
pub(crate) fn close_fid(g: &mut KernelGuard, fid: Fid) -> KResult<()> {
    let pid = context::current().pid;
    let id = {
        let pcb = g.procs.get_mut(pid).expect("caller must be alive");
        pcb.fid_table
            .get_mut(fid)
            .and_then(|slot| slot.take())
            .ok_or(KernelError::BadDescriptor)?
    };
    decref(g, id);
    Ok(())
}
