//! Socket connection protocol
//!
//! A socket record is Unbound until it either becomes a Listener (via
//! `listen`, registering in the port registry) or a Peer (via a completed
//! `connect`/`accept` handshake). A Listener reverts to Unbound when
//! closed, which any blocked `accept` observes and fails; there is no path
//! from Peer back to Unbound short of destruction.
//!
//! The handshake is a rendez-vous: `connect` queues a request on the
//! listener and blocks; `accept` pops the oldest request, builds the
//! server-side peer, creates and cross-wires two pipes, and admits the
//! requester. Requests live on the connector's side of the call: the
//! connector allocates the record and always removes it before returning.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::errors::{KResult, KernelError};
use crate::fs::fcb::{self, Fid, StreamObj};
use crate::kernel::KernelGuard;
use crate::registry::Id;
use crate::scheduler::condvar::CondVar;

use super::pipe::{self, PipeEnd, PipeId};
use super::port::{self, Port, MAX_PORT};

/// Maximum number of live socket records, kernel-wide.
pub const MAX_SOCKETS: usize = 64;

pub type SocketId = Id<SocketCb>;
pub type ReqId = Id<ConnRequest>;

/// Which direction(s) `shutdown` closes on a connected socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    Read,
    Write,
    Both,
}

/// Role-dependent payload; only accessible under the matching tag.
pub(crate) enum SocketKind {
    Unbound,
    Listener {
        /// Pending connection requests, oldest first.
        queue: VecDeque<ReqId>,
        /// Signalled when the queue becomes non-empty or the listener is
        /// demoted; `accept` re-checks both.
        req_available: CondVar,
    },
    Peer {
        peer: SocketId,
        /// Cleared by `shutdown` so a later close cannot double-close.
        read_pipe: Option<PipeId>,
        write_pipe: Option<PipeId>,
    },
}

/// Socket control block.
pub struct SocketCb {
    /// One reference for the owning descriptor, plus transient pins taken
    /// by blocked `connect`/`accept` calls.
    refcount: usize,
    port: Option<Port>,
    pub(crate) kind: SocketKind,
}

impl SocketCb {
    pub(crate) fn unbound(port: Option<Port>) -> Self {
        Self {
            refcount: 1,
            port,
            kind: SocketKind::Unbound,
        }
    }
}

/// State of a pending connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReqState {
    Pending,
    Admitted,
    Aborted,
}

/// Transient record of one blocked `connect`, linked into a listener's
/// queue and resolved by whichever side gets there first.
pub struct ConnRequest {
    pub(crate) state: ReqState,
    pub(crate) requester: SocketId,
    pub(crate) connected: CondVar,
}

/// The `socket(port)` syscall body: reserve a descriptor and attach a
/// fresh Unbound record to it.
pub(crate) fn sys_socket(g: &mut KernelGuard, port: Option<Port>) -> KResult<Fid> {
    if let Some(p) = port {
        if p > MAX_PORT {
            return Err(KernelError::BadPort);
        }
    }
    let ends = fcb::reserve(g, 1)?;
    let (fid, fcb_id) = ends[0];
    let sid = match g.sockets.insert(SocketCb::unbound(port)) {
        Some(sid) => sid,
        None => {
            fcb::unreserve(g, &ends);
            return Err(KernelError::NoFreeSocket);
        }
    };
    fcb::set_object(g, fcb_id, StreamObj::Socket(sid));
    Ok(fid)
}

/// Resolve a descriptor to a socket record id.
fn resolve(g: &KernelGuard, fid: Fid) -> KResult<SocketId> {
    match g.fcbs.get(fcb::resolve(g, fid)?).map(|f| f.object) {
        Some(StreamObj::Socket(sid)) => Ok(sid),
        _ => Err(KernelError::InvalidOperation),
    }
}

/// `listen`: promote an Unbound socket with a concrete port to Listener.
pub(crate) fn sys_listen(g: &mut KernelGuard, fid: Fid) -> KResult<()> {
    let sid = resolve(g, fid)?;
    let s = g.sockets.get_mut(sid).expect("descriptor holds a reference");
    if !matches!(s.kind, SocketKind::Unbound) {
        return Err(KernelError::InvalidSocketState);
    }
    let port = s.port.ok_or(KernelError::BadPort)?;
    if !port::register(port, sid) {
        return Err(KernelError::PortInUse);
    }
    s.kind = SocketKind::Listener {
        queue: VecDeque::new(),
        req_available: CondVar::new(),
    };
    log::debug!("socket {:?} listening on port {}", sid, port);
    Ok(())
}

/// `connect`: queue a request on the listener at `port` and block until
/// admitted, aborted, or timed out. `None` waits indefinitely.
pub(crate) fn sys_connect(
    g: &mut KernelGuard,
    fid: Fid,
    dest: Port,
    timeout: Option<Duration>,
) -> KResult<()> {
    let sid = resolve(g, fid)?;
    if !matches!(
        g.sockets.get(sid).expect("descriptor holds a reference").kind,
        SocketKind::Unbound
    ) {
        return Err(KernelError::InvalidSocketState);
    }
    if dest > MAX_PORT {
        return Err(KernelError::BadPort);
    }

    let lid = port::lookup(dest).ok_or(KernelError::ConnectionRefused)?;
    let listener_live = g
        .sockets
        .get(lid)
        .map(|l| matches!(l.kind, SocketKind::Listener { .. }))
        .unwrap_or(false);
    if !listener_live {
        return Err(KernelError::ConnectionRefused);
    }

    // Pin our own record across the blocking handshake.
    g.sockets
        .get_mut(sid)
        .expect("descriptor holds a reference")
        .refcount += 1;

    let rid = match g.requests.insert(ConnRequest {
        state: ReqState::Pending,
        requester: sid,
        connected: CondVar::new(),
    }) {
        Some(rid) => rid,
        None => {
            release(g, sid);
            return Err(KernelError::ConnectionRefused);
        }
    };
    {
        let l = g.sockets.get_mut(lid).expect("listener checked above");
        if let SocketKind::Listener {
            queue,
            req_available,
        } = &mut l.kind
        {
            queue.push_back(rid);
            req_available.signal();
        }
    }
    log::trace!("socket {:?} connecting to port {} via {:?}", sid, dest, lid);

    let deadline = timeout.map(|t| Instant::now() + t);
    let result = loop {
        match g.requests.get(rid).expect("connector owns its request").state {
            ReqState::Admitted => break Ok(()),
            ReqState::Aborted => break Err(KernelError::ConnectionRefused),
            ReqState::Pending => {}
        }
        let cv = g
            .requests
            .get(rid)
            .expect("connector owns its request")
            .connected
            .clone();
        match deadline {
            None => cv.wait(g),
            Some(d) => {
                let now = Instant::now();
                let timed_out = now >= d || cv.wait_timeout(g, d - now);
                // A timed-out wakeup proves nothing by itself: only give
                // up if the request is still pending after expiry.
                if timed_out
                    && Instant::now() >= d
                    && matches!(
                        g.requests.get(rid).expect("connector owns its request").state,
                        ReqState::Pending
                    )
                {
                    remove_pending(g, lid, rid);
                    break Err(KernelError::TimedOut);
                }
            }
        }
    };

    g.requests.remove(rid);
    release(g, sid);
    result
}

/// Unlink a still-pending request from its listener's queue.
fn remove_pending(g: &mut KernelGuard, lid: SocketId, rid: ReqId) {
    if let Some(l) = g.sockets.get_mut(lid) {
        if let SocketKind::Listener { queue, .. } = &mut l.kind {
            queue.retain(|&r| r != rid);
        }
    }
}

/// `accept`: block until a request is queued, then build the server-side
/// peer, cross-wire two fresh pipes, and admit the connector.
pub(crate) fn sys_accept(g: &mut KernelGuard, fid: Fid) -> KResult<Fid> {
    let lid = resolve(g, fid)?;
    if !matches!(
        g.sockets.get(lid).expect("descriptor holds a reference").kind,
        SocketKind::Listener { .. }
    ) {
        return Err(KernelError::InvalidSocketState);
    }
    // Pin the listener against a concurrent close.
    g.sockets
        .get_mut(lid)
        .expect("descriptor holds a reference")
        .refcount += 1;

    let rid = loop {
        let l = g.sockets.get_mut(lid).expect("pinned listener");
        match &mut l.kind {
            SocketKind::Listener {
                queue,
                req_available,
            } => {
                if let Some(rid) = queue.pop_front() {
                    break rid;
                }
                let cv = req_available.clone();
                cv.wait(g);
            }
            // Closed while we slept: the demotion is the failure signal.
            _ => {
                release(g, lid);
                return Err(KernelError::InvalidSocketState);
            }
        }
    };

    // Build the server side. Any partial failure unwinds everything this
    // call allocated and aborts the popped request so the connector fails
    // fast instead of waiting on nothing.
    let ends = match fcb::reserve(g, 1) {
        Ok(ends) => ends,
        Err(e) => {
            abort_request(g, rid);
            release(g, lid);
            return Err(e);
        }
    };
    let (new_fid, new_fcb) = ends[0];
    let server = match g.sockets.insert(SocketCb::unbound(None)) {
        Some(sid) => sid,
        None => {
            fcb::unreserve(g, &ends);
            abort_request(g, rid);
            release(g, lid);
            return Err(KernelError::NoFreeSocket);
        }
    };
    let p1 = match pipe::create(g) {
        Ok(p) => p,
        Err(e) => {
            g.sockets.remove(server);
            fcb::unreserve(g, &ends);
            abort_request(g, rid);
            release(g, lid);
            return Err(e);
        }
    };
    let p2 = match pipe::create(g) {
        Ok(p) => p,
        Err(e) => {
            g.pipes.remove(p1);
            g.sockets.remove(server);
            fcb::unreserve(g, &ends);
            abort_request(g, rid);
            release(g, lid);
            return Err(e);
        }
    };
    // One reference per peer holding each pipe.
    pipe::set_refcount(g, p1, 2);
    pipe::set_refcount(g, p2, 2);

    let client = g
        .requests
        .get(rid)
        .expect("popped request outlives admission")
        .requester;
    g.sockets.get_mut(server).expect("just created").kind = SocketKind::Peer {
        peer: client,
        read_pipe: Some(p1),
        write_pipe: Some(p2),
    };
    {
        let c = g
            .sockets
            .get_mut(client)
            .expect("connector pinned its record");
        c.kind = SocketKind::Peer {
            peer: server,
            read_pipe: Some(p2),
            write_pipe: Some(p1),
        };
    }
    fcb::set_object(g, new_fcb, StreamObj::Socket(server));
    {
        let r = g.requests.get_mut(rid).expect("popped request");
        r.state = ReqState::Admitted;
        r.connected.signal();
    }
    release(g, lid);
    log::debug!("accept: {:?} paired with {:?}", server, client);
    Ok(new_fid)
}

/// Fail a popped or drained request; the connector removes the record.
fn abort_request(g: &mut KernelGuard, rid: ReqId) {
    if let Some(r) = g.requests.get_mut(rid) {
        r.state = ReqState::Aborted;
        r.connected.signal();
    }
}

/// `shutdown`: close one or both directions of a connected socket.
pub(crate) fn sys_shutdown(g: &mut KernelGuard, fid: Fid, mode: ShutdownMode) -> KResult<()> {
    let sid = resolve(g, fid)?;
    let s = g.sockets.get_mut(sid).expect("descriptor holds a reference");
    let SocketKind::Peer {
        read_pipe,
        write_pipe,
        ..
    } = &mut s.kind
    else {
        return Err(KernelError::NotConnected);
    };
    let (r, w) = match mode {
        ShutdownMode::Read => (read_pipe.take(), None),
        ShutdownMode::Write => (None, write_pipe.take()),
        ShutdownMode::Both => (read_pipe.take(), write_pipe.take()),
    };
    if let Some(p) = r {
        pipe::close_end(g, p, PipeEnd::Read);
    }
    if let Some(p) = w {
        pipe::close_end(g, p, PipeEnd::Write);
    }
    Ok(())
}

/// Stream read on a socket descriptor: delegates to the peer's read pipe.
pub(crate) fn read(g: &mut KernelGuard, sid: SocketId, buf: &mut [u8]) -> KResult<usize> {
    let pipe_id = match &g.sockets.get(sid).ok_or(KernelError::BadDescriptor)?.kind {
        SocketKind::Peer {
            read_pipe: Some(p), ..
        } => *p,
        _ => return Err(KernelError::NotConnected),
    };
    pipe::read(g, pipe_id, buf)
}

/// Stream write on a socket descriptor: delegates to the peer's write pipe.
pub(crate) fn write(g: &mut KernelGuard, sid: SocketId, buf: &[u8]) -> KResult<usize> {
    let pipe_id = match &g.sockets.get(sid).ok_or(KernelError::BadDescriptor)?.kind {
        SocketKind::Peer {
            write_pipe: Some(p),
            ..
        } => *p,
        _ => return Err(KernelError::NotConnected),
    };
    pipe::write(g, pipe_id, buf)
}

/// Close via descriptor release.
///
/// A Listener is demoted first regardless of remaining references: it
/// unregisters from the port registry, aborts every queued request, and
/// wakes blocked accepts so they observe the demotion. The record itself
/// is freed at reference count zero, closing a Peer's surviving pipes.
pub(crate) fn close(g: &mut KernelGuard, sid: SocketId) {
    let drained = {
        let s = g.sockets.get_mut(sid).expect("closing a freed socket");
        if matches!(s.kind, SocketKind::Listener { .. }) {
            let SocketKind::Listener {
                queue,
                req_available,
            } = std::mem::replace(&mut s.kind, SocketKind::Unbound)
            else {
                unreachable!("kind checked above");
            };
            req_available.broadcast();
            if let Some(p) = s.port {
                port::unregister(p, sid);
            }
            queue.into_iter().collect::<Vec<ReqId>>()
        } else {
            Vec::new()
        }
    };
    for rid in drained {
        abort_request(g, rid);
    }
    release(g, sid);
}

/// The single release path: drop one reference, free the record at zero.
fn release(g: &mut KernelGuard, sid: SocketId) {
    let remaining = {
        let s = g.sockets.get_mut(sid).expect("releasing a freed socket");
        debug_assert!(s.refcount > 0, "socket reference count underflow");
        s.refcount -= 1;
        s.refcount
    };
    if remaining > 0 {
        return;
    }
    let cb = g.sockets.remove(sid).expect("last reference");
    if let SocketKind::Peer {
        read_pipe,
        write_pipe,
        ..
    } = cb.kind
    {
        if let Some(p) = read_pipe {
            pipe::close_end(g, p, PipeEnd::Read);
        }
        if let Some(p) = write_pipe {
            pipe::close_end(g, p, PipeEnd::Write);
        }
    }
    log::trace!("socket {:?} freed", sid);
}
