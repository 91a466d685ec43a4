//! The port registry
//!
//! A fixed array from port number to at most one listening socket, guarded
//! by its own lock. The lock order is always kernel lock first, port lock
//! second; the registry never calls back into the kernel.

use lazy_static::lazy_static;
use parking_lot::Mutex;

use super::socket::SocketId;

/// Port number type.
pub type Port = u16;

/// Highest valid port number.
pub const MAX_PORT: Port = 1023;

struct PortTable {
    entries: Vec<Option<SocketId>>,
}

impl PortTable {
    fn new() -> Self {
        Self {
            entries: vec![None; MAX_PORT as usize + 1],
        }
    }
}

lazy_static! {
    static ref PORT_MAP: Mutex<PortTable> = Mutex::new(PortTable::new());
}

/// Register `listener` on `port`. Fails when the port is occupied.
pub(crate) fn register(port: Port, listener: SocketId) -> bool {
    let mut map = PORT_MAP.lock();
    let entry = &mut map.entries[port as usize];
    if entry.is_some() {
        return false;
    }
    *entry = Some(listener);
    true
}

/// Clear `port`, but only if `listener` is still the registered socket.
/// Guards against a stale unregister racing a reused port.
pub(crate) fn unregister(port: Port, listener: SocketId) {
    let mut map = PORT_MAP.lock();
    let entry = &mut map.entries[port as usize];
    if *entry == Some(listener) {
        *entry = None;
    }
}

/// Current listener on `port`, if any.
pub(crate) fn lookup(port: Port) -> Option<SocketId> {
    PORT_MAP.lock().entries[port as usize]
}

/// Drop every registration. Called on boot.
pub(crate) fn reset() {
    let mut map = PORT_MAP.lock();
    map.entries.iter_mut().for_each(|e| *e = None);
}
