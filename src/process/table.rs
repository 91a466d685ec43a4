//! The process table
//!
//! A fixed arena of `MAX_PROCESSES` slots with a dedicated free list of
//! indices. The free list initially yields pids in ascending order, so the
//! idle process lands in slot 0 and init in slot 1 at boot. Reaping a
//! zombie is the only path that returns a slot to the free list.

use super::types::{Pcb, Pid, MAX_PROCESSES};

pub struct ProcessTable {
    slots: Vec<Option<Pcb>>,
    free: Vec<Pid>,
    used: usize,
}

impl ProcessTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_PROCESSES);
        slots.resize_with(MAX_PROCESSES, || None);
        // Popping from the back hands out 0, 1, 2, ... on a fresh table.
        let free = (0..MAX_PROCESSES as Pid).rev().collect();
        Self {
            slots,
            free,
            used: 0,
        }
    }

    /// Take a free slot and install a fresh alive record in it.
    pub fn acquire(&mut self, parent: Option<Pid>) -> Option<Pid> {
        let pid = self.free.pop()?;
        debug_assert!(self.slots[pid as usize].is_none());
        self.slots[pid as usize] = Some(Pcb::new(parent));
        self.used += 1;
        Some(pid)
    }

    /// Return a slot to the free list.
    pub fn release(&mut self, pid: Pid) {
        let slot = self
            .slots
            .get_mut(pid as usize)
            .expect("pid out of table range");
        assert!(slot.is_some(), "releasing a free process slot");
        *slot = None;
        self.free.push(pid);
        self.used -= 1;
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.slots.get(pid as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        self.slots.get_mut(pid as usize)?.as_mut()
    }

    /// Occupied slots in ascending pid order.
    pub fn iter(&self) -> impl Iterator<Item = (Pid, &Pcb)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|p| (i as Pid, p)))
    }

    pub fn used(&self) -> usize {
        self.used
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}
