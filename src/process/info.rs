//! Process-table introspection stream
//!
//! `open_info` reserves a descriptor whose reads yield one fixed-size
//! record per occupied process-table slot, in ascending pid order, resuming
//! where the previous read stopped. A read with less room than one record,
//! or past the last slot, returns 0 bytes.

use crate::errors::KResult;
use crate::fs::fcb::{self, FcbId, Fid, StreamObj};
use crate::kernel::KernelGuard;

use super::types::{Pid, ProcState, MAX_PROCESSES};

/// Argument bytes included in a record; longer buffers are truncated.
pub const PROCINFO_ARGS_MAX: usize = 128;
/// Encoded size of one record.
pub const PROCINFO_RECORD_SIZE: usize = 28 + PROCINFO_ARGS_MAX;
/// Wire sentinel for "no parent".
pub const PROCINFO_NO_PARENT: u32 = u32::MAX;

/// One decoded process-table record.
///
/// Layout (little-endian): pid u32, ppid u32 (`PROCINFO_NO_PARENT` when
/// none), alive u32, thread_count u32, task identity u64, args_len u32
/// (original length), then `PROCINFO_ARGS_MAX` argument bytes, truncated
/// and zero-padded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcInfo {
    pub pid: Pid,
    pub ppid: Option<Pid>,
    pub alive: bool,
    pub thread_count: u32,
    pub task_id: u64,
    pub args_len: u32,
    pub args: Vec<u8>,
}

impl ProcInfo {
    pub fn encode(&self, out: &mut [u8]) {
        assert!(out.len() >= PROCINFO_RECORD_SIZE);
        out[0..4].copy_from_slice(&self.pid.to_le_bytes());
        out[4..8].copy_from_slice(&self.ppid.unwrap_or(PROCINFO_NO_PARENT).to_le_bytes());
        out[8..12].copy_from_slice(&(self.alive as u32).to_le_bytes());
        out[12..16].copy_from_slice(&self.thread_count.to_le_bytes());
        out[16..24].copy_from_slice(&self.task_id.to_le_bytes());
        out[24..28].copy_from_slice(&self.args_len.to_le_bytes());
        let args = &mut out[28..PROCINFO_RECORD_SIZE];
        args.fill(0);
        let n = self.args.len().min(PROCINFO_ARGS_MAX);
        args[..n].copy_from_slice(&self.args[..n]);
    }

    pub fn decode(buf: &[u8]) -> Self {
        assert!(buf.len() >= PROCINFO_RECORD_SIZE);
        let u32_at = |o: usize| u32::from_le_bytes(buf[o..o + 4].try_into().unwrap());
        let ppid = u32_at(4);
        let args_len = u32_at(24);
        let kept = (args_len as usize).min(PROCINFO_ARGS_MAX);
        Self {
            pid: u32_at(0),
            ppid: (ppid != PROCINFO_NO_PARENT).then_some(ppid),
            alive: u32_at(8) != 0,
            thread_count: u32_at(12),
            task_id: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            args_len,
            args: buf[28..28 + kept].to_vec(),
        }
    }
}

/// Cursor state of one open info stream.
#[derive(Debug, Clone, Copy)]
pub struct InfoCb {
    pub cursor: usize,
}

/// Open a read-only stream over the process table.
pub(crate) fn open_info(g: &mut KernelGuard) -> KResult<Fid> {
    let ends = fcb::reserve(g, 1)?;
    let (fid, fcb_id) = ends[0];
    fcb::set_object(g, fcb_id, StreamObj::ProcInfo(InfoCb { cursor: 0 }));
    Ok(fid)
}

/// Stream read: append records for every occupied slot from the cursor on,
/// as long as a whole record fits.
pub(crate) fn read(g: &mut KernelGuard, fcb_id: FcbId, buf: &mut [u8]) -> usize {
    let mut cursor = match g.fcbs.get(fcb_id).map(|f| f.object) {
        Some(StreamObj::ProcInfo(cb)) => cb.cursor,
        _ => return 0,
    };

    let mut written = 0;
    while written + PROCINFO_RECORD_SIZE <= buf.len() {
        while cursor < MAX_PROCESSES && g.procs.get(cursor as Pid).is_none() {
            cursor += 1;
        }
        if cursor >= MAX_PROCESSES {
            break;
        }
        let pcb = g.procs.get(cursor as Pid).expect("occupied slot");
        let info = ProcInfo {
            pid: cursor as Pid,
            ppid: pcb.parent,
            alive: pcb.state == ProcState::Alive,
            thread_count: pcb.thread_count as u32,
            task_id: pcb.main_task.map(|t| t as usize as u64).unwrap_or(0),
            args_len: pcb.args.len() as u32,
            args: pcb.args.iter().copied().take(PROCINFO_ARGS_MAX).collect(),
        };
        info.encode(&mut buf[written..written + PROCINFO_RECORD_SIZE]);
        written += PROCINFO_RECORD_SIZE;
        cursor += 1;
    }

    if let Some(f) = g.fcbs.get_mut(fcb_id) {
        f.object = StreamObj::ProcInfo(InfoCb { cursor });
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip_truncates_args() {
        let info = ProcInfo {
            pid: 3,
            ppid: Some(1),
            alive: true,
            thread_count: 2,
            task_id: 0xdead_beef,
            args_len: 200,
            args: vec![7u8; PROCINFO_ARGS_MAX],
        };
        let mut buf = [0u8; PROCINFO_RECORD_SIZE];
        info.encode(&mut buf);
        let back = ProcInfo::decode(&buf);
        assert_eq!(back, info);
    }

    #[test]
    fn test_no_parent_sentinel() {
        let info = ProcInfo {
            pid: 0,
            ppid: None,
            alive: true,
            thread_count: 1,
            task_id: 0,
            args_len: 0,
            args: Vec::new(),
        };
        let mut buf = [0u8; PROCINFO_RECORD_SIZE];
        info.encode(&mut buf);
        assert_eq!(&buf[4..8], &PROCINFO_NO_PARENT.to_le_bytes());
        assert_eq!(ProcInfo::decode(&buf).ppid, None);
    }
}
