//! The kernel singleton and boot entry point
//!
//! One global `Mutex<Kernel>` is the big kernel lock: every syscall acquires
//! it on entry, and every blocking primitive releases it while suspended.
//! All shared kernel records (process table, thread records, pipe buffers,
//! socket records, open-file records, pending connection requests) live
//! inside this struct and are only touched while the lock is held. The port
//! registry is the one exception: it carries its own lock (see `ipc::port`).

use std::thread::JoinHandle;

use lazy_static::lazy_static;
use parking_lot::{Mutex, MutexGuard};

use crate::errors::KResult;
use crate::fs::fcb::{Fcb, MAX_FILES};
use crate::ipc::pipe::{PipeCb, MAX_PIPES};
use crate::ipc::port;
use crate::ipc::socket::{ConnRequest, SocketCb, MAX_SOCKETS};
use crate::process::lifecycle;
use crate::process::table::ProcessTable;
use crate::process::types::{ProcState, Task, ThreadCb, IDLE_PID, INIT_PID, MAX_THREADS};
use crate::registry::Registry;
use crate::scheduler::condvar::CondVar;
use crate::scheduler::context;

/// All mutable kernel state, guarded by the global kernel lock.
pub struct Kernel {
    pub procs: ProcessTable,
    pub threads: Registry<ThreadCb>,
    pub pipes: Registry<PipeCb>,
    pub sockets: Registry<SocketCb>,
    pub requests: Registry<ConnRequest>,
    pub fcbs: Registry<Fcb>,
    /// Signalled when init becomes a zombie; boot waits here.
    pub init_exit: CondVar,
    /// Host threads backing every spawned execution context; boot joins
    /// them before returning.
    pub handles: Vec<JoinHandle<()>>,
}

impl Kernel {
    fn new() -> Self {
        Self {
            procs: ProcessTable::new(),
            threads: Registry::with_capacity(MAX_THREADS),
            pipes: Registry::with_capacity(MAX_PIPES),
            sockets: Registry::with_capacity(MAX_SOCKETS),
            requests: Registry::with_capacity(MAX_SOCKETS),
            fcbs: Registry::with_capacity(MAX_FILES),
            init_exit: CondVar::new(),
            handles: Vec::new(),
        }
    }
}

lazy_static! {
    static ref KERNEL: Mutex<Kernel> = Mutex::new(Kernel::new());
    /// Serializes whole boot/run/shutdown cycles.
    static ref BOOT_LOCK: Mutex<()> = Mutex::new(());
}

/// Guard type of the global kernel lock. Blocking helpers take `&mut` of
/// this so condition variables can release and reacquire the lock.
pub type KernelGuard = MutexGuard<'static, Kernel>;

/// Acquire the global kernel lock.
pub(crate) fn lock() -> KernelGuard {
    KERNEL.lock()
}

/// The idle task never actually runs: slot 0 is carried by the thread that
/// called `boot`, which idles inside `boot` itself.
fn idle_task(_args: &[u8]) -> i32 {
    0
}

/// Bring the kernel up, run `init` as pid 1, and tear everything down.
///
/// The calling thread becomes the idle process (pid 0): it installs itself
/// in the process table, execs the init task, and then idles until init has
/// become a zombie. Init is parentless, so boot reaps it directly, joins
/// every spawned host thread, and returns init's exit status.
///
/// Consecutive boots are allowed; concurrent boots serialize.
pub fn boot(init: Task, args: &[u8]) -> KResult<i32> {
    let _cycle = BOOT_LOCK.lock();
    context::install_exit_hook();

    let mut g = lock();
    *g = Kernel::new();
    port::reset();

    // Install the calling thread as the idle process and its only thread.
    let idle = g.procs.acquire(None).expect("fresh process table");
    debug_assert_eq!(idle, IDLE_PID);
    let mut idle_tcb = ThreadCb::new(idle, idle_task, Vec::new());
    idle_tcb.started = true;
    let idle_tid = g.threads.insert(idle_tcb).expect("fresh thread table");
    {
        let pcb = g.procs.get_mut(idle).expect("idle slot just acquired");
        pcb.main_task = Some(idle_task);
        pcb.threads.push(idle_tid);
        pcb.thread_count = 1;
    }
    context::set_current(idle, idle_tid);

    log::info!("kernel up: booting init task ({} byte args)", args.len());
    let init_pid = match lifecycle::exec(&mut g, init, args) {
        Ok(pid) => pid,
        Err(e) => {
            drop(g);
            context::clear_current();
            return Err(e);
        }
    };
    debug_assert_eq!(init_pid, INIT_PID);

    // Idle until init has fully exited, then reap it.
    while g.procs.get(INIT_PID).map(|p| p.state) == Some(ProcState::Alive) {
        let cv = g.init_exit.clone();
        cv.wait(&mut g);
    }
    let status = lifecycle::cleanup_zombie(&mut g, INIT_PID);
    debug_assert_eq!(g.procs.used(), 1, "only the idle process may survive init");

    let handles = std::mem::take(&mut g.handles);
    drop(g);
    for handle in handles {
        let _ = handle.join();
    }
    context::clear_current();

    log::info!("kernel down: init exited with status {}", status);
    Ok(status)
}
