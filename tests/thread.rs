//! Thread lifecycle tests
//!
//! Join/detach semantics: exit-value delivery, rejection of self-joins and
//! stale tids, detach stealing a thread from blocked joiners, and cleanup
//! after detach and exit in either order.

mod common;

use std::sync::Mutex;
use std::thread::sleep;
use std::time::Duration;

use serial_test::serial;

use nukern::{
    boot, create_thread, thread_detach, thread_exit, thread_join, thread_self, KernelError, Tid,
};

/// Tids are opaque handles; tests hand them between tasks through here.
static TARGET: Mutex<Option<Tid>> = Mutex::new(None);

// =========================================================================
// Join basics
// =========================================================================

fn worker_returns_42(_args: &[u8]) -> i32 {
    42
}

fn join_basics_init(_args: &[u8]) -> i32 {
    let tid = create_thread(worker_returns_42, &[]).unwrap();
    assert_eq!(thread_join(tid).unwrap(), 42);

    // The record was reaped by the join: the tid is stale now.
    assert_eq!(thread_join(tid), Err(KernelError::NoSuchThread));

    // A thread cannot join itself.
    assert_eq!(thread_join(thread_self()), Err(KernelError::JoinSelf));
    0
}

#[test]
#[serial]
fn test_join_delivers_exit_value_then_goes_stale() {
    common::init_logging();
    assert_eq!(boot(join_basics_init, &[]).unwrap(), 0);
}

fn worker_thread_exit(_args: &[u8]) -> i32 {
    thread_exit(7);
}

fn thread_exit_init(_args: &[u8]) -> i32 {
    let tid = create_thread(worker_thread_exit, &[]).unwrap();
    assert_eq!(thread_join(tid).unwrap(), 7);
    0
}

#[test]
#[serial]
fn test_thread_exit_value_reaches_joiner() {
    common::init_logging();
    assert_eq!(boot(thread_exit_init, &[]).unwrap(), 0);
}

// =========================================================================
// Detach semantics
// =========================================================================

fn slow_worker(_args: &[u8]) -> i32 {
    sleep(Duration::from_millis(200));
    0
}

fn join_detached_init(_args: &[u8]) -> i32 {
    let tid = create_thread(slow_worker, &[]).unwrap();
    thread_detach(tid).unwrap();
    assert_eq!(thread_join(tid), Err(KernelError::ThreadDetached));
    // Give the detached worker time to exit and self-reap before teardown.
    sleep(Duration::from_millis(300));
    0
}

#[test]
#[serial]
fn test_join_rejects_detached_thread() {
    common::init_logging();
    assert_eq!(boot(join_detached_init, &[]).unwrap(), 0);
}

fn blocked_joiner(_args: &[u8]) -> i32 {
    let tid = TARGET.lock().unwrap().expect("target published");
    // Blocks until the main thread detaches the target out from under us.
    match thread_join(tid) {
        Err(KernelError::ThreadDetached) => 1,
        other => panic!("join should have been stolen by detach, got {:?}", other),
    }
}

fn detach_steals_init(_args: &[u8]) -> i32 {
    let victim = create_thread(slow_worker, &[]).unwrap();
    *TARGET.lock().unwrap() = Some(victim);
    let joiner = create_thread(blocked_joiner, &[]).unwrap();

    // Let the joiner block, then steal the victim from it.
    sleep(Duration::from_millis(50));
    thread_detach(victim).unwrap();

    assert_eq!(thread_join(joiner).unwrap(), 1);
    sleep(Duration::from_millis(300));
    0
}

#[test]
#[serial]
fn test_detach_fails_blocked_joiner_without_corruption() {
    common::init_logging();
    assert_eq!(boot(detach_steals_init, &[]).unwrap(), 0);
}

fn double_detach_init(_args: &[u8]) -> i32 {
    let tid = create_thread(slow_worker, &[]).unwrap();
    thread_detach(tid).unwrap();
    assert_eq!(thread_detach(tid), Err(KernelError::AlreadyDetached));
    sleep(Duration::from_millis(300));
    0
}

#[test]
#[serial]
fn test_double_detach_fails_cleanly() {
    common::init_logging();
    assert_eq!(boot(double_detach_init, &[]).unwrap(), 0);
}

fn quick_worker(_args: &[u8]) -> i32 {
    9
}

fn detach_after_exit_init(_args: &[u8]) -> i32 {
    let tid = create_thread(quick_worker, &[]).unwrap();
    // Let it exit un-joined, then try to detach the corpse.
    sleep(Duration::from_millis(100));
    assert_eq!(thread_detach(tid), Err(KernelError::ThreadExited));
    // The failed detach reclaimed the record: the tid is stale now.
    assert_eq!(thread_join(tid), Err(KernelError::NoSuchThread));
    0
}

#[test]
#[serial]
fn test_detach_after_exit_fails_but_cleans_up() {
    common::init_logging();
    assert_eq!(boot(detach_after_exit_init, &[]).unwrap(), 0);
}
