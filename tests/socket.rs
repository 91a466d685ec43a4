//! Socket connection protocol tests
//!
//! Listener registration and reuse, the connect/accept rendez-vous, FIFO
//! admission, connect timeouts, listener teardown under blocked peers, and
//! shutdown semantics.

mod common;

use std::thread::sleep;
use std::time::{Duration, Instant};

use serial_test::serial;

use nukern::{
    boot, accept, close, connect, create_thread, listen, read, shutdown, socket, thread_join,
    wait_child, exec, write, KernelError, ShutdownMode,
};

use common::{arg_u32, args1};

// =========================================================================
// Listener registration
// =========================================================================

fn listen_conflict_init(_args: &[u8]) -> i32 {
    let first = socket(Some(5)).unwrap();
    let second = socket(Some(5)).unwrap();

    listen(first).unwrap();
    assert_eq!(listen(second), Err(KernelError::PortInUse));

    // Closing the listener frees the port for the next one.
    close(first).unwrap();
    listen(second).unwrap();
    close(second).unwrap();
    0
}

#[test]
#[serial]
fn test_listen_conflicts_until_listener_closes() {
    common::init_logging();
    assert_eq!(boot(listen_conflict_init, &[]).unwrap(), 0);
}

fn listen_misuse_init(_args: &[u8]) -> i32 {
    let portless = socket(None).unwrap();
    assert_eq!(listen(portless), Err(KernelError::BadPort));

    let lsock = socket(Some(6)).unwrap();
    listen(lsock).unwrap();
    // Already a listener: a second listen and a connect are both invalid.
    assert_eq!(listen(lsock), Err(KernelError::InvalidSocketState));
    assert_eq!(
        connect(lsock, 6, None),
        Err(KernelError::InvalidSocketState)
    );

    // No listener anywhere on this port.
    assert_eq!(
        connect(portless, 99, Some(Duration::from_millis(10))),
        Err(KernelError::ConnectionRefused)
    );

    // Data calls on an unconnected socket.
    let mut buf = [0u8; 4];
    assert_eq!(read(portless, &mut buf), Err(KernelError::NotConnected));
    assert_eq!(write(portless, b"x"), Err(KernelError::NotConnected));

    close(portless).unwrap();
    close(lsock).unwrap();
    0
}

#[test]
#[serial]
fn test_protocol_misuse_is_rejected() {
    common::init_logging();
    assert_eq!(boot(listen_misuse_init, &[]).unwrap(), 0);
}

// =========================================================================
// Rendez-vous handshake and data transfer
// =========================================================================

fn echo_client(args: &[u8]) -> i32 {
    let port = arg_u32(args, 0) as u16;
    let sock = socket(None).unwrap();
    connect(sock, port, None).unwrap();

    write(sock, b"ping").unwrap();
    let mut buf = [0u8; 4];
    let mut got = 0;
    while got < 4 {
        let n = read(sock, &mut buf[got..]).unwrap();
        assert!(n > 0, "server hung up early");
        got += n;
    }
    assert_eq!(&buf, b"pong");

    close(sock).unwrap();
    0
}

fn echo_init(_args: &[u8]) -> i32 {
    let lsock = socket(Some(7)).unwrap();
    listen(lsock).unwrap();
    let tid = create_thread(echo_client, &args1(7)).unwrap();

    let peer = accept(lsock).unwrap();
    let mut buf = [0u8; 4];
    let mut got = 0;
    while got < 4 {
        let n = read(peer, &mut buf[got..]).unwrap();
        assert!(n > 0, "client hung up early");
        got += n;
    }
    assert_eq!(&buf, b"ping");
    write(peer, b"pong").unwrap();

    assert_eq!(thread_join(tid).unwrap(), 0);
    close(peer).unwrap();
    close(lsock).unwrap();
    0
}

#[test]
#[serial]
fn test_connect_accept_carries_data_both_ways() {
    common::init_logging();
    assert_eq!(boot(echo_init, &[]).unwrap(), 0);
}

fn tagged_client(args: &[u8]) -> i32 {
    let port = arg_u32(args, 0) as u16;
    let tag = arg_u32(args, 1) as u8;
    let delay = arg_u32(args, 2) as u64;
    sleep(Duration::from_millis(delay));

    let sock = socket(None).unwrap();
    connect(sock, port, None).unwrap();
    write(sock, &[tag]).unwrap();
    close(sock).unwrap();
    0
}

fn fifo_init(_args: &[u8]) -> i32 {
    let lsock = socket(Some(21)).unwrap();
    listen(lsock).unwrap();

    let mut args_a = Vec::new();
    common::put_u32(&mut args_a, 21);
    common::put_u32(&mut args_a, b'A' as u32);
    common::put_u32(&mut args_a, 0);
    let a = create_thread(tagged_client, &args_a).unwrap();

    let mut args_b = Vec::new();
    common::put_u32(&mut args_b, 21);
    common::put_u32(&mut args_b, b'B' as u32);
    common::put_u32(&mut args_b, 100);
    let b = create_thread(tagged_client, &args_b).unwrap();

    // Give both clients time to queue in their staggered order, then
    // serve them: admission must follow queue order.
    sleep(Duration::from_millis(250));
    for expected in [b'A', b'B'] {
        let peer = accept(lsock).unwrap();
        let mut tag = [0u8; 1];
        assert_eq!(read(peer, &mut tag).unwrap(), 1);
        assert_eq!(tag[0], expected);
        close(peer).unwrap();
    }

    thread_join(a).unwrap();
    thread_join(b).unwrap();
    close(lsock).unwrap();
    0
}

#[test]
#[serial]
fn test_concurrent_connects_are_served_fifo() {
    common::init_logging();
    assert_eq!(boot(fifo_init, &[]).unwrap(), 0);
}

// =========================================================================
// Connect timeout
// =========================================================================

fn timeout_client(args: &[u8]) -> i32 {
    let port = arg_u32(args, 0) as u16;
    let sock = socket(None).unwrap();
    let started = Instant::now();
    let result = connect(sock, port, Some(Duration::from_millis(100)));
    assert_eq!(result, Err(KernelError::TimedOut));
    assert!(started.elapsed() >= Duration::from_millis(100));
    close(sock).unwrap();
    10
}

fn timeout_init(_args: &[u8]) -> i32 {
    let lsock = socket(Some(20)).unwrap();
    listen(lsock).unwrap();

    // Nobody accepts: the client must give up after its timeout and leave
    // no request behind.
    let quitter = create_thread(timeout_client, &args1(20)).unwrap();
    assert_eq!(thread_join(quitter).unwrap(), 10);

    // The next connection must be the one the server now sees. If the
    // timed-out request were still queued, accept would trip over its
    // vanished socket instead of admitting this client.
    let mut args_c = Vec::new();
    common::put_u32(&mut args_c, 20);
    common::put_u32(&mut args_c, b'C' as u32);
    common::put_u32(&mut args_c, 0);
    let tid = create_thread(tagged_client, &args_c).unwrap();

    let peer = accept(lsock).unwrap();
    let mut tag = [0u8; 1];
    assert_eq!(read(peer, &mut tag).unwrap(), 1);
    assert_eq!(tag[0], b'C');

    thread_join(tid).unwrap();
    close(peer).unwrap();
    close(lsock).unwrap();
    0
}

#[test]
#[serial]
fn test_connect_timeout_leaves_no_queued_request() {
    common::init_logging();
    assert_eq!(boot(timeout_init, &[]).unwrap(), 0);
}

// =========================================================================
// Listener teardown under blocked peers
// =========================================================================

fn listener_closer(args: &[u8]) -> i32 {
    let fid = arg_u32(args, 0) as usize;
    sleep(Duration::from_millis(100));
    close(fid).unwrap();
    0
}

fn accept_abort_init(_args: &[u8]) -> i32 {
    let lsock = socket(Some(23)).unwrap();
    listen(lsock).unwrap();
    let tid = create_thread(listener_closer, &args1(lsock as u32)).unwrap();

    // Blocks with no client in sight; the concurrent close demotes the
    // listener and the accept must observe that and fail.
    assert_eq!(accept(lsock), Err(KernelError::InvalidSocketState));

    thread_join(tid).unwrap();
    0
}

#[test]
#[serial]
fn test_accept_fails_when_listener_closes() {
    common::init_logging();
    assert_eq!(boot(accept_abort_init, &[]).unwrap(), 0);
}

fn refused_client(args: &[u8]) -> i32 {
    let port = arg_u32(args, 0) as u16;
    let sock = socket(None).unwrap();
    let result = connect(sock, port, None);
    close(sock).unwrap();
    match result {
        Err(KernelError::ConnectionRefused) => 33,
        other => panic!("queued connect should abort on listener close, got {:?}", other),
    }
}

fn queued_abort_init(_args: &[u8]) -> i32 {
    let lsock = socket(Some(22)).unwrap();
    listen(lsock).unwrap();
    let tid = create_thread(refused_client, &args1(22)).unwrap();

    // Let the client queue up, then tear the listener down underneath it.
    sleep(Duration::from_millis(100));
    close(lsock).unwrap();

    assert_eq!(thread_join(tid).unwrap(), 33);
    0
}

#[test]
#[serial]
fn test_listener_close_aborts_queued_connects() {
    common::init_logging();
    assert_eq!(boot(queued_abort_init, &[]).unwrap(), 0);
}

// =========================================================================
// Shutdown
// =========================================================================

fn shutdown_client(args: &[u8]) -> i32 {
    let port = arg_u32(args, 0) as u16;
    let sock = socket(None).unwrap();
    connect(sock, port, None).unwrap();

    // Half-close our sending direction; the server sees end of stream but
    // can still talk back on the other pipe.
    write(sock, b"last").unwrap();
    shutdown(sock, ShutdownMode::Write).unwrap();

    let mut buf = [0u8; 5];
    let mut got = 0;
    while got < 5 {
        let n = read(sock, &mut buf[got..]).unwrap();
        assert!(n > 0);
        got += n;
    }
    assert_eq!(&buf, b"reply");

    // Writing after our own write-shutdown is refused locally.
    assert_eq!(write(sock, b"x"), Err(KernelError::NotConnected));

    shutdown(sock, ShutdownMode::Both).unwrap();
    close(sock).unwrap();
    0
}

fn shutdown_init(_args: &[u8]) -> i32 {
    let lsock = socket(Some(8)).unwrap();
    listen(lsock).unwrap();
    let tid = create_thread(shutdown_client, &args1(8)).unwrap();

    let peer = accept(lsock).unwrap();
    let mut buf = [0u8; 16];
    let mut received = Vec::new();
    loop {
        let n = read(peer, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n]);
    }
    assert_eq!(received, b"last");

    write(peer, b"reply").unwrap();
    assert_eq!(thread_join(tid).unwrap(), 0);

    // Shutdown on a non-peer socket is invalid.
    assert_eq!(
        shutdown(lsock, ShutdownMode::Both),
        Err(KernelError::NotConnected)
    );

    close(peer).unwrap();
    close(lsock).unwrap();
    0
}

#[test]
#[serial]
fn test_shutdown_write_signals_eof_and_keeps_reverse_path() {
    common::init_logging();
    assert_eq!(boot(shutdown_init, &[]).unwrap(), 0);
}

// =========================================================================
// Cross-process sockets
// =========================================================================

fn remote_client_proc(args: &[u8]) -> i32 {
    let port = arg_u32(args, 0) as u16;
    let sock = socket(None).unwrap();
    connect(sock, port, None).unwrap();
    write(sock, b"over-the-wall").unwrap();
    close(sock).unwrap();
    0
}

fn cross_process_init(_args: &[u8]) -> i32 {
    let lsock = socket(Some(30)).unwrap();
    listen(lsock).unwrap();
    let pid = exec(remote_client_proc, &args1(30)).unwrap();

    let peer = accept(lsock).unwrap();
    let mut received = Vec::new();
    let mut buf = [0u8; 8];
    loop {
        let n = read(peer, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        received.extend_from_slice(&buf[..n]);
    }
    assert_eq!(received, b"over-the-wall");

    wait_child(Some(pid)).unwrap();
    close(peer).unwrap();
    close(lsock).unwrap();
    0
}

#[test]
#[serial]
fn test_sockets_connect_across_processes() {
    common::init_logging();
    assert_eq!(boot(cross_process_init, &[]).unwrap(), 0);
}
