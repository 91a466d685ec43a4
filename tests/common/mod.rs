//! Shared helpers for the kernel integration tests.
//!
//! Kernel tasks are plain function pointers, so tests pass parameters
//! (descriptors, ports, sizes) through the task's argument buffer as
//! little-endian u32 fields.

#![allow(dead_code)]

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Read the `index`-th u32 field out of an argument buffer.
pub fn arg_u32(args: &[u8], index: usize) -> u32 {
    let off = index * 4;
    u32::from_le_bytes(args[off..off + 4].try_into().unwrap())
}

pub fn args2(a: u32, b: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    put_u32(&mut buf, a);
    put_u32(&mut buf, b);
    buf
}

pub fn args1(a: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    put_u32(&mut buf, a);
    buf
}
