//! File-like object layer
//!
//! ## Module Organization
//!
//! - `fcb`: shared open-file records, per-process descriptor tables,
//!   reservation with rollback, and tagged stream dispatch

pub mod fcb;

pub use fcb::{Fid, MAX_FILES};
