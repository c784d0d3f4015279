//! Durable file output
//!
//! Every artifact a run produces goes through these helpers: the bytes are
//! written to a temporary file in the destination directory and then
//! renamed over the destination, so readers never observe a half-written
//! chunk document or checkpoint.

pub mod atomic;

pub use atomic::{write_atomic, write_json_atomic, AtomicCsvWriter};
