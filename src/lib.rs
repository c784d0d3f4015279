//! # Sentence Classifier
//!
//! Batch classification of sentences against a chat-completions service,
//! in resumable chunks.
//!
//! ## Usage
//!
//! ```bash
//! sentence-classifier run --config classify.toml [--run-dir out/run_20250101_120000]
//! sentence-classifier merge --run-dir out/run_20250101_120000
//! sentence-classifier reconcile --input data.csv --classified flattened_results_all.csv --output labelled.csv
//! ```
//!
//! ## Modules
//!
//! - `client` - Classifier trait, prompt assembly and the HTTP client
//! - `config` - Run configuration and instruction loading
//! - `pipeline` - Grouping, chunk scheduling, dispatch, flattening, checkpoints and merge
//! - `reconcile` - Joining merged labels back onto the original table
//! - `storage` - Atomic write-then-rename helpers
//! - `table` - CSV input tables
//! - `testing` - Scripted classifier for tests
pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod reconcile;
pub mod storage;
pub mod table;

pub mod testing;

pub use error::{Error, Result};
