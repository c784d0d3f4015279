//! Resumable chunked classification pipeline
//!
//! Rows are grouped into units, units are split into fixed-size chunks, and
//! each chunk goes through dispatch → raw document → structured/failure
//! documents → checkpoint before the next one starts. A finished run (or a
//! partial one) can be merged into a single table at any time.

pub mod checkpoint;
pub mod dispatch;
pub mod flatten;
pub mod grouping;
pub mod merge;
pub mod progress;
pub mod runner;
pub mod scheduler;
pub mod serializer;
pub mod shutdown;
pub mod types;

pub use checkpoint::{CheckpointManager, CheckpointState};
pub use dispatch::Dispatcher;
pub use flatten::{flatten_results, FlattenOutput, FlattenedTable};
pub use grouping::build_units;
pub use merge::{merge_documents, merge_run, MergeReport};
pub use progress::{ChunkSummary, RunSummary};
pub use runner::PipelineRunner;
pub use scheduler::{plan_chunks, Chunk, ChunkArtifacts, ChunkDecision};
pub use serializer::{serialize_results, SerializedChunk};
pub use shutdown::ShutdownSignal;
pub use types::{FailureRecord, FlattenedRow, RawResult, RawResultRecord, Unit};
