//! Chunk-by-chunk driver
//!
//! Chunks run strictly one after another. Inside a chunk the dispatcher fans
//! out; everything that touches disk happens here, on the driver task, after
//! the chunk's calls have all returned.

use super::checkpoint::CheckpointManager;
use super::dispatch::Dispatcher;
use super::flatten::{flatten_results, write_failures, write_structured};
use super::grouping::build_units;
use super::progress::{ChunkSummary, ProgressTracker, RunSummary};
use super::scheduler::{decide, plan_chunks, Chunk, ChunkArtifacts, ChunkDecision};
use super::serializer::{read_raw_document, serialize_results, write_raw_document, SerializedChunk};
use super::shutdown::ShutdownSignal;
use super::types::Unit;
use crate::client::{Classifier, PromptBuilder};
use crate::config::{ClassifierConfig, FieldMapping, InputConfig, Instructions};
use crate::error::{Error, Result};
use crate::table::InputTable;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub struct PipelineRunner {
    run_dir: PathBuf,
    chunk_size: usize,
    mapping: Vec<FieldMapping>,
    dispatcher: Dispatcher,
    shutdown: ShutdownSignal,
}

impl PipelineRunner {
    pub fn new(
        config: &ClassifierConfig,
        instructions: Instructions,
        classifier: Arc<dyn Classifier>,
        run_dir: impl Into<PathBuf>,
    ) -> Self {
        let prompt = PromptBuilder::new(
            config.model.name.clone(),
            instructions,
            config.input.include_body,
        );

        Self {
            run_dir: run_dir.into(),
            chunk_size: config.batch.chunk_size,
            mapping: config.mapping.clone(),
            dispatcher: Dispatcher::new(classifier, prompt, config.batch.max_workers),
            shutdown: ShutdownSignal::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Groups the table and runs every chunk.
    pub async fn run(&self, table: &InputTable, input: &InputConfig) -> Result<RunSummary> {
        let units = build_units(table, input)?;
        self.run_units(&units).await
    }

    pub async fn run_units(&self, units: &[Unit]) -> Result<RunSummary> {
        info!("Starting classification in chunks...");
        std::fs::create_dir_all(&self.run_dir)
            .map_err(|e| Error::persistence(&self.run_dir, e))?;

        let chunks = plan_chunks(units.len(), self.chunk_size)?;
        let mut checkpoint = CheckpointManager::for_run(&self.run_dir);
        let mut progress = ProgressTracker::new(units.len(), chunks.len());

        for chunk in &chunks {
            let artifacts = ChunkArtifacts::for_chunk(&self.run_dir, chunk.index);

            let summary = match decide(&artifacts) {
                ChunkDecision::Skip => {
                    checkpoint.advance(chunk.index)?;
                    progress.chunk_skipped(chunk.index);
                    continue;
                }
                ChunkDecision::Reflatten => {
                    info!(
                        "Chunk {} has raw results but no structured output; rebuilding",
                        chunk.index
                    );
                    let started = Instant::now();
                    let serialized = SerializedChunk::from_records(read_raw_document(&artifacts.raw)?);
                    self.write_outputs(chunk, serialized, &artifacts, started)?
                }
                ChunkDecision::Dispatch => {
                    if self.shutdown.is_shutdown_requested() {
                        progress.cancelled(chunk.index);
                        break;
                    }
                    self.process_chunk(chunk, &units[chunk.range.clone()], &artifacts)
                        .await?
                }
            };

            checkpoint.advance(chunk.index)?;
            progress.chunk_finished(summary);
        }

        Ok(progress.finish())
    }

    async fn process_chunk(
        &self,
        chunk: &Chunk,
        units: &[Unit],
        artifacts: &ChunkArtifacts,
    ) -> Result<ChunkSummary> {
        info!("Processing chunk {} ({} units)...", chunk.index, units.len());
        let started = Instant::now();

        let results = self.dispatcher.dispatch(units, chunk.range.start).await;
        let serialized = serialize_results(results);
        write_raw_document(&artifacts.raw, &serialized.records)?;

        self.write_outputs(chunk, serialized, artifacts, started)
    }

    /// Flattens a chunk's raw records and writes its structured and failure
    /// documents.
    fn write_outputs(
        &self,
        chunk: &Chunk,
        serialized: SerializedChunk,
        artifacts: &ChunkArtifacts,
        started: Instant,
    ) -> Result<ChunkSummary> {
        let output = flatten_results(&serialized.records, &self.mapping);

        if output.failures.is_empty() {
            // A failure document left from an interrupted attempt no longer applies.
            if artifacts.failures.exists() {
                std::fs::remove_file(&artifacts.failures)
                    .map_err(|e| Error::persistence(&artifacts.failures, e))?;
            }
        } else {
            write_failures(&artifacts.failures, &output.failures)?;
            info!("Failed requests saved to: {}", artifacts.failures.display());
        }

        // The structured document marks the chunk as done; it is written last.
        if output.table.rows.is_empty() {
            warn!("Flattened table is empty for chunk {}.", chunk.index);
        }
        write_structured(&artifacts.structured, &output.table)?;

        let units = serialized.records.len();
        Ok(ChunkSummary {
            index: chunk.index,
            units,
            succeeded: units.saturating_sub(output.failures.len()),
            failed: output.failures.len(),
            rows: output.table.rows.len(),
            tokens: serialized.tokens,
            elapsed: started.elapsed(),
        })
    }
}
