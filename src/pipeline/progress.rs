//! Per-chunk and per-run accounting

use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSummary {
    pub index: usize,
    pub units: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rows: usize,
    pub tokens: u64,
    pub elapsed: Duration,
}

impl ChunkSummary {
    /// Units per minute.
    pub fn pace(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.units as f64 / minutes
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total_units: usize,
    pub total_chunks: usize,
    pub processed: Vec<ChunkSummary>,
    pub skipped: Vec<usize>,
    pub total_tokens: u64,
    /// Chunk that was about to start when cancellation was observed.
    pub cancelled_before: Option<usize>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn failures(&self) -> usize {
        self.processed.iter().map(|c| c.failed).sum()
    }

    pub fn rows(&self) -> usize {
        self.processed.iter().map(|c| c.rows).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.cancelled_before.is_none()
    }

    /// Opening line of the final log entry.
    pub fn outcome(&self) -> String {
        match self.cancelled_before {
            None => "All chunks processed.".to_string(),
            Some(next) => format!(
                "Run interrupted before chunk {} of {}.",
                next, self.total_chunks
            ),
        }
    }
}

/// Accumulates chunk summaries and logs them as they arrive.
pub struct ProgressTracker {
    started: Instant,
    summary: RunSummary,
}

impl ProgressTracker {
    pub fn new(total_units: usize, total_chunks: usize) -> Self {
        info!("Total units to process: {}", total_units);
        Self {
            started: Instant::now(),
            summary: RunSummary {
                total_units,
                total_chunks,
                ..RunSummary::default()
            },
        }
    }

    pub fn chunk_skipped(&mut self, index: usize) {
        info!("Chunk {} already processed (files exist). Skipping.", index);
        self.summary.skipped.push(index);
    }

    pub fn chunk_finished(&mut self, chunk: ChunkSummary) {
        self.summary.total_tokens += chunk.tokens;
        info!(
            "Finished chunk {}. Units: {} ({} ok, {} failed). Rows: {}. \
             Tokens this chunk: {}. Total tokens so far: {}. Elapsed: {:.2}s. Pace: {:.2} units/min.",
            chunk.index,
            chunk.units,
            chunk.succeeded,
            chunk.failed,
            chunk.rows,
            chunk.tokens,
            self.summary.total_tokens,
            chunk.elapsed.as_secs_f64(),
            chunk.pace()
        );
        self.summary.processed.push(chunk);
    }

    pub fn cancelled(&mut self, next_chunk: usize) {
        info!("Cancellation requested; stopping before chunk {}", next_chunk);
        self.summary.cancelled_before = Some(next_chunk);
    }

    pub fn finish(mut self) -> RunSummary {
        self.summary.elapsed = self.started.elapsed();
        info!(
            "{} {} processed, {} skipped, {} failed units, {} tokens. \
             Total elapsed time: {:.2} seconds.",
            self.summary.outcome(),
            self.summary.processed.len(),
            self.summary.skipped.len(),
            self.summary.failures(),
            self.summary.total_tokens,
            self.summary.elapsed.as_secs_f64()
        );
        self.summary
    }
}
