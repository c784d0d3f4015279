//! Last-completed-chunk checkpoint
//!
//! The checkpoint is a single integer in a small text file. It is a resume
//! hint; skip decisions are made from artifact presence.

use crate::error::Result;
use crate::storage::write_atomic;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CHECKPOINT_FILE: &str = "checkpoint.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointState {
    NoCheckpoint,
    AtChunk(usize),
}

impl CheckpointState {
    /// Chunk a resumed run is expected to start from.
    pub fn next_chunk(&self) -> usize {
        match self {
            CheckpointState::NoCheckpoint => 1,
            CheckpointState::AtChunk(k) => k + 1,
        }
    }
}

#[derive(Debug)]
pub struct CheckpointManager {
    path: PathBuf,
    state: CheckpointState,
}

impl CheckpointManager {
    pub fn for_run(run_dir: &Path) -> Self {
        Self::open(run_dir.join(CHECKPOINT_FILE))
    }

    /// Reads the checkpoint; a missing or unparsable file means "start over".
    pub fn open(path: PathBuf) -> Self {
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => match content.trim().parse::<usize>() {
                Ok(k) => {
                    info!("Resuming from chunk {}", k + 1);
                    CheckpointState::AtChunk(k)
                }
                Err(_) => {
                    warn!("Invalid checkpoint file. Starting from the beginning.");
                    CheckpointState::NoCheckpoint
                }
            },
            Err(_) => {
                info!("No checkpoint file found. Starting from the beginning.");
                CheckpointState::NoCheckpoint
            }
        };

        Self { path, state }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> CheckpointState {
        self.state
    }

    /// Records `chunk_index` as completed. Call only after every artifact of
    /// that chunk is on disk.
    pub fn advance(&mut self, chunk_index: usize) -> Result<()> {
        write_atomic(&self.path, chunk_index.to_string().as_bytes())?;
        self.state = CheckpointState::AtChunk(chunk_index);
        Ok(())
    }
}
