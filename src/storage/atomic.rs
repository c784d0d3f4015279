use crate::error::{Error, Result};
use csv::Writer;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn temp_file_for(final_path: &Path) -> Result<NamedTempFile> {
    let parent_dir = match final_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(parent_dir)
        .map_err(|e| Error::persistence(final_path, format!("cannot create directory: {e}")))?;

    NamedTempFile::new_in(parent_dir)
        .map_err(|e| Error::persistence(final_path, format!("cannot create temporary file: {e}")))
}

fn persist(temp: NamedTempFile, final_path: &Path) -> Result<()> {
    temp.as_file()
        .sync_all()
        .map_err(|e| Error::persistence(final_path, format!("sync failed: {e}")))?;
    temp.persist(final_path)
        .map_err(|e| Error::persistence(final_path, e.error))?;
    Ok(())
}

/// Replaces `path` with `contents` atomically.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut temp = temp_file_for(path)?;
    temp.write_all(contents)
        .map_err(|e| Error::persistence(path, e))?;
    persist(temp, path)
}

/// Pretty-prints `value` as JSON and writes it atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json)
}

/// A CSV writer that only becomes visible at `finish()`.
///
/// Dropping it without finishing removes the temporary file and leaves any
/// previous destination untouched.
pub struct AtomicCsvWriter {
    writer: Writer<BufWriter<NamedTempFile>>,
    final_path: PathBuf,
}

impl AtomicCsvWriter {
    pub fn new(final_path: impl AsRef<Path>) -> Result<Self> {
        let final_path = final_path.as_ref().to_path_buf();
        let temp = temp_file_for(&final_path)?;

        Ok(Self {
            writer: Writer::from_writer(BufWriter::new(temp)),
            final_path,
        })
    }

    pub fn write_record<I, T>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer
            .write_record(record)
            .map_err(|e| Error::persistence(&self.final_path, e))
    }

    pub fn finish(self) -> Result<PathBuf> {
        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| Error::persistence(&self.final_path, e.error()))?;

        let temp = buf_writer
            .into_inner()
            .map_err(|e| Error::persistence(&self.final_path, e.error()))?;

        persist(temp, &self.final_path)?;
        Ok(self.final_path)
    }
}
