//! JSON dataset persistence.
//!
//! The dataset file is a JSON array of flat [`AcceptedRecord`] objects in
//! insertion order:
//!
//! ```text
//! [
//!   {
//!     "date": "2025-05-06",
//!     "state": "Kerala",
//!     "cause": "drowning",
//!     "age": 45,
//!     "verified": true,
//!     "source_link": "https://www.thehindu.com/...",
//!     "source_name": "The Hindu",
//!     "raw_text": "Man, 45, drowns in Kerala river"
//!   }
//! ]
//! ```
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the target, so readers see either the old file or the new one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, instrument};

use crate::error::StoreError;
use crate::models::{AcceptedRecord, Dataset};

/// In-memory dataset bound to its backing file.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    records: Dataset,
    loaded: usize,
}

impl RecordStore {
    /// Read the dataset at `path`. A missing or blank file is an empty dataset.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let records: Dataset = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Vec::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        info!(count = records.len(), "Loaded dataset");
        Ok(Self {
            loaded: records.len(),
            path,
            records,
        })
    }

    /// Add a record. Uniqueness is the caller's responsibility.
    pub fn append(&mut self, record: AcceptedRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[AcceptedRecord] {
        &self.records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended since [`RecordStore::load`].
    pub fn appended(&self) -> usize {
        self.records.len() - self.loaded
    }

    /// Atomically replace the backing file with the current dataset.
    ///
    /// Serializes the records as pretty JSON into a temporary file next to
    /// the target, syncs it, then renames it over the target. Missing parent
    /// directories are created.
    ///
    /// # Returns
    ///
    /// `Ok(())` on success, or a [`StoreError`] if serialization, directory
    /// creation or the write fails. The previous file is left intact on error.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), count = self.records.len()))]
    pub fn flush(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.records)?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        info!(appended = self.appended(), "Wrote dataset");
        Ok(())
    }
}
