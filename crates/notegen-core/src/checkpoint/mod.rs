//! Resumable job checkpoints.
//!
//! At most one checkpoint exists at a time. It records everything needed to
//! continue a job: the source it came from, the fixed chunk sequence, the notes
//! produced so far and the index of the next chunk to process.

mod medium;

pub use medium::{DurableMedium, FileMedium, MemoryMedium};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Snapshot of a job after its first `next_index` chunks were processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Identifier of the source the chunks came from (e.g. the video URL)
    pub source_id: String,
    /// The job's full, fixed chunk sequence
    pub chunks: Vec<String>,
    /// Notes produced by processing chunks `[0, next_index)`
    pub document: String,
    /// Index of the next chunk to process
    pub next_index: usize,
    /// When this snapshot was written (RFC 3339)
    pub saved_at: String,
}

impl Checkpoint {
    pub fn new(
        source_id: impl Into<String>,
        chunks: Vec<String>,
        document: impl Into<String>,
        next_index: usize,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            chunks,
            document: document.into(),
            next_index,
            saved_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn remaining_chunks(&self) -> usize {
        self.chunks.len().saturating_sub(self.next_index)
    }

    pub fn is_finished(&self) -> bool {
        self.next_index >= self.chunks.len()
    }

    fn validate(&self) -> Result<()> {
        if self.next_index > self.chunks.len() {
            return Err(Error::CorruptCheckpoint(format!(
                "next_index {} exceeds chunk count {}",
                self.next_index,
                self.chunks.len()
            )));
        }
        if self.source_id.trim().is_empty() {
            return Err(Error::CorruptCheckpoint("empty source_id".to_string()));
        }
        Ok(())
    }
}

/// Store for the single current checkpoint record.
///
/// The medium is injected at construction; the store itself holds no state.
#[derive(Clone)]
pub struct CheckpointStore {
    medium: Arc<dyn DurableMedium>,
}

impl CheckpointStore {
    pub fn new(medium: Arc<dyn DurableMedium>) -> Self {
        Self { medium }
    }

    /// Store backed by a file at `path`.
    pub fn file(path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(Arc::new(FileMedium::new(path)))
    }

    /// Store backed by process memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryMedium::new()))
    }

    pub fn location(&self) -> String {
        self.medium.describe()
    }

    /// Overwrite the current checkpoint.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        self.medium.write_atomic(&bytes)?;
        tracing::debug!(
            location = %self.medium.describe(),
            next_index = checkpoint.next_index,
            total = checkpoint.total_chunks(),
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Read the current checkpoint, if any.
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        let Some(bytes) = self.medium.read()? else {
            return Ok(None);
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&bytes)
            .map_err(|e| Error::CorruptCheckpoint(e.to_string()))?;
        checkpoint.validate()?;

        Ok(Some(checkpoint))
    }

    /// Read the current checkpoint, treating unreadable or malformed records as absent.
    pub fn load_usable(&self) -> Option<Checkpoint> {
        match self.load() {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!(
                    location = %self.medium.describe(),
                    error = %e,
                    "Ignoring unusable checkpoint"
                );
                None
            }
        }
    }

    /// Remove the current checkpoint. Succeeds when none exists.
    pub fn clear(&self) -> Result<()> {
        self.medium.remove()?;
        tracing::debug!(location = %self.medium.describe(), "Checkpoint cleared");
        Ok(())
    }
}

impl std::fmt::Debug for CheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("location", &self.medium.describe())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(next_index: usize) -> Checkpoint {
        Checkpoint::new(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            vec!["one.".into(), " two.".into(), " three.".into()],
            "# Notes",
            next_index,
        )
    }

    #[test]
    fn test_save_and_load_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::file(temp_dir.path().join("progress.json"));

        let checkpoint = sample(2);
        store.save(&checkpoint).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
        assert_eq!(loaded.remaining_chunks(), 1);
        assert!(!loaded.is_finished());
    }

    #[test]
    fn test_save_overwrites_previous() {
        let store = CheckpointStore::in_memory();

        store.save(&sample(1)).unwrap();
        store.save(&sample(2)).unwrap();

        assert_eq!(store.load().unwrap().unwrap().next_index, 2);
    }

    #[test]
    fn test_load_absent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::file(temp_dir.path().join("progress.json"));

        assert!(store.load().unwrap().is_none());
        assert!(store.load_usable().is_none());
    }

    #[test]
    fn test_clear_twice_is_noop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::file(temp_dir.path().join("progress.json"));
        store.save(&sample(1)).unwrap();

        store.clear().unwrap();
        store.clear().unwrap();

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_malformed_json_is_corrupt() {
        let store = CheckpointStore::new(Arc::new(MemoryMedium::with_record("{not json")));

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::CorruptCheckpoint(_)));
        assert!(store.load_usable().is_none());
    }

    #[test]
    fn test_missing_fields_is_corrupt() {
        let record = serde_json::json!({
            "source_id": "abc",
            "chunks": ["a."],
        });
        let store = CheckpointStore::new(Arc::new(MemoryMedium::with_record(
            record.to_string(),
        )));

        assert!(matches!(store.load(), Err(Error::CorruptCheckpoint(_))));
    }

    #[test]
    fn test_index_past_end_is_corrupt() {
        let record = serde_json::to_string(&sample(4)).unwrap();
        let store = CheckpointStore::new(Arc::new(MemoryMedium::with_record(record)));

        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("exceeds chunk count"));
    }

    #[test]
    fn test_finished_checkpoint_is_valid() {
        let store = CheckpointStore::in_memory();
        store.save(&sample(3)).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.is_finished());
        assert_eq!(loaded.remaining_chunks(), 0);
    }

    #[test]
    fn test_persisted_layout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("progress.json");
        let store = CheckpointStore::file(&path);
        store.save(&sample(1)).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["source_id"], "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(raw["chunks"].as_array().unwrap().len(), 3);
        assert_eq!(raw["document"], "# Notes");
        assert_eq!(raw["next_index"], 1);
        assert!(raw["saved_at"].is_string());
    }
}
