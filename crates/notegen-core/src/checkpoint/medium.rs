//! Durable media backing the checkpoint store.
//!
//! A medium holds exactly one named record and offers atomic overwrite, read
//! and idempotent delete.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage primitive for a single record
pub trait DurableMedium: Send + Sync {
    /// Read the record, or `None` if it does not exist.
    fn read(&self) -> std::io::Result<Option<Vec<u8>>>;

    /// Replace the record. Readers never observe a partially written record.
    fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()>;

    /// Delete the record. Deleting a missing record succeeds.
    fn remove(&self) -> std::io::Result<()>;

    /// Human-readable location, for logging.
    fn describe(&self) -> String;
}

/// A record stored as a file on the local filesystem.
///
/// Writes go to a uniquely named temporary file in the same directory, which is
/// synced and then renamed over the record.
#[derive(Debug, Clone)]
pub struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "checkpoint".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()))
    }
}

impl DurableMedium for FileMedium {
    fn read(&self) -> std::io::Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.temp_path();
        let result = (|| {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            std::fs::rename(&temp_path, &self.path)
        })();

        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
        }
        result
    }

    fn remove(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process medium, for tests and for callers that do not want a file.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    record: Mutex<Option<Vec<u8>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a medium already holding `bytes`.
    pub fn with_record(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            record: Mutex::new(Some(bytes.into())),
        }
    }

    fn lock(&self) -> std::io::Result<std::sync::MutexGuard<'_, Option<Vec<u8>>>> {
        self.record
            .lock()
            .map_err(|_| std::io::Error::other("memory medium lock poisoned"))
    }
}

impl DurableMedium for MemoryMedium {
    fn read(&self) -> std::io::Result<Option<Vec<u8>>> {
        Ok(self.lock()?.clone())
    }

    fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
        *self.lock()? = Some(bytes.to_vec());
        Ok(())
    }

    fn remove(&self) -> std::io::Result<()> {
        *self.lock()? = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
