//! Transcript sources.
//!
//! A source turns a source identifier (a video URL, a file path) into raw
//! transcript text. The pipeline only sees the [`TranscriptSource`] trait.

pub mod youtube;

pub use youtube::YouTubeSource;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Retrieves raw transcript text for a source identifier
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the raw transcript.
    ///
    /// Fails with [`Error::NotFound`] when the source has no transcript and
    /// [`Error::Source`] for every other retrieval failure.
    async fn fetch(&self, source_id: &str) -> Result<String>;

    /// Normalise an identifier so that different spellings of the same source
    /// compare equal.
    fn canonicalize(&self, source_id: &str) -> String {
        source_id.trim().to_string()
    }

    /// Short name for logging
    fn name(&self) -> &'static str;
}

/// Reads a transcript from a local UTF-8 text file.
///
/// The source identifier is the file path, resolved against `base_dir` when
/// relative.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    base_dir: Option<PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, source_id: &str) -> PathBuf {
        let path = PathBuf::from(source_id.trim());
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}

#[async_trait]
impl TranscriptSource for FileSource {
    async fn fetch(&self, source_id: &str) -> Result<String> {
        let path = self.resolve(source_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                tracing::debug!(path = %path.display(), chars = text.len(), "Read transcript file");
                Ok(text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
                "transcript file {} does not exist",
                path.display()
            ))),
            Err(e) => Err(Error::source_failed(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn canonicalize(&self, source_id: &str) -> String {
        let path = self.resolve(source_id);
        std::fs::canonicalize(&path)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
