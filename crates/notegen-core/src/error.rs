//! Error taxonomy for the note generation pipeline.
//!
//! Collaborators (providers, transcript sources) use `anyhow` internally and are
//! converted into one of these variants at the core boundary.

/// Errors surfaced by the core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source exists but has no transcript, or the identifier names nothing.
    #[error("transcript not found: {0}")]
    NotFound(String),

    /// Transcript retrieval failed for any other reason.
    #[error("transcript source error: {0}")]
    Source(String),

    /// The generative-text capability failed (auth, quota, network, malformed output).
    #[error("generation failed: {0}")]
    Capability(String),

    /// The durable medium backing the checkpoint could not be read or written.
    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A checkpoint record exists but is not a well-formed checkpoint.
    #[error("corrupt checkpoint: {0}")]
    CorruptCheckpoint(String),

    /// Missing or invalid configuration (API key, source identifier).
    #[error("configuration error: {0}")]
    Config(String),

    /// The run was cancelled between steps.
    #[error("cancelled before chunk {0} was processed")]
    Cancelled(usize),
}

impl Error {
    pub fn source_failed(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }

    pub fn capability(message: impl Into<String>) -> Self {
        Self::Capability(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether a later resume can reasonably be expected to make progress.
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Capability(_) | Self::Io(_) | Self::Cancelled(_))
    }
}

/// Result type alias for the core
pub type Result<T> = std::result::Result<T, Error>;
