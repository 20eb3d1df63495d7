//! Notegen Core - incremental study notes from long lecture transcripts
//!
//! This crate contains the core functionality for Notegen, including:
//! - Transcript retrieval (YouTube captions, local text files)
//! - Delimiter-aware chunking
//! - Chunk-by-chunk note generation against a hosted text model
//! - A single resumable checkpoint, written atomically after every step
//! - The pipeline that drives a job to completion or to a resumable stop

pub mod checkpoint;
pub mod chunker;
pub mod config;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod preprocess;
pub mod provider;
pub mod transcript;

use std::sync::Arc;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use chunker::Chunker;
pub use config::{Config, Settings};
pub use error::{Error, Result};
pub use generation::NoteGenerator;
pub use pipeline::{
    JobState, Pipeline, PipelineEmitter, PipelineEvent, PipelineOutcome, ResumePolicy, RunRequest,
};
pub use provider::{ProviderConfig, TextProvider};
pub use transcript::{FileSource, TranscriptSource, YouTubeSource};

/// Assemble a pipeline from configuration.
///
/// The checkpoint lives at `config.checkpoint_file`; provider, chunk size and
/// timeouts come from `settings`. Fails with [`Error::Config`] when the
/// provider has no API key.
pub fn open_pipeline(
    config: &Config,
    settings: &Settings,
    source: Arc<dyn TranscriptSource>,
) -> Result<Pipeline> {
    config.ensure_dirs()?;

    let provider = settings.provider.build(settings.request_timeout())?;
    let store = CheckpointStore::file(config.checkpoint_file.clone());

    tracing::debug!(
        checkpoint = %store.location(),
        chunk_size = settings.chunk_size,
        source = source.name(),
        "Pipeline assembled"
    );

    Ok(Pipeline::new(
        store,
        NoteGenerator::new(provider),
        source,
        settings.chunker(),
    ))
}
