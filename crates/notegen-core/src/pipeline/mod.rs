//! Incremental note generation pipeline.
//!
//! Architecture:
//!
//! ```text
//!                    ┌──────────── checkpoint applies ────────────┐
//!                    │                                            ▼
//!  Init ─────────────┤                                        Resuming
//!                    │                                            │
//!                    └─ none / discarded ─► Chunking              │
//!                                              │                  │
//!                                              ▼                  ▼
//!                                         Stepping(next_index) ◄──┘
//!                                              │
//!                   ┌── step ok, checkpoint ───┤
//!                   ▼       saved              │ generation or save failed
//!            Stepping(i+1) ... ─► Completed    ▼
//!                                        PartiallyFailed
//! ```
//!
//! Chunks are processed strictly in order, one at a time: every step consumes
//! the document produced by the step before it. After each successful step the
//! whole job (chunks, document, next index) is written to the checkpoint store
//! before the next step begins, so a later run can pick up exactly where this
//! one stopped.

mod progress;
mod types;

#[cfg(test)]
mod tests;

#[cfg(test)]
use progress::RecordingEmitter;

pub use progress::{NoOpEmitter, PipelineEmitter};
pub use types::{JobState, PipelineEvent, PipelineOutcome, ResumePolicy, RunRequest};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::chunker::Chunker;
use crate::error::{Error, Result};
use crate::generation::NoteGenerator;
use crate::preprocess;
use crate::transcript::TranscriptSource;

/// In-memory state of the job being run
struct Job {
    source_id: String,
    chunks: Vec<String>,
    document: String,
    next_index: usize,
}

impl From<Checkpoint> for Job {
    fn from(checkpoint: Checkpoint) -> Self {
        Self {
            source_id: checkpoint.source_id,
            chunks: checkpoint.chunks,
            document: checkpoint.document,
            next_index: checkpoint.next_index,
        }
    }
}

/// Drives a job from source text (or a saved checkpoint) to a finished document
pub struct Pipeline {
    store: CheckpointStore,
    generator: NoteGenerator,
    source: Arc<dyn TranscriptSource>,
    chunker: Chunker,
    emitter: Arc<dyn PipelineEmitter>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        store: CheckpointStore,
        generator: NoteGenerator,
        source: Arc<dyn TranscriptSource>,
        chunker: Chunker,
    ) -> Self {
        Self {
            store,
            generator,
            source,
            chunker,
            emitter: Arc::new(NoOpEmitter),
            cancel: CancellationToken::new(),
        }
    }

    /// Send pipeline events to `emitter`.
    pub fn with_emitter(mut self, emitter: Arc<dyn PipelineEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Stop between steps once `cancel` fires.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// The saved job a run with `source_id` would resume, if any.
    ///
    /// With no `source_id`, any usable checkpoint applies. Unreadable or
    /// malformed checkpoints are treated as absent.
    pub fn pending_job(&self, source_id: Option<&str>) -> Option<Checkpoint> {
        let checkpoint = self.store.load_usable()?;
        match source_id {
            None => Some(checkpoint),
            Some(id) if self.source.canonicalize(id) == checkpoint.source_id => Some(checkpoint),
            Some(_) => None,
        }
    }

    /// Run a job to completion or to its first failure.
    ///
    /// Returns `Err` only when the job cannot start: no source and nothing to
    /// resume, a transcript retrieval failure, or a failure to discard the old
    /// checkpoint under [`ResumePolicy::Discard`]. Failures while stepping end in
    /// [`PipelineOutcome::PartiallyFailed`].
    pub async fn run(&self, request: RunRequest) -> Result<PipelineOutcome> {
        let requested = request
            .source_id
            .as_deref()
            .map(|id| self.source.canonicalize(id));

        self.emitter.emit(PipelineEvent::Init {
            source_id: requested.clone(),
        });

        let job = match self.store.load_usable() {
            Some(checkpoint)
                if request.policy == ResumePolicy::Resume
                    && requested
                        .as_ref()
                        .map_or(true, |id| *id == checkpoint.source_id) =>
            {
                tracing::info!(
                    source_id = %checkpoint.source_id,
                    next_index = checkpoint.next_index,
                    total = checkpoint.total_chunks(),
                    "Resuming saved job"
                );
                self.emitter.emit(PipelineEvent::Resuming {
                    source_id: checkpoint.source_id.clone(),
                    next_index: checkpoint.next_index,
                    total_chunks: checkpoint.total_chunks(),
                });
                Job::from(checkpoint)
            }
            Some(checkpoint) if request.policy == ResumePolicy::Discard => {
                tracing::info!(source_id = %checkpoint.source_id, "Discarding saved job");
                self.store.clear()?;
                self.start_fresh(requested).await?
            }
            Some(checkpoint) => {
                // Kept until the new job's first checkpoint overwrites it
                tracing::info!(
                    saved = %checkpoint.source_id,
                    "Saved job is for a different source, starting over"
                );
                self.start_fresh(requested).await?
            }
            None => self.start_fresh(requested).await?,
        };

        Ok(self.step_all(job).await)
    }

    /// Fetch, normalise and chunk the source text.
    async fn start_fresh(&self, source_id: Option<String>) -> Result<Job> {
        let source_id = source_id.ok_or_else(|| {
            Error::config("no source given and no saved job to resume")
        })?;

        self.emitter.emit(PipelineEvent::Chunking {
            source_id: source_id.clone(),
        });
        tracing::info!(source = self.source.name(), source_id = %source_id, "Fetching transcript");

        let raw = self.source.fetch(&source_id).await?;
        let text = preprocess::normalize(&raw);
        let chunks = self.chunker.chunk(&text);

        if chunks.is_empty() {
            return Err(Error::NotFound(format!(
                "transcript for {} is empty",
                source_id
            )));
        }

        tracing::info!(
            source_id = %source_id,
            chars = text.chars().count(),
            chunk_count = chunks.len(),
            max_size = self.chunker.max_size(),
            "Transcript chunked"
        );
        self.emitter.emit(PipelineEvent::Chunked {
            total_chunks: chunks.len(),
        });

        Ok(Job {
            source_id,
            chunks,
            document: String::new(),
            next_index: 0,
        })
    }

    /// Process every remaining chunk in order.
    async fn step_all(&self, mut job: Job) -> PipelineOutcome {
        let total = job.chunks.len();

        while job.next_index < total {
            let index = job.next_index;

            if self.cancel.is_cancelled() {
                return self.fail(job, Error::Cancelled(index));
            }

            self.emitter.emit(PipelineEvent::Stepping {
                index,
                total_chunks: total,
            });
            tracing::debug!(index, total, "Generating notes for chunk");

            let updated = match self
                .generator
                .generate(&job.document, index == 0, &job.chunks[index])
                .await
            {
                Ok(document) => document,
                Err(e) => return self.fail(job, e),
            };

            let checkpoint = Checkpoint::new(
                job.source_id.clone(),
                job.chunks.clone(),
                updated.clone(),
                index + 1,
            );
            if let Err(e) = self.store.save(&checkpoint) {
                return self.fail(job, e);
            }

            job.document = updated;
            job.next_index = index + 1;

            tracing::info!(index, total, "Chunk processed");
            self.emitter.emit(PipelineEvent::StepCommitted {
                index,
                total_chunks: total,
            });
        }

        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear checkpoint after completion");
        }

        tracing::info!(source_id = %job.source_id, total, "Notes complete");
        self.emitter.emit(PipelineEvent::Completed { total_chunks: total });

        PipelineOutcome::Completed {
            source_id: job.source_id,
            document: job.document,
            total_chunks: total,
        }
    }

    fn fail(&self, job: Job, error: Error) -> PipelineOutcome {
        let total = job.chunks.len();

        tracing::warn!(
            source_id = %job.source_id,
            index = job.next_index,
            total,
            error = %error,
            "Stopping early; progress up to this chunk is saved"
        );
        self.emitter.emit(PipelineEvent::PartiallyFailed {
            next_index: job.next_index,
            total_chunks: total,
            error: error.to_string(),
        });

        PipelineOutcome::PartiallyFailed {
            source_id: job.source_id,
            document: job.document,
            next_index: job.next_index,
            total_chunks: total,
            error,
        }
    }
}
