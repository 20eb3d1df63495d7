//! Pipeline types: run requests, job states and outcomes.

use serde::Serialize;

use crate::error::Error;

/// What to do with an existing checkpoint that applies to the requested source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumePolicy {
    /// Continue from the checkpoint.
    #[default]
    Resume,
    /// Clear the checkpoint and start over.
    Discard,
}

/// A request to run (or continue) a job
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Source to generate notes for. `None` means "whatever job is saved".
    pub source_id: Option<String>,
    pub policy: ResumePolicy,
}

impl RunRequest {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            policy: ResumePolicy::Resume,
        }
    }

    /// Continue the saved job, whatever its source.
    pub fn resume_saved() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: ResumePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// States a job moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum JobState {
    Init,
    Resuming,
    Chunking,
    Stepping(usize),
    Completed,
    PartiallyFailed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Init => write!(f, "init"),
            JobState::Resuming => write!(f, "resuming"),
            JobState::Chunking => write!(f, "chunking"),
            JobState::Stepping(i) => write!(f, "stepping({})", i),
            JobState::Completed => write!(f, "completed"),
            JobState::PartiallyFailed => write!(f, "partially_failed"),
        }
    }
}

/// Events emitted while a job runs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A run has started; `source_id` is the canonical requested source, if any
    Init { source_id: Option<String> },
    /// Continuing a saved job
    Resuming {
        source_id: String,
        next_index: usize,
        total_chunks: usize,
    },
    /// Fetching and chunking the source text
    Chunking { source_id: String },
    /// The chunk sequence for a fresh job is fixed
    Chunked { total_chunks: usize },
    /// Generation for a chunk has started
    Stepping { index: usize, total_chunks: usize },
    /// A chunk's output is in the document and checkpointed
    StepCommitted { index: usize, total_chunks: usize },
    /// Every chunk has been processed
    Completed { total_chunks: usize },
    /// The run stopped early; the saved checkpoint can be resumed
    PartiallyFailed {
        next_index: usize,
        total_chunks: usize,
        error: String,
    },
}

impl PipelineEvent {
    /// The job state this event announces, if it is a state transition.
    pub fn state(&self) -> Option<JobState> {
        match self {
            PipelineEvent::Init { .. } => Some(JobState::Init),
            PipelineEvent::Resuming { .. } => Some(JobState::Resuming),
            PipelineEvent::Chunking { .. } => Some(JobState::Chunking),
            PipelineEvent::Stepping { index, .. } => Some(JobState::Stepping(*index)),
            PipelineEvent::Completed { .. } => Some(JobState::Completed),
            PipelineEvent::PartiallyFailed { .. } => Some(JobState::PartiallyFailed),
            PipelineEvent::Chunked { .. } | PipelineEvent::StepCommitted { .. } => None,
        }
    }
}

/// How a run ended.
///
/// Generation and checkpoint-write failures during stepping end the run as
/// [`PipelineOutcome::PartiallyFailed`] rather than as an `Err`, so the caller
/// always gets the last committed document back.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// All chunks processed; the checkpoint has been cleared.
    Completed {
        source_id: String,
        document: String,
        total_chunks: usize,
    },
    /// Stopped at `next_index`; the checkpoint for the chunks before it remains.
    PartiallyFailed {
        source_id: String,
        document: String,
        next_index: usize,
        total_chunks: usize,
        error: Error,
    },
}

impl PipelineOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PipelineOutcome::Completed { .. })
    }

    pub fn state(&self) -> JobState {
        match self {
            PipelineOutcome::Completed { .. } => JobState::Completed,
            PipelineOutcome::PartiallyFailed { .. } => JobState::PartiallyFailed,
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            PipelineOutcome::Completed { source_id, .. }
            | PipelineOutcome::PartiallyFailed { source_id, .. } => source_id,
        }
    }

    /// The final document, or the last committed one on failure.
    pub fn document(&self) -> &str {
        match self {
            PipelineOutcome::Completed { document, .. }
            | PipelineOutcome::PartiallyFailed { document, .. } => document,
        }
    }

    pub fn into_document(self) -> String {
        match self {
            PipelineOutcome::Completed { document, .. }
            | PipelineOutcome::PartiallyFailed { document, .. } => document,
        }
    }
}
