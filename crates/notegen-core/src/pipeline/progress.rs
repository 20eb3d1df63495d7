//! Progress reporting for pipeline runs.

#[cfg(test)]
use std::sync::Mutex;

use super::types::PipelineEvent;

/// Trait for receiving pipeline events.
///
/// Implement this trait to render progress (a progress bar, a log line) while a
/// job runs. Emitters are called inline from the pipeline and must not block.
pub trait PipelineEmitter: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// No-op implementation
pub struct NoOpEmitter;

impl PipelineEmitter for NoOpEmitter {
    fn emit(&self, _event: PipelineEvent) {}
}

/// Keeps every event it receives, in order.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<PipelineEvent>>,
}

#[cfg(test)]
impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl PipelineEmitter for RecordingEmitter {
    fn emit(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
