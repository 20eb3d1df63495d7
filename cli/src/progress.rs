// Terminal progress for pipeline runs

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use notegen_core::{PipelineEmitter, PipelineEvent};

/// Renders pipeline events as a spinner while fetching and a bar while stepping.
pub struct ProgressEmitter {
    bar: Mutex<Option<ProgressBar>>,
    hidden: bool,
}

impl ProgressEmitter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            hidden: false,
        }
    }

    /// An emitter that tracks progress without drawing anything
    pub fn hidden() -> Self {
        Self {
            bar: Mutex::new(None),
            hidden: true,
        }
    }

    /// Position and length of the current bar
    pub fn position(&self) -> Option<(u64, Option<u64>)> {
        let guard = self.bar.lock().ok()?;
        guard.as_ref().map(|bar| (bar.position(), bar.length()))
    }

    fn create_spinner(&self, message: String) -> ProgressBar {
        let spinner = if self.hidden {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new_spinner()
        };
        let style = ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to create spinner template: {}", e);
                ProgressStyle::default_spinner()
            });
        spinner.set_style(style);
        spinner.set_message(message);
        if !self.hidden {
            spinner.enable_steady_tick(Duration::from_millis(80));
        }
        spinner
    }

    fn create_bar(&self, total: usize, done: usize) -> ProgressBar {
        let target = if self.hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        let bar = ProgressBar::with_draw_target(Some(total as u64), target);
        let style = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} chunks ({elapsed})")
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to create progress bar template: {}", e);
                ProgressStyle::default_bar()
            })
            .progress_chars("=>-");
        bar.set_style(style);
        bar.set_position(done as u64);
        bar.set_message("Generating notes");
        bar
    }

    fn replace(&self, next: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(previous) = guard.replace(next) {
                previous.finish_and_clear();
            }
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

impl Default for ProgressEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineEmitter for ProgressEmitter {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Init { .. } => {}
            PipelineEvent::Resuming {
                next_index,
                total_chunks,
                ..
            } => self.replace(self.create_bar(total_chunks, next_index)),
            PipelineEvent::Chunking { source_id } => {
                self.replace(self.create_spinner(format!("Fetching transcript for {}", source_id)))
            }
            PipelineEvent::Chunked { total_chunks } => {
                self.replace(self.create_bar(total_chunks, 0))
            }
            PipelineEvent::Stepping {
                index,
                total_chunks,
            } => self.with_bar(|bar| {
                bar.set_message(format!("Chunk {}/{}", index + 1, total_chunks))
            }),
            PipelineEvent::StepCommitted { index, .. } => {
                self.with_bar(|bar| bar.set_position(index as u64 + 1))
            }
            PipelineEvent::Completed { .. } => {
                self.with_bar(|bar| bar.finish_with_message("Notes complete"))
            }
            PipelineEvent::PartiallyFailed { next_index, .. } => self.with_bar(|bar| {
                bar.abandon_with_message(format!("Stopped at chunk {}", next_index + 1))
            }),
        }
    }
}
