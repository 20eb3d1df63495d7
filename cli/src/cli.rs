use std::path::PathBuf;

use clap::Parser;
use notegen_core::{Config, ProviderConfig, Settings};

use crate::session::ResumeChoice;

#[derive(Parser, Debug)]
#[command(name = "notegen")]
#[command(about = "Turn long lecture videos into structured study notes")]
pub struct Args {
    /// YouTube video URL or id. Omit to resume saved progress or be asked for one.
    pub video_url: Option<String>,

    /// Read the transcript from a local text file instead of YouTube
    #[arg(long, value_name = "PATH", conflicts_with = "video_url")]
    pub transcript_file: Option<PathBuf>,

    /// Where to write the finished notes
    #[arg(short, long, value_name = "PATH", default_value = "academic_notes.txt")]
    pub output: PathBuf,

    /// Resume saved progress without asking
    #[arg(long, conflicts_with = "restart")]
    pub resume: bool,

    /// Discard saved progress for this source without asking and start over
    #[arg(long)]
    pub restart: bool,

    /// Delete saved progress and exit
    #[arg(long, conflicts_with_all = ["resume", "restart"])]
    pub discard: bool,

    /// Text generation provider
    #[arg(long, value_parser = ["gemini", "openai", "anthropic"])]
    pub provider: Option<String>,

    /// Model to use with the provider
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum chunk size, in characters
    #[arg(long, value_parser = parse_chunk_size)]
    pub chunk_size: Option<usize>,

    /// Checkpoint file location
    #[arg(long, value_name = "PATH")]
    pub checkpoint: Option<PathBuf>,

    /// Store the provider, model and chunk size overrides as the new defaults
    #[arg(long)]
    pub save_settings: bool,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// The source identifier given on the command line, if any
    pub fn source_id(&self) -> Option<String> {
        match &self.transcript_file {
            Some(path) => Some(path.display().to_string()),
            None => self.video_url.clone(),
        }
    }

    /// The answer to the resume prompt supplied by flags
    pub fn preset_choice(&self) -> Option<ResumeChoice> {
        if self.resume {
            Some(ResumeChoice::Resume)
        } else if self.restart {
            Some(ResumeChoice::StartOver)
        } else {
            None
        }
    }

    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config, settings: &mut Settings) {
        if let Some(family) = &self.provider {
            if family != settings.provider.provider_type() {
                if let Some(provider) = ProviderConfig::for_family(family) {
                    settings.provider = provider;
                }
            }
        }
        if let Some(model) = &self.model {
            settings.provider.set_model(model.clone());
        }
        if let Some(chunk_size) = self.chunk_size {
            settings.chunk_size = chunk_size;
        }
        if let Some(checkpoint) = &self.checkpoint {
            config.checkpoint_file = checkpoint.clone();
        }
    }

    pub fn log_directives(&self) -> &'static [&'static str] {
        if self.verbose {
            &["notegen=debug", "notegen_core=debug"]
        } else {
            &["notegen=info", "notegen_core=info"]
        }
    }
}

fn parse_chunk_size(value: &str) -> Result<usize, String> {
    let size: usize = value
        .parse()
        .map_err(|_| format!("'{}' is not a whole number", value))?;
    if size == 0 {
        return Err("chunk size must be at least 1".to_string());
    }
    Ok(size)
}
