use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunker::{Chunker, DEFAULT_DELIMITER, DEFAULT_MAX_CHUNK_SIZE};
use crate::provider::ProviderConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory (~/.local/share/notegen)
    pub data_dir: PathBuf,
    /// The single in-progress job checkpoint
    pub checkpoint_file: PathBuf,
    /// User settings (~/.config/notegen/settings.json)
    pub settings_file: PathBuf,
}

impl Config {
    /// Load configuration or use defaults
    pub fn load_or_default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notegen");

        let settings_file = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notegen")
            .join("settings.json");

        Self {
            checkpoint_file: data_dir.join("progress.json"),
            settings_file,
            data_dir,
        }
    }

    /// Configuration rooted entirely inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            data_dir: dir.to_path_buf(),
            checkpoint_file: dir.join("progress.json"),
            settings_file: dir.join("settings.json"),
        }
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        if let Some(parent) = self.checkpoint_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// User-editable settings, persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Which text generation backend to use
    pub provider: ProviderConfig,
    /// Maximum chunk size, in characters
    pub chunk_size: usize,
    /// Character that ends a transcript unit
    pub delimiter: char,
    /// HTTP request timeout for providers and transcript fetches
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            delimiter: DEFAULT_DELIMITER,
            request_timeout_secs: 300,
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!("Failed to read settings {:?}: {}", path, e);
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to parse settings {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save settings to `path`
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).context("Failed to write settings file")?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn chunker(&self) -> Chunker {
        Chunker::new(self.chunk_size).with_delimiter(self.delimiter)
    }
}
