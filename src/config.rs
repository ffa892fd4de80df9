//! Configuration parsing and validation.
//!
//! Keyword Tagger is configured via a TOML file (default:
//! `./config/kwtag.toml`). Only `[db]` is required; `[tagging]` and
//! `[logging]` fall back to defaults.
//!
//! ```toml
//! [db]
//! path = "./data/kwtag.sqlite"
//!
//! [tagging]
//! batch_size = 5000
//! parallel = true
//!
//! [logging]
//! filter = "info"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use keyword_tagger_core::tagger::TagOptions;

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub tagging: TaggingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// SQLite database file; parent directories are created on connect.
    pub path: PathBuf,
}

/// Corpus tagging settings.
#[derive(Debug, Deserialize, Clone)]
pub struct TaggingConfig {
    /// Keywords per batch. Cancellation is checked between batches.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Classify batches on the rayon thread pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            parallel: default_parallel(),
        }
    }
}

fn default_batch_size() -> usize {
    5000
}
fn default_parallel() -> bool {
    true
}

impl TaggingConfig {
    pub fn tag_options(&self) -> TagOptions {
        TagOptions {
            batch_size: self.batch_size,
            parallel: self.parallel,
            cancel: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` takes precedence.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Defaults for commands that can run without a config file. The
    /// database path points at the conventional location.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/kwtag.sqlite"),
            },
            tagging: TaggingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if config.tagging.batch_size == 0 {
        anyhow::bail!("tagging.batch_size must be > 0");
    }

    if config.logging.filter.trim().is_empty() {
        anyhow::bail!("logging.filter must not be empty");
    }

    Ok(config)
}
