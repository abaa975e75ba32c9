//! Configuration and settings management
//!
//! Loads settings from environment variables and defines runtime defaults.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default directory for intermediate download artifacts
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
/// Default interval between full flushes of the correlation token store
pub const DEFAULT_TOKEN_FLUSH_SECS: u64 = 600;
/// Default cap on concurrently running pipeline runs
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 4;
/// Default timeout for a single external command invocation
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 900;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token; the only required value
    pub telegram_token: String,

    /// Directory for temporary media artifacts
    pub download_dir: Option<String>,

    /// Seconds between full flushes of the token store
    pub token_flush_secs: Option<u64>,

    /// Maximum number of pipeline runs executing at once
    pub max_concurrent_downloads: Option<usize>,

    /// Seconds before an external command invocation is aborted
    pub command_timeout_secs: Option<u64>,
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or `telegram_token` is absent.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Directory used for intermediate artifacts
    #[must_use]
    pub fn download_dir(&self) -> PathBuf {
        PathBuf::from(
            self.download_dir
                .as_deref()
                .unwrap_or(DEFAULT_DOWNLOAD_DIR),
        )
    }

    /// Interval between full flushes of the token store
    #[must_use]
    pub fn token_flush_interval(&self) -> Duration {
        Duration::from_secs(self.token_flush_secs.unwrap_or(DEFAULT_TOKEN_FLUSH_SECS))
    }

    /// Cap on concurrently running pipeline runs
    #[must_use]
    pub fn max_concurrent_downloads(&self) -> usize {
        self.max_concurrent_downloads
            .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS)
            .max(1)
    }

    /// Timeout for a single external command invocation
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(
            self.command_timeout_secs
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
        )
    }
}
