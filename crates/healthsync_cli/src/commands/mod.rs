//! CLI command implementations.

pub mod reset;
pub mod status;
pub mod sync;

use healthsync_engine::{
    HttpRemoteClient, MemoryHealthSource, ReqwestClient, RetryConfig, StepGranularity,
    SyncConfig, SyncEngine, SyncError,
};
use healthsync_storage::{FileStore, StorageError};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A command that reads health data was run without a fixture.
    #[error("--source <fixture.json> is required for this command")]
    MissingSource,

    /// The fixture could not be read.
    #[error("failed to read {path}: {source}")]
    ReadFixture {
        /// Fixture path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The sync cycle ended in error.
    #[error("{0}")]
    SyncFailed(String),

    /// Another cycle holds the sync slot.
    #[error("a sync is already running")]
    Busy,

    /// Unsupported `--format` value.
    #[error("unknown output format '{0}' (expected text or json)")]
    UnknownFormat(String),

    /// Engine error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// State file error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// JSON output error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Output format for reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// JSON.
    Json,
}

impl FromStr for OutputFormat {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(CliError::UnknownFormat(other.to_string())),
        }
    }
}

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the sync state file.
    pub state: PathBuf,
    /// JSON fixture for the health store.
    pub source: Option<PathBuf>,
    /// Backend base URL.
    pub server_url: String,
    /// Backend user id.
    pub user_id: String,
    /// Days covered by a full sync.
    pub lookback_days: u32,
    /// Send daily step totals.
    pub daily_totals: bool,
    /// Submission attempts.
    pub attempts: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Settings {
    /// Builds the engine configuration.
    pub fn sync_config(&self) -> Result<SyncConfig, CliError> {
        let retry = if self.attempts > 1 {
            RetryConfig::new(self.attempts)
        } else {
            RetryConfig::no_retry()
        };
        let granularity = if self.daily_totals {
            StepGranularity::DailyTotals
        } else {
            StepGranularity::PerRecord
        };

        let config = SyncConfig::new(self.server_url.clone())
            .with_user_id(self.user_id.clone())
            .with_lookback_days(self.lookback_days)
            .with_step_granularity(granularity)
            .with_retry(retry)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        config.validate()?;
        Ok(config)
    }

    /// Opens the state file, creating its directory if needed.
    pub fn open_store(&self) -> Result<FileStore, CliError> {
        Ok(FileStore::open_with_create_dirs(&self.state)?)
    }

    /// Loads the health store fixture.
    pub fn load_source(&self) -> Result<MemoryHealthSource, CliError> {
        let path = self.source.as_ref().ok_or(CliError::MissingSource)?;
        let json = std::fs::read_to_string(path).map_err(|source| CliError::ReadFixture {
            path: path.display().to_string(),
            source,
        })?;
        Ok(MemoryHealthSource::from_fixture_json(&json)?)
    }
}

/// The engine as the CLI wires it.
pub type CliEngine =
    SyncEngine<MemoryHealthSource, HttpRemoteClient<ReqwestClient>, FileStore>;

/// Builds an engine talking to the configured backend.
pub fn build_engine(settings: &Settings) -> Result<CliEngine, CliError> {
    let config = settings.sync_config()?;
    let client = ReqwestClient::new(config.timeout)?;
    let remote = HttpRemoteClient::new(config.server_url.clone(), config.user_id.clone(), client);
    let source = settings.load_source()?;
    let store = settings.open_store()?;
    Ok(SyncEngine::new(config, source, remote, store))
}
