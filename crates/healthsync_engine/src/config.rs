//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use healthsync_protocol::RecordKind;
use std::time::Duration;

/// Default lookback window for full syncs.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;

/// Longest lookback window a full sync accepts.
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// How raw step samples are shaped before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepGranularity {
    /// One record per source sample, keeping the source identifier.
    #[default]
    PerRecord,
    /// One record per local calendar day, without identifiers.
    DailyTotals,
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the backend (e.g. `"http://10.0.2.2:4000"`).
    pub server_url: String,
    /// Backend user the data belongs to.
    pub user_id: String,
    /// Trailing window covered by a full sync.
    pub lookback_days: u32,
    /// Record kinds the change token is scoped to.
    pub tracked_kinds: Vec<RecordKind>,
    /// Shaping of step samples sent to the backend.
    pub step_granularity: StepGranularity,
    /// Retry configuration for backend submission.
    pub retry: RetryConfig,
    /// Request timeout applied by the HTTP client.
    pub timeout: Duration,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            user_id: "1".to_string(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            tracked_kinds: vec![RecordKind::Steps, RecordKind::ExerciseSession],
            step_granularity: StepGranularity::PerRecord,
            retry: RetryConfig::no_retry(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the backend user id.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Sets the lookback window in days.
    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// Sets the tracked record kinds.
    pub fn with_tracked_kinds(mut self, kinds: Vec<RecordKind>) -> Self {
        self.tracked_kinds = kinds;
        self
    }

    /// Sets the step granularity.
    pub fn with_step_granularity(mut self, granularity: StepGranularity) -> Self {
        self.step_granularity = granularity;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns true if `kind` is part of the sync.
    pub fn tracks(&self, kind: RecordKind) -> bool {
        self.tracked_kinds.contains(&kind)
    }

    /// Checks the configuration for values the engine cannot work with.
    pub fn validate(&self) -> SyncResult<()> {
        if self.lookback_days == 0 {
            return Err(SyncError::InvalidConfig(
                "lookback window must be at least one day".into(),
            ));
        }
        if self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(SyncError::InvalidConfig(format!(
                "lookback window must be at most {MAX_LOOKBACK_DAYS} days"
            )));
        }
        if self.tracked_kinds.is_empty() {
            return Err(SyncError::InvalidConfig(
                "at least one record kind must be tracked".into(),
            ));
        }
        if self.user_id.is_empty() {
            return Err(SyncError::InvalidConfig("user id is empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("http://10.0.2.2:4000")
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Disables jitter.
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Calculates the delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% on top.
            let jitter = delay_secs * 0.25 * rand::random::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
