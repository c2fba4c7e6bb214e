//! Source reader abstraction over the platform health store.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Duration, Utc};
use healthsync_protocol::RecordKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque cursor issued by the health store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeToken(String);

impl ChangeToken {
    /// Wraps a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns an abbreviated form for logs.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(20)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChangeToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for ChangeToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// A closed time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end.
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The trailing window `[now - days, now]`.
    ///
    /// Fails with [`SyncError::InvalidConfig`] if the start falls outside
    /// the representable date range.
    pub fn lookback(now: DateTime<Utc>, days: u32) -> SyncResult<Self> {
        let start = Duration::try_days(i64::from(days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                SyncError::InvalidConfig(format!("lookback of {days} days is out of range"))
            })?;
        Ok(Self { start, end: now })
    }

    /// Returns true if `[start, end]` overlaps this window.
    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start <= self.end && end >= self.start
    }
}

/// A raw step sample as stored by the health store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSample {
    /// Source record ID.
    pub id: String,
    /// Sample start.
    pub start_time: DateTime<Utc>,
    /// Sample end.
    pub end_time: DateTime<Utc>,
    /// Steps in the sample.
    pub count: u64,
}

/// A lap as stored by the health store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLap {
    /// Lap start.
    pub start_time: DateTime<Utc>,
    /// Lap end.
    pub end_time: DateTime<Utc>,
}

/// A raw exercise session as stored by the health store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSession {
    /// Source record ID.
    pub id: String,
    /// Source-specific exercise code.
    pub exercise_type: i32,
    /// Session start.
    pub start_time: DateTime<Utc>,
    /// Session end.
    pub end_time: DateTime<Utc>,
    /// Package or bundle id of the recording app.
    #[serde(default)]
    pub source_app: String,
    /// User-provided title.
    #[serde(default)]
    pub title: Option<String>,
    /// User-provided notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Recorded laps.
    #[serde(default)]
    pub laps: Vec<SessionLap>,
}

/// A raw record of any tracked kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRecord {
    /// A step sample.
    Steps(StepSample),
    /// An exercise session.
    ExerciseSession(ExerciseSession),
}

impl SourceRecord {
    /// Returns the source-assigned identifier.
    pub fn id(&self) -> &str {
        match self {
            SourceRecord::Steps(s) => &s.id,
            SourceRecord::ExerciseSession(s) => &s.id,
        }
    }

    /// Returns the record kind.
    pub fn kind(&self) -> RecordKind {
        match self {
            SourceRecord::Steps(_) => RecordKind::Steps,
            SourceRecord::ExerciseSession(_) => RecordKind::ExerciseSession,
        }
    }

    /// Returns the record's time range.
    pub fn time_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            SourceRecord::Steps(s) => (s.start_time, s.end_time),
            SourceRecord::ExerciseSession(s) => (s.start_time, s.end_time),
        }
    }
}

/// Everything in a full-sync window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSnapshot {
    /// Raw step samples.
    pub steps: Vec<StepSample>,
    /// Raw exercise sessions.
    pub sessions: Vec<ExerciseSession>,
}

impl WindowSnapshot {
    /// Returns true if the window holds no records.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && self.sessions.is_empty()
    }

    /// Total number of raw records.
    pub fn len(&self) -> usize {
        self.steps.len() + self.sessions.len()
    }
}

/// One page of changes after a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesPage {
    /// Records inserted or updated, in change order.
    pub upserts: Vec<SourceRecord>,
    /// Identifiers of deleted records, in change order.
    pub deletions: Vec<String>,
    /// Cursor positioned after this page.
    pub next_token: ChangeToken,
    /// Whether another page is available after `next_token`.
    pub has_more: bool,
}

/// Metrics the health store can aggregate over a time range.
///
/// Each field is `None` when the store has no data for it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionAggregate {
    /// Active energy in kilocalories.
    pub energy_kcal: Option<f64>,
    /// Distance in meters.
    pub distance_meters: Option<f64>,
    /// Step count.
    pub steps: Option<u64>,
    /// Elevation gained in meters.
    pub elevation_gain_meters: Option<f64>,
    /// Average heart rate in beats per minute.
    pub avg_heart_rate_bpm: Option<f64>,
}

/// Whether the health store exists on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAvailability {
    /// Installed and usable.
    Available,
    /// Supported but needs to be installed or updated.
    NotInstalled,
    /// Not supported on this device.
    NotSupported,
}

/// Read access to the platform health store.
///
/// All methods are pure reads and safe to call repeatedly.
pub trait HealthSource: Send + Sync {
    /// Reads every record whose time range intersects `window`.
    ///
    /// Fails with [`crate::SyncError::SourceUnavailable`] if the store is not
    /// initialized or authorized.
    fn read_full_window(&self, window: &TimeWindow) -> SyncResult<WindowSnapshot>;

    /// Issues a fresh cursor scoped to `kinds`, positioned at the latest change.
    fn issue_change_token(&self, kinds: &[RecordKind]) -> SyncResult<ChangeToken>;

    /// Returns one page of changes after `token`.
    ///
    /// Fails with [`crate::SyncError::TokenExpired`] when the cursor is no
    /// longer valid.
    fn fetch_changes(&self, token: &ChangeToken) -> SyncResult<ChangesPage>;

    /// Aggregates session metrics over exactly `[start, end]`.
    fn aggregate_session(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<SessionAggregate>;

    /// Reports whether the store is installed and supported.
    fn availability(&self) -> SourceAvailability {
        SourceAvailability::Available
    }

    /// Reports whether read permissions for every tracked kind are granted.
    fn has_permissions(&self) -> bool {
        true
    }
}

impl<S: HealthSource + ?Sized> HealthSource for std::sync::Arc<S> {
    fn read_full_window(&self, window: &TimeWindow) -> SyncResult<WindowSnapshot> {
        (**self).read_full_window(window)
    }

    fn issue_change_token(&self, kinds: &[RecordKind]) -> SyncResult<ChangeToken> {
        (**self).issue_change_token(kinds)
    }

    fn fetch_changes(&self, token: &ChangeToken) -> SyncResult<ChangesPage> {
        (**self).fetch_changes(token)
    }

    fn aggregate_session(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<SessionAggregate> {
        (**self).aggregate_session(start, end)
    }

    fn availability(&self) -> SourceAvailability {
        (**self).availability()
    }

    fn has_permissions(&self) -> bool {
        (**self).has_permissions()
    }
}
