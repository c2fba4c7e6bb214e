//! Last-known-good sync result.

use crate::error::ProtocolResult;
use crate::time_format::{format_display_timestamp, format_relative_timestamp};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// The outcome of the most recent successful sync.
///
/// Replaced wholesale after every acknowledged sync and never merged, so a
/// reader always sees a consistent pair of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSyncData {
    /// When the sync was acknowledged.
    pub sync_timestamp: DateTime<Utc>,
    /// Display rendering, e.g. `"Dec 15, 2025 at 2:30 PM"`.
    pub formatted_timestamp: String,
}

impl CachedSyncData {
    /// Creates cache data for a sync acknowledged at `at`.
    pub fn new(at: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            sync_timestamp: at,
            formatted_timestamp: format_display_timestamp(at, offset),
        }
    }

    /// Renders the sync time relative to `now`.
    pub fn relative_to(&self, now: DateTime<Utc>, offset: FixedOffset) -> String {
        format_relative_timestamp(self.sync_timestamp, now, offset)
    }

    /// Encodes to JSON.
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes from JSON.
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
