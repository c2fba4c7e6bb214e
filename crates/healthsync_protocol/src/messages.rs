//! Protocol messages for the sync endpoint.

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::SyncRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Whether a batch replaces the lookback window or carries a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    /// Every record in the lookback window.
    Full,
    /// Records changed since the last cursor.
    Incremental,
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncType::Full => f.write_str("full"),
            SyncType::Incremental => f.write_str("incremental"),
        }
    }
}

/// Request body for `POST /api/sync/health-data/{userId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Batch type.
    pub sync_type: SyncType,
    /// Upserted records.
    pub records: Vec<SyncRecord>,
    /// Identifiers of records deleted at the source.
    #[serde(default)]
    pub deleted_record_ids: Vec<String>,
}

impl SyncRequest {
    /// Creates a full-sync request. Full syncs never carry deletions.
    pub fn full(records: Vec<SyncRecord>) -> Self {
        Self {
            sync_type: SyncType::Full,
            records,
            deleted_record_ids: Vec::new(),
        }
    }

    /// Creates an incremental request.
    pub fn incremental(records: Vec<SyncRecord>, deleted_record_ids: Vec<String>) -> Self {
        Self {
            sync_type: SyncType::Incremental,
            records,
            deleted_record_ids,
        }
    }

    /// Total number of items (upserts plus deletions).
    pub fn len(&self) -> usize {
        self.records.len() + self.deleted_record_ids.len()
    }

    /// Returns true if the request carries nothing.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.deleted_record_ids.is_empty()
    }

    /// Checks that every non-empty identifier appears at most once across
    /// upserts and deletions.
    pub fn validate(&self) -> ProtocolResult<()> {
        let mut seen = HashSet::new();
        let ids = self
            .records
            .iter()
            .map(SyncRecord::id)
            .chain(self.deleted_record_ids.iter().map(String::as_str));

        for id in ids.filter(|id| !id.is_empty()) {
            if !seen.insert(id) {
                return Err(ProtocolError::DuplicateRecordId(id.to_string()));
            }
        }

        if self.sync_type == SyncType::Full && !self.deleted_record_ids.is_empty() {
            return Err(ProtocolError::InvalidRecord(
                "full sync cannot carry deletions".into(),
            ));
        }
        Ok(())
    }

    /// Encodes to JSON.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Response body from the sync endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    /// Application-level success flag.
    pub success: bool,
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Number of records the server accepted.
    #[serde(default)]
    pub record_count: u32,
    /// Server timestamp.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl SyncResponse {
    /// Creates a successful response.
    pub fn success(record_count: u32) -> Self {
        Self {
            success: true,
            message: Some("Sync successful".into()),
            record_count,
            timestamp: None,
        }
    }

    /// Creates a rejection.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            record_count: 0,
            timestamp: None,
        }
    }

    /// Encodes to JSON.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StepRecord;
    use chrono::NaiveDate;
    use serde_json::json;

    fn step(id: &str, count: u64) -> SyncRecord {
        let mut record =
            StepRecord::daily_total(NaiveDate::from_ymd_opt(2025, 12, 14).unwrap(), count);
        record.id = id.to_string();
        record.into()
    }

    #[test]
    fn full_request_shape() {
        let request = SyncRequest::full(vec![step("a", 100)]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["syncType"], "full");
        assert_eq!(value["records"].as_array().unwrap().len(), 1);
        assert_eq!(value["deletedRecordIds"], json!([]));
    }

    #[test]
    fn incremental_request_counts() {
        let request = SyncRequest::incremental(vec![step("a", 1), step("b", 2)], vec!["c".into()]);
        assert_eq!(request.sync_type, SyncType::Incremental);
        assert_eq!(request.len(), 3);
        assert!(!request.is_empty());
        request.validate().unwrap();

        let decoded = SyncRequest::from_json(&request.to_json().unwrap()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let request = SyncRequest::incremental(vec![step("a", 1)], vec!["a".into()]);
        assert!(matches!(
            request.validate(),
            Err(ProtocolError::DuplicateRecordId(id)) if id == "a"
        ));
    }

    #[test]
    fn validate_ignores_empty_ids() {
        let request = SyncRequest::full(vec![step("", 1), step("", 2)]);
        request.validate().unwrap();
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let response = SyncResponse::from_json(br#"{"success":false}"#).unwrap();
        assert!(!response.success);
        assert_eq!(response.message, None);
        assert_eq!(response.record_count, 0);
    }

    #[test]
    fn response_parses_server_body() {
        let body = br#"{"success":true,"message":"ok","recordCount":3,"timestamp":"2025-12-15T14:30:00Z"}"#;
        let response = SyncResponse::from_json(body).unwrap();
        assert!(response.success);
        assert_eq!(response.record_count, 3);
        assert_eq!(response.timestamp.as_deref(), Some("2025-12-15T14:30:00Z"));
    }
}
