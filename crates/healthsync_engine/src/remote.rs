//! Remote sync client abstraction.

use crate::error::{SyncError, SyncResult};
use healthsync_protocol::{SyncRecord, SyncRequest, SyncType};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};

/// What the backend said about a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// HTTP status code.
    pub status_code: u16,
    /// Application-level success flag from the body.
    pub success: bool,
    /// Message from the body, if any.
    pub message: Option<String>,
    /// Number of records the backend reports as accepted.
    pub accepted_count: u32,
}

impl SubmitOutcome {
    /// A 200 response accepting `accepted_count` records.
    pub fn accepted(accepted_count: u32) -> Self {
        Self {
            status_code: 200,
            success: true,
            message: Some("Sync successful".into()),
            accepted_count,
        }
    }

    /// Returns true for a 2xx status with `success: true`.
    pub fn is_accepted(&self) -> bool {
        (200..300).contains(&self.status_code) && self.success
    }

    /// Converts a non-accepted outcome into the matching error.
    pub fn into_rejection(self) -> SyncError {
        SyncError::ServerRejected {
            status: self.status_code,
            message: self.message,
        }
    }
}

/// Submits sync batches to the backend.
///
/// Implementations never retry. A response that arrives but does not accept
/// the batch is returned as a [`SubmitOutcome`]; only transport faults are
/// errors ([`SyncError::NetworkUnreachable`], [`SyncError::NetworkTimeout`],
/// [`SyncError::Transport`]).
pub trait RemoteSyncClient: Send + Sync {
    /// Sends one batch.
    fn submit(&self, request: &SyncRequest) -> SyncResult<SubmitOutcome>;
}

impl<R: RemoteSyncClient + ?Sized> RemoteSyncClient for std::sync::Arc<R> {
    fn submit(&self, request: &SyncRequest) -> SyncResult<SubmitOutcome> {
        (**self).submit(request)
    }
}

/// A failure [`MemoryBackend`] produces for the next submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedFailure {
    /// Respond with this status and an optional message.
    Status(u16, Option<String>),
    /// Respond 200 with `success: false`.
    Rejected(String),
    /// Fail as if the host could not be reached.
    Unreachable,
    /// Fail as if the request timed out.
    Timeout,
}

/// An in-process backend.
///
/// Applies each accepted batch as idempotent upserts keyed by record id and
/// removes deleted ids. Daily totals carry no id and are keyed by date.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<BTreeMap<String, SyncRecord>>,
    failures: Mutex<VecDeque<ScriptedFailure>>,
    received: Mutex<Vec<SyncRequest>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a failure for the next submission.
    pub fn fail_next(&self, failure: ScriptedFailure) {
        self.failures.lock().push_back(failure);
    }

    /// Returns the stored records ordered by key.
    pub fn records(&self) -> Vec<SyncRecord> {
        self.records.lock().values().cloned().collect()
    }

    /// Returns the stored record with `id`.
    pub fn record(&self, id: &str) -> Option<SyncRecord> {
        self.records.lock().get(id).cloned()
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    /// Every request received, including failed ones.
    pub fn received(&self) -> Vec<SyncRequest> {
        self.received.lock().clone()
    }

    /// Number of requests received.
    pub fn submission_count(&self) -> usize {
        self.received.lock().len()
    }

    fn storage_key(record: &SyncRecord) -> String {
        match record {
            SyncRecord::Steps(step) if step.id.is_empty() => format!("steps:{}", step.date),
            other => other.id().to_string(),
        }
    }
}

impl RemoteSyncClient for MemoryBackend {
    fn submit(&self, request: &SyncRequest) -> SyncResult<SubmitOutcome> {
        self.received.lock().push(request.clone());

        if let Some(failure) = self.failures.lock().pop_front() {
            return match failure {
                ScriptedFailure::Status(status_code, message) => Ok(SubmitOutcome {
                    status_code,
                    success: false,
                    message,
                    accepted_count: 0,
                }),
                ScriptedFailure::Rejected(message) => Ok(SubmitOutcome {
                    status_code: 200,
                    success: false,
                    message: Some(message),
                    accepted_count: 0,
                }),
                ScriptedFailure::Unreachable => Err(SyncError::NetworkUnreachable(
                    "connection refused".into(),
                )),
                ScriptedFailure::Timeout => Err(SyncError::NetworkTimeout),
            };
        }

        let mut records = self.records.lock();
        for record in &request.records {
            records.insert(Self::storage_key(record), record.clone());
        }
        if request.sync_type == SyncType::Incremental {
            for id in &request.deleted_record_ids {
                records.remove(id);
            }
        }

        Ok(SubmitOutcome::accepted(request.records.len() as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use healthsync_protocol::StepRecord;

    fn step(id: &str, count: u64) -> SyncRecord {
        let at = Utc.with_ymd_and_hms(2025, 12, 14, 9, 0, 0).unwrap();
        StepRecord::new(
            id,
            NaiveDate::from_ymd_opt(2025, 12, 14).unwrap(),
            count,
            at,
            at,
        )
        .into()
    }

    #[test]
    fn outcome_acceptance() {
        assert!(SubmitOutcome::accepted(3).is_accepted());
        let rejected = SubmitOutcome {
            status_code: 200,
            success: false,
            message: Some("Invalid payload".into()),
            accepted_count: 0,
        };
        assert!(!rejected.is_accepted());
        assert_eq!(rejected.into_rejection().user_message(), "Invalid payload");

        let server_error = SubmitOutcome {
            status_code: 500,
            success: true,
            message: None,
            accepted_count: 0,
        };
        assert!(!server_error.is_accepted());
    }

    #[test]
    fn backend_upserts_idempotently() {
        let backend = MemoryBackend::new();
        let request = SyncRequest::full(vec![step("a", 100), step("b", 200)]);

        backend.submit(&request).unwrap();
        backend.submit(&request).unwrap();
        assert_eq!(backend.record_count(), 2);
        assert_eq!(backend.submission_count(), 2);

        backend
            .submit(&SyncRequest::incremental(
                vec![step("a", 150)],
                vec!["b".into()],
            ))
            .unwrap();
        assert_eq!(backend.record_count(), 1);
        match backend.record("a") {
            Some(SyncRecord::Steps(r)) => assert_eq!(r.count, 150),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn daily_totals_keyed_by_date() {
        let backend = MemoryBackend::new();
        let day = NaiveDate::from_ymd_opt(2025, 12, 14).unwrap();
        backend
            .submit(&SyncRequest::full(vec![StepRecord::daily_total(day, 10).into()]))
            .unwrap();
        backend
            .submit(&SyncRequest::full(vec![StepRecord::daily_total(day, 20).into()]))
            .unwrap();
        assert_eq!(backend.record_count(), 1);
    }

    #[test]
    fn scripted_failures_apply_once() {
        let backend = MemoryBackend::new();
        backend.fail_next(ScriptedFailure::Status(503, None));
        backend.fail_next(ScriptedFailure::Timeout);
        let request = SyncRequest::full(vec![step("a", 1)]);

        let outcome = backend.submit(&request).unwrap();
        assert_eq!(outcome.status_code, 503);
        assert!(!outcome.is_accepted());

        assert!(matches!(
            backend.submit(&request),
            Err(SyncError::NetworkTimeout)
        ));

        assert!(backend.submit(&request).unwrap().is_accepted());
        assert_eq!(backend.record_count(), 1);
        assert_eq!(backend.submission_count(), 3);
    }
}
