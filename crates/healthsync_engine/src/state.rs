//! Sync engine state machine.

use crate::aggregator;
use crate::cache::SyncCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{StepGranularity, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteSyncClient, SubmitOutcome};
use crate::source::{ChangeToken, HealthSource, SourceRecord, TimeWindow};
use crate::token_store::ChangeTokenStore;
use chrono::{DateTime, FixedOffset, Utc};
use healthsync_protocol::{
    CachedSyncData, RecordKind, SyncChanges, SyncEvent, SyncRecord, SyncRequest, SyncType,
};
use healthsync_storage::KeyValueStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No sync has run yet.
    Idle,
    /// A sync cycle is running.
    Syncing,
    /// The last cycle succeeded.
    Success,
    /// The last cycle failed.
    Error,
}

impl SyncState {
    /// Returns true while a cycle is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Syncing)
    }

    /// Returns true if the engine can start a new sync.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Success | SyncState::Error)
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that ended in success.
    pub cycles_completed: u64,
    /// Cycles that ended in error.
    pub cycles_failed: u64,
    /// Records sent in accepted batches.
    pub records_sent: u64,
    /// Deletions sent in accepted batches.
    pub deletions_sent: u64,
    /// Successful full syncs.
    pub full_syncs: u64,
    /// Successful incremental syncs.
    pub incremental_syncs: u64,
    /// Times an expired token forced a full sync.
    pub token_fallbacks: u64,
    /// Submission retries.
    pub retries: u64,
    /// Last error message.
    pub last_error: Option<String>,
    /// When the last cycle finished.
    pub last_outcome_at: Option<DateTime<Utc>>,
}

/// Result of a sync cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The backend accepted the batch, or there was nothing new to send.
    Success {
        /// Path the cycle took.
        sync_type: SyncType,
        /// Cache after the cycle.
        cached: CachedSyncData,
        /// Per-record changes delivered. Always empty for full syncs.
        changes: SyncChanges,
    },
    /// The cycle failed. Token and cache are untouched.
    Error {
        /// Message for the user.
        message: String,
        /// Cache from before the cycle.
        cached: Option<CachedSyncData>,
    },
}

impl SyncOutcome {
    /// Returns true for [`SyncOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success { .. })
    }

    /// Returns the cache the presentation layer should show.
    pub fn cached(&self) -> Option<&CachedSyncData> {
        match self {
            SyncOutcome::Success { cached, .. } => Some(cached),
            SyncOutcome::Error { cached, .. } => cached.as_ref(),
        }
    }

    /// Returns the notification for this cycle, if any.
    pub fn event(&self) -> Option<SyncEvent> {
        match self {
            SyncOutcome::Success { changes, .. } => changes.event(),
            SyncOutcome::Error { .. } => None,
        }
    }
}

/// Proof that the holder owns the single sync slot.
///
/// Dropping the permit releases the slot.
#[derive(Debug)]
pub struct SyncPermit<'a> {
    guard: &'a AtomicBool,
}

impl Drop for SyncPermit<'_> {
    fn drop(&mut self) {
        self.guard.store(false, Ordering::SeqCst);
    }
}

/// Changes collected from every page after a token.
#[derive(Debug)]
struct ChangeBatch {
    upserts: Vec<SourceRecord>,
    deletions: Vec<String>,
    next_token: ChangeToken,
    pages: usize,
}

impl ChangeBatch {
    fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletions.is_empty()
    }

    fn changes(&self) -> SyncChanges {
        let count = |kind| self.upserts.iter().filter(|r| r.kind() == kind).count();
        SyncChanges {
            steps_updated: count(RecordKind::Steps),
            sessions_updated: count(RecordKind::ExerciseSession),
            records_deleted: self.deletions.len(),
        }
    }
}

enum PendingChange {
    Upsert(SourceRecord),
    Delete(String),
}

/// Coalesces changes by id; the latest change for an id wins.
///
/// Records without an id are never coalesced.
#[derive(Default)]
struct ChangeAccumulator {
    pending: Vec<PendingChange>,
    positions: HashMap<String, usize>,
}

impl ChangeAccumulator {
    fn push(&mut self, id: &str, change: PendingChange) {
        if id.is_empty() {
            self.pending.push(change);
            return;
        }
        match self.positions.get(id) {
            Some(&at) => self.pending[at] = change,
            None => {
                self.positions.insert(id.to_string(), self.pending.len());
                self.pending.push(change);
            }
        }
    }

    fn add_upsert(&mut self, record: SourceRecord) {
        let id = record.id().to_string();
        self.push(&id, PendingChange::Upsert(record));
    }

    fn add_deletion(&mut self, id: String) {
        let key = id.clone();
        self.push(&key, PendingChange::Delete(id));
    }

    fn finish(self, next_token: ChangeToken, pages: usize) -> ChangeBatch {
        let mut upserts = Vec::new();
        let mut deletions = Vec::new();
        for change in self.pending {
            match change {
                PendingChange::Upsert(record) => upserts.push(record),
                PendingChange::Delete(id) => deletions.push(id),
            }
        }
        ChangeBatch {
            upserts,
            deletions,
            next_token,
            pages,
        }
    }
}

/// What a successful cycle produced.
struct CycleReport {
    sync_type: SyncType,
    cached: CachedSyncData,
    changes: SyncChanges,
    records_sent: usize,
    deletions_sent: usize,
}

/// The sync engine moves health data from the source to the backend.
///
/// At most one cycle runs at a time. Every cycle resolves to a
/// [`SyncOutcome`]; errors never escape the public entry points.
pub struct SyncEngine<S: HealthSource, R: RemoteSyncClient, K: KeyValueStore> {
    config: SyncConfig,
    source: Arc<S>,
    remote: Arc<R>,
    tokens: ChangeTokenStore<Arc<K>>,
    cache: SyncCache<Arc<K>>,
    clock: Arc<dyn Clock>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    syncing: AtomicBool,
}

impl<S: HealthSource, R: RemoteSyncClient, K: KeyValueStore> SyncEngine<S, R, K> {
    /// Creates a new sync engine using the system clock.
    pub fn new(config: SyncConfig, source: S, remote: R, store: K) -> Self {
        let store = Arc::new(store);
        Self {
            config,
            source: Arc::new(source),
            remote: Arc::new(remote),
            tokens: ChangeTokenStore::new(Arc::clone(&store)),
            cache: SyncCache::new(store),
            clock: Arc::new(SystemClock),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            syncing: AtomicBool::new(false),
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Gets the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the health source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Gets the remote client.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Gets the clock.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns true while a cycle holds the sync slot.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// Reads the cached result of the last successful sync.
    pub fn cached_data(&self) -> SyncResult<Option<CachedSyncData>> {
        self.cache.load()
    }

    /// Reads the instant of the last successful sync.
    pub fn last_sync_timestamp(&self) -> SyncResult<Option<DateTime<Utc>>> {
        self.cache.last_sync_timestamp()
    }

    /// Reads the persisted change token.
    pub fn change_token(&self) -> SyncResult<Option<ChangeToken>> {
        Ok(self.tokens.get()?)
    }

    /// Deletes the change token so the next cycle runs a full sync.
    pub fn clear_change_token(&self) -> SyncResult<()> {
        info!("clearing change token, next sync will be full");
        Ok(self.tokens.clear()?)
    }

    /// Deletes the change token and the cached result.
    pub fn reset(&self) -> SyncResult<()> {
        self.tokens.clear()?;
        self.cache.clear()?;
        *self.state.write() = SyncState::Idle;
        info!("sync state reset");
        Ok(())
    }

    /// Claims the sync slot, or returns `None` if a cycle is running.
    pub fn try_begin(&self) -> Option<SyncPermit<'_>> {
        self.syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SyncPermit {
                guard: &self.syncing,
            })
    }

    /// Runs one cycle, incremental when a token exists.
    ///
    /// Returns `None` without doing anything if a cycle is already running.
    pub fn sync(&self) -> Option<SyncOutcome> {
        let permit = self.try_begin()?;
        Some(self.run(&permit, false))
    }

    /// Clears the change token and runs a full cycle.
    ///
    /// Returns `None` without doing anything if a cycle is already running.
    pub fn force_full_sync(&self) -> Option<SyncOutcome> {
        let permit = self.try_begin()?;
        Some(self.run(&permit, true))
    }

    /// Runs one cycle under a permit from [`SyncEngine::try_begin`].
    pub(crate) fn run(&self, permit: &SyncPermit<'_>, force_full: bool) -> SyncOutcome {
        debug_assert!(std::ptr::eq(permit.guard, &self.syncing));
        *self.state.write() = SyncState::Syncing;

        let cached = self.cache.load().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read cached sync data");
            None
        });

        let result = self.config.validate().and_then(|()| {
            if force_full {
                info!("forcing full sync");
                self.tokens.clear()?;
            }
            self.perform_sync(cached.as_ref())
        });

        let now = self.clock.now();
        match result {
            Ok(report) => {
                info!(
                    sync_type = %report.sync_type,
                    records = report.records_sent,
                    deletions = report.deletions_sent,
                    "sync completed"
                );
                {
                    let mut stats = self.stats.write();
                    stats.cycles_completed += 1;
                    stats.records_sent += report.records_sent as u64;
                    stats.deletions_sent += report.deletions_sent as u64;
                    match report.sync_type {
                        SyncType::Full => stats.full_syncs += 1,
                        SyncType::Incremental => stats.incremental_syncs += 1,
                    }
                    stats.last_error = None;
                    stats.last_outcome_at = Some(now);
                }
                *self.state.write() = SyncState::Success;
                SyncOutcome::Success {
                    sync_type: report.sync_type,
                    cached: report.cached,
                    changes: report.changes,
                }
            }
            Err(e) => {
                error!(error = %e, "sync failed");
                let message = e.user_message();
                {
                    let mut stats = self.stats.write();
                    stats.cycles_failed += 1;
                    stats.last_error = Some(message.clone());
                    stats.last_outcome_at = Some(now);
                }
                *self.state.write() = SyncState::Error;
                SyncOutcome::Error { message, cached }
            }
        }
    }

    fn perform_sync(&self, cached: Option<&CachedSyncData>) -> SyncResult<CycleReport> {
        let Some(token) = self.tokens.get()? else {
            debug!("no change token, running full sync");
            return self.full_sync(cached);
        };

        debug!(token = token.short(), "change token found, running incremental sync");
        match self.collect_changes(&token) {
            Ok(batch) if batch.is_empty() => {
                self.tokens.set(&batch.next_token)?;
                match cached {
                    Some(cached) => {
                        info!(pages = batch.pages, "no changes since last sync");
                        Ok(CycleReport {
                            sync_type: SyncType::Incremental,
                            cached: cached.clone(),
                            changes: SyncChanges::default(),
                            records_sent: 0,
                            deletions_sent: 0,
                        })
                    }
                    None => {
                        info!("no changes and no cached result, escalating to full sync");
                        self.full_sync(None)
                    }
                }
            }
            Ok(batch) => self.incremental_sync(batch),
            Err(SyncError::TokenExpired) => {
                warn!("change token expired, falling back to full sync");
                self.tokens.clear()?;
                self.stats.write().token_fallbacks += 1;
                self.full_sync(cached)
            }
            Err(e) => Err(e),
        }
    }

    /// Pages through every change after `token`.
    ///
    /// The cursor only advances in memory; nothing is persisted here.
    fn collect_changes(&self, token: &ChangeToken) -> SyncResult<ChangeBatch> {
        let mut accumulator = ChangeAccumulator::default();
        let mut cursor = token.clone();
        let mut pages = 0;

        loop {
            let page = self.source.fetch_changes(&cursor)?;
            pages += 1;
            debug!(
                page = pages,
                upserts = page.upserts.len(),
                deletions = page.deletions.len(),
                has_more = page.has_more,
                "fetched change page"
            );

            for record in page.upserts {
                if self.config.tracks(record.kind()) {
                    accumulator.add_upsert(record);
                }
            }
            for id in page.deletions {
                accumulator.add_deletion(id);
            }
            cursor = page.next_token;

            if !page.has_more {
                break;
            }
        }

        Ok(accumulator.finish(cursor, pages))
    }

    fn incremental_sync(&self, batch: ChangeBatch) -> SyncResult<CycleReport> {
        let now = self.clock.now();
        let offset = self.clock.local_offset(now);
        let changes = batch.changes();

        let records = self.change_records(&batch, now, offset)?;
        let records_sent = records.len();
        let deletions_sent = batch.deletions.len();

        let request = SyncRequest::incremental(records, batch.deletions);
        request.validate()?;
        info!(
            records = records_sent,
            deletions = deletions_sent,
            "submitting incremental batch"
        );

        let outcome = self.submit_with_retry(&request)?;
        if !outcome.is_accepted() {
            return Err(outcome.into_rejection());
        }

        self.tokens.set(&batch.next_token)?;
        let cached = CachedSyncData::new(now, offset);
        self.cache.save(&cached)?;

        Ok(CycleReport {
            sync_type: SyncType::Incremental,
            cached,
            changes,
            records_sent,
            deletions_sent,
        })
    }

    /// Shapes a change batch for submission.
    ///
    /// Under [`StepGranularity::DailyTotals`] step samples are never sent
    /// by id. Any step upsert or deletion re-sends the daily totals of the
    /// whole window instead, replacing the totals the backend holds.
    fn change_records(
        &self,
        batch: &ChangeBatch,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> SyncResult<Vec<SyncRecord>> {
        let to_record = |record: &SourceRecord| -> SyncRecord {
            aggregator::change_record(record, &*self.source, offset)
        };

        if self.config.step_granularity == StepGranularity::PerRecord {
            return Ok(batch.upserts.iter().map(to_record).collect());
        }

        let steps_touched = !batch.deletions.is_empty()
            || batch.upserts.iter().any(|r| r.kind() == RecordKind::Steps);

        let mut records = Vec::new();
        if steps_touched && self.config.tracks(RecordKind::Steps) {
            let window = TimeWindow::lookback(now, self.config.lookback_days)?;
            let snapshot = self.source.read_full_window(&window)?;
            debug!(steps = snapshot.steps.len(), "re-aggregating daily totals");
            records.extend(aggregator::daily_step_records(&snapshot.steps, offset));
        }
        records.extend(
            batch
                .upserts
                .iter()
                .filter(|r| r.kind() != RecordKind::Steps)
                .map(to_record),
        );
        Ok(records)
    }

    fn full_sync(&self, cached: Option<&CachedSyncData>) -> SyncResult<CycleReport> {
        let now = self.clock.now();
        let offset = self.clock.local_offset(now);

        // Issued before the read so changes made during the cycle are
        // delivered again by the next incremental sync.
        let token = self.source.issue_change_token(&self.config.tracked_kinds)?;

        let window = TimeWindow::lookback(now, self.config.lookback_days)?;
        let snapshot = self.source.read_full_window(&window)?;
        debug!(
            steps = snapshot.steps.len(),
            sessions = snapshot.sessions.len(),
            "read full window"
        );

        let mut records = Vec::new();
        if self.config.tracks(RecordKind::Steps) {
            records.extend(match self.config.step_granularity {
                StepGranularity::PerRecord => aggregator::step_records(&snapshot.steps, offset),
                StepGranularity::DailyTotals => {
                    aggregator::daily_step_records(&snapshot.steps, offset)
                }
            });
        }
        if self.config.tracks(RecordKind::ExerciseSession) {
            records.extend(
                snapshot
                    .sessions
                    .iter()
                    .map(|session| aggregator::session_record(session, &*self.source)),
            );
        }

        if records.is_empty() {
            let Some(cached) = cached else {
                return Err(SyncError::NoDataAvailable);
            };
            info!("no records in window, keeping cached result");
            self.tokens.set(&token)?;
            return Ok(CycleReport {
                sync_type: SyncType::Full,
                cached: cached.clone(),
                changes: SyncChanges::default(),
                records_sent: 0,
                deletions_sent: 0,
            });
        }

        let records_sent = records.len();
        let request = SyncRequest::full(records);
        request.validate()?;
        info!(records = records_sent, "submitting full batch");

        let outcome = self.submit_with_retry(&request)?;
        if !outcome.is_accepted() {
            return Err(outcome.into_rejection());
        }

        self.tokens.set(&token)?;
        let cached = CachedSyncData::new(now, offset);
        self.cache.save(&cached)?;

        Ok(CycleReport {
            sync_type: SyncType::Full,
            cached,
            changes: SyncChanges::default(),
            records_sent,
            deletions_sent: 0,
        })
    }

    /// Submits with retry on transient transport errors.
    fn submit_with_retry(&self, request: &SyncRequest) -> SyncResult<SubmitOutcome> {
        let retry_config = &self.config.retry;
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = retry_config.delay_for_attempt(attempt);
                debug!(attempt, ?delay, "retrying submission");
                std::thread::sleep(delay);
                self.stats.write().retries += 1;
            }

            match self.remote.submit(request) {
                Ok(outcome) => {
                    debug!(
                        status = outcome.status_code,
                        success = outcome.success,
                        accepted = outcome.accepted_count,
                        "submission answered"
                    );
                    return Ok(outcome);
                }
                Err(e) if e.is_retryable() && attempt + 1 < retry_config.max_attempts => {
                    warn!(error = %e, attempt, "submission failed");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
