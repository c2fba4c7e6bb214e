//! In-memory health store with a change log.

use crate::error::{SyncError, SyncResult};
use crate::source::{
    ChangeToken, ChangesPage, ExerciseSession, HealthSource, SessionAggregate,
    SourceAvailability, SourceRecord, StepSample, TimeWindow, WindowSnapshot,
};
use chrono::{DateTime, Utc};
use healthsync_protocol::RecordKind;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Default number of changes returned per page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
enum LoggedChange {
    Upsert(SourceRecord),
    Delete { id: String, kind: RecordKind },
}

impl LoggedChange {
    fn kind(&self) -> RecordKind {
        match self {
            LoggedChange::Upsert(record) => record.kind(),
            LoggedChange::Delete { kind, .. } => *kind,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<String, SourceRecord>,
    log: Vec<(u64, LoggedChange)>,
    head: u64,
    generation: u64,
    metrics: HashMap<(DateTime<Utc>, DateTime<Utc>), SessionAggregate>,
}

/// A health store held in memory.
///
/// Every mutation is appended to a change log with a monotonically
/// increasing sequence number. Tokens encode the log generation, the last
/// sequence seen and the tracked kinds, so they survive only as long as the
/// generation does: [`MemoryHealthSource::expire_tokens`] starts a new
/// generation and every older token reports [`SyncError::TokenExpired`].
///
/// Used by the test suites and by the CLI, which loads it from a JSON fixture.
#[derive(Debug)]
pub struct MemoryHealthSource {
    inner: RwLock<Inner>,
    page_size: usize,
    unavailable: AtomicBool,
    aggregate_fails: AtomicBool,
    permissions_granted: AtomicBool,
    availability: RwLock<SourceAvailability>,
    full_reads: AtomicUsize,
    fetch_calls: AtomicUsize,
    tokens_issued: AtomicUsize,
    aggregate_calls: AtomicUsize,
}

impl MemoryHealthSource {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty store returning at most `page_size` changes per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            page_size: page_size.max(1),
            unavailable: AtomicBool::new(false),
            aggregate_fails: AtomicBool::new(false),
            permissions_granted: AtomicBool::new(true),
            availability: RwLock::new(SourceAvailability::Available),
            full_reads: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            tokens_issued: AtomicUsize::new(0),
            aggregate_calls: AtomicUsize::new(0),
        }
    }

    /// Loads a store from a JSON fixture.
    ///
    /// ```json
    /// {
    ///   "steps": [{"id": "s1", "startTime": "...", "endTime": "...", "count": 120}],
    ///   "sessions": [{"id": "e1", "exerciseType": 56, "startTime": "...", "endTime": "..."}],
    ///   "metrics": [{"sessionId": "e1", "energyKcal": 300.0}]
    /// }
    /// ```
    ///
    /// Every record is logged as a fresh upsert in fixture order, so tokens
    /// issued by an earlier instance built from a different fixture do not
    /// describe this log.
    pub fn from_fixture_json(json: &str) -> SyncResult<Self> {
        let fixture: SourceFixture = serde_json::from_str(json)
            .map_err(|e| SyncError::SourceUnavailable(format!("invalid fixture: {e}")))?;

        let source = Self::new();
        for sample in fixture.steps {
            source.upsert(SourceRecord::Steps(sample));
        }
        for session in fixture.sessions {
            source.upsert(SourceRecord::ExerciseSession(session));
        }
        for metrics in fixture.metrics {
            let window = match source.inner.read().records.get(&metrics.session_id) {
                Some(SourceRecord::ExerciseSession(s)) => (s.start_time, s.end_time),
                _ => {
                    return Err(SyncError::SourceUnavailable(format!(
                        "fixture metrics reference unknown session {}",
                        metrics.session_id
                    )))
                }
            };
            source.set_session_metrics(window.0, window.1, metrics.into());
        }
        Ok(source)
    }

    /// Inserts or replaces a step sample.
    pub fn insert_steps(&self, sample: StepSample) {
        self.upsert(SourceRecord::Steps(sample));
    }

    /// Inserts or replaces an exercise session.
    pub fn insert_session(&self, session: ExerciseSession) {
        self.upsert(SourceRecord::ExerciseSession(session));
    }

    /// Inserts or replaces a record and logs the upsert.
    pub fn upsert(&self, record: SourceRecord) {
        let mut inner = self.inner.write();
        inner.head += 1;
        let seq = inner.head;
        inner
            .records
            .insert(record.id().to_string(), record.clone());
        inner.log.push((seq, LoggedChange::Upsert(record)));
    }

    /// Deletes a record and logs the deletion. Returns false if it did not exist.
    pub fn delete(&self, id: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(record) = inner.records.remove(id) else {
            return false;
        };
        inner.head += 1;
        let seq = inner.head;
        inner.log.push((
            seq,
            LoggedChange::Delete {
                id: id.to_string(),
                kind: record.kind(),
            },
        ));
        true
    }

    /// Invalidates every token issued so far.
    pub fn expire_tokens(&self) {
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.log.clear();
    }

    /// Sets the metrics returned for an exact session window.
    pub fn set_session_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        metrics: SessionAggregate,
    ) {
        self.inner.write().metrics.insert((start, end), metrics);
    }

    /// Makes every read fail with `SourceUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes aggregate queries fail.
    pub fn set_aggregate_failure(&self, fails: bool) {
        self.aggregate_fails.store(fails, Ordering::SeqCst);
    }

    /// Sets the reported permission state.
    pub fn set_permissions(&self, granted: bool) {
        self.permissions_granted.store(granted, Ordering::SeqCst);
    }

    /// Sets the reported availability.
    pub fn set_availability(&self, availability: SourceAvailability) {
        *self.availability.write() = availability;
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Number of full-window reads served.
    pub fn full_reads(&self) -> usize {
        self.full_reads.load(Ordering::SeqCst)
    }

    /// Number of change pages requested.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of tokens issued.
    pub fn tokens_issued(&self) -> usize {
        self.tokens_issued.load(Ordering::SeqCst)
    }

    /// Number of aggregate queries served.
    pub fn aggregate_calls(&self) -> usize {
        self.aggregate_calls.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> SyncResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SyncError::SourceUnavailable(
                "health store not available".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryHealthSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthSource for MemoryHealthSource {
    fn read_full_window(&self, window: &TimeWindow) -> SyncResult<WindowSnapshot> {
        self.ensure_available()?;
        self.full_reads.fetch_add(1, Ordering::SeqCst);

        let inner = self.inner.read();
        let mut snapshot = WindowSnapshot::default();
        for record in inner.records.values() {
            let (start, end) = record.time_range();
            if !window.intersects(start, end) {
                continue;
            }
            match record {
                SourceRecord::Steps(s) => snapshot.steps.push(s.clone()),
                SourceRecord::ExerciseSession(s) => snapshot.sessions.push(s.clone()),
            }
        }
        snapshot.steps.sort_by_key(|s| s.start_time);
        snapshot.sessions.sort_by_key(|s| s.start_time);
        Ok(snapshot)
    }

    fn issue_change_token(&self, kinds: &[RecordKind]) -> SyncResult<ChangeToken> {
        self.ensure_available()?;
        self.tokens_issued.fetch_add(1, Ordering::SeqCst);

        let inner = self.inner.read();
        Ok(TokenParts {
            generation: inner.generation,
            sequence: inner.head,
            mask: kind_mask(kinds),
        }
        .encode())
    }

    fn fetch_changes(&self, token: &ChangeToken) -> SyncResult<ChangesPage> {
        self.ensure_available()?;
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let parts = TokenParts::decode(token).ok_or(SyncError::TokenExpired)?;
        let inner = self.inner.read();
        if parts.generation != inner.generation || parts.sequence > inner.head {
            return Err(SyncError::TokenExpired);
        }

        let mut matching = inner
            .log
            .iter()
            .filter(|(seq, change)| *seq > parts.sequence && parts.tracks(change.kind()));

        let mut upserts = Vec::new();
        let mut deletions = Vec::new();
        let mut last_seq = None;
        for (seq, change) in matching.by_ref().take(self.page_size) {
            match change {
                LoggedChange::Upsert(record) => upserts.push(record.clone()),
                LoggedChange::Delete { id, .. } => deletions.push(id.clone()),
            }
            last_seq = Some(*seq);
        }
        let has_more = matching.next().is_some();

        let sequence = match (has_more, last_seq) {
            (true, Some(seq)) => seq,
            _ => inner.head,
        };

        Ok(ChangesPage {
            upserts,
            deletions,
            next_token: TokenParts { sequence, ..parts }.encode(),
            has_more,
        })
    }

    fn aggregate_session(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SyncResult<SessionAggregate> {
        self.ensure_available()?;
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        if self.aggregate_fails.load(Ordering::SeqCst) {
            return Err(SyncError::SourceUnavailable(
                "aggregate query failed".into(),
            ));
        }

        let inner = self.inner.read();
        if let Some(metrics) = inner.metrics.get(&(start, end)) {
            return Ok(*metrics);
        }

        let steps: Vec<u64> = inner
            .records
            .values()
            .filter_map(|record| match record {
                SourceRecord::Steps(s) if s.start_time >= start && s.end_time <= end => {
                    Some(s.count)
                }
                _ => None,
            })
            .collect();

        Ok(SessionAggregate {
            steps: (!steps.is_empty()).then(|| steps.iter().sum()),
            ..SessionAggregate::default()
        })
    }

    fn availability(&self) -> SourceAvailability {
        *self.availability.read()
    }

    fn has_permissions(&self) -> bool {
        self.permissions_granted.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
struct TokenParts {
    generation: u64,
    sequence: u64,
    mask: u8,
}

impl TokenParts {
    fn encode(&self) -> ChangeToken {
        ChangeToken::new(format!(
            "g{}-s{}-k{}",
            self.generation, self.sequence, self.mask
        ))
    }

    fn decode(token: &ChangeToken) -> Option<Self> {
        let mut parts = token.as_str().split('-');
        let generation = parts.next()?.strip_prefix('g')?.parse().ok()?;
        let sequence = parts.next()?.strip_prefix('s')?.parse().ok()?;
        let mask = parts.next()?.strip_prefix('k')?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            generation,
            sequence,
            mask,
        })
    }

    fn tracks(&self, kind: RecordKind) -> bool {
        self.mask & kind_bit(kind) != 0
    }
}

fn kind_bit(kind: RecordKind) -> u8 {
    match kind {
        RecordKind::Steps => 0b01,
        RecordKind::ExerciseSession => 0b10,
    }
}

fn kind_mask(kinds: &[RecordKind]) -> u8 {
    kinds.iter().fold(0, |mask, kind| mask | kind_bit(*kind))
}

#[derive(Debug, Deserialize)]
struct SourceFixture {
    #[serde(default)]
    steps: Vec<StepSample>,
    #[serde(default)]
    sessions: Vec<ExerciseSession>,
    #[serde(default)]
    metrics: Vec<MetricsFixture>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsFixture {
    session_id: String,
    #[serde(default)]
    energy_kcal: Option<f64>,
    #[serde(default)]
    distance_meters: Option<f64>,
    #[serde(default)]
    steps: Option<u64>,
    #[serde(default)]
    elevation_gain_meters: Option<f64>,
    #[serde(default)]
    avg_heart_rate_bpm: Option<f64>,
}

impl From<MetricsFixture> for SessionAggregate {
    fn from(m: MetricsFixture) -> Self {
        Self {
            energy_kcal: m.energy_kcal,
            distance_meters: m.distance_meters,
            steps: m.steps,
            elevation_gain_meters: m.elevation_gain_meters,
            avg_heart_rate_bpm: m.avg_heart_rate_bpm,
        }
    }
}
