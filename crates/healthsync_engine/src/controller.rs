//! Presentation-facing wrapper around the engine.

use crate::remote::RemoteSyncClient;
use crate::source::{HealthSource, SourceAvailability};
use crate::state::{SyncEngine, SyncOutcome};
use healthsync_protocol::{CachedSyncData, SyncEvent};
use healthsync_storage::KeyValueStore;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// What the sync screen shows.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncUiState {
    /// Ready to sync, with the last result if there is one.
    Ready(Option<CachedSyncData>),
    /// Syncing with nothing cached to show.
    Syncing,
    /// Syncing while showing the last result.
    Refreshing(CachedSyncData),
    /// The last sync succeeded.
    Success(CachedSyncData),
    /// The last sync failed.
    Error {
        /// Message for the user.
        message: String,
        /// Last good result, if any.
        cached: Option<CachedSyncData>,
    },
    /// Read permissions are missing.
    NoPermission,
    /// The health store needs to be installed.
    NoHealthConnect,
    /// The device cannot run the health store.
    NotSupported,
}

impl SyncUiState {
    /// Returns the cached result shown in this state.
    pub fn cached(&self) -> Option<&CachedSyncData> {
        match self {
            SyncUiState::Ready(cached) => cached.as_ref(),
            SyncUiState::Refreshing(cached) | SyncUiState::Success(cached) => Some(cached),
            SyncUiState::Error { cached, .. } => cached.as_ref(),
            SyncUiState::Syncing
            | SyncUiState::NoPermission
            | SyncUiState::NoHealthConnect
            | SyncUiState::NotSupported => None,
        }
    }

    /// Returns true while a sync is shown as running.
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncUiState::Syncing | SyncUiState::Refreshing(_))
    }

    fn from_outcome(outcome: &SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Success { cached, .. } => SyncUiState::Success(cached.clone()),
            SyncOutcome::Error { message, cached } => SyncUiState::Error {
                message: message.clone(),
                cached: cached.clone(),
            },
        }
    }
}

/// Drives the engine on behalf of a sync screen.
///
/// Holds the screen state and a queue of one-shot change notifications.
/// Redundant triggers while a cycle runs are dropped.
pub struct SyncController<S: HealthSource, R: RemoteSyncClient, K: KeyValueStore> {
    engine: SyncEngine<S, R, K>,
    ui_state: RwLock<SyncUiState>,
    events: Mutex<VecDeque<SyncEvent>>,
}

impl<S: HealthSource, R: RemoteSyncClient, K: KeyValueStore> SyncController<S, R, K> {
    /// Wraps an engine, showing the cached result as `Ready`.
    pub fn new(engine: SyncEngine<S, R, K>) -> Self {
        let cached = Self::load_cached(&engine);
        Self {
            engine,
            ui_state: RwLock::new(SyncUiState::Ready(cached)),
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Gets the engine.
    pub fn engine(&self) -> &SyncEngine<S, R, K> {
        &self.engine
    }

    /// Gets the current screen state.
    pub fn ui_state(&self) -> SyncUiState {
        self.ui_state.read().clone()
    }

    /// Drains pending notifications, oldest first.
    pub fn take_events(&self) -> Vec<SyncEvent> {
        self.events.lock().drain(..).collect()
    }

    /// Re-checks availability and permissions.
    pub fn check_availability(&self) -> SyncUiState {
        let state = match self.engine.source().availability() {
            SourceAvailability::Available => self.permission_state(),
            SourceAvailability::NotInstalled => SyncUiState::NoHealthConnect,
            SourceAvailability::NotSupported => SyncUiState::NotSupported,
        };
        self.set_ui_state(state.clone());
        state
    }

    /// Applies the result of a permission request.
    pub fn on_permission_result(&self, granted: bool) {
        let state = if granted {
            SyncUiState::Ready(Self::load_cached(&self.engine))
        } else {
            SyncUiState::NoPermission
        };
        self.set_ui_state(state);
    }

    /// Manual sync. Requires permissions.
    ///
    /// Returns `None` if a sync is already running or permissions are missing.
    pub fn sync(&self) -> Option<SyncOutcome> {
        if self.engine.is_syncing() {
            debug!("sync already running, ignoring trigger");
            return None;
        }
        if !self.engine.source().has_permissions() {
            self.set_ui_state(SyncUiState::NoPermission);
            return None;
        }
        self.run(false)
    }

    /// Foreground sync. Requires the store to be available and permitted.
    pub fn auto_sync(&self) -> Option<SyncOutcome> {
        if self.engine.is_syncing() {
            debug!("sync already running, ignoring auto sync");
            return None;
        }
        match self.engine.source().availability() {
            SourceAvailability::Available => {}
            SourceAvailability::NotInstalled => {
                self.set_ui_state(SyncUiState::NoHealthConnect);
                return None;
            }
            SourceAvailability::NotSupported => {
                self.set_ui_state(SyncUiState::NotSupported);
                return None;
            }
        }
        if !self.engine.source().has_permissions() {
            info!("permissions missing, skipping auto sync");
            self.set_ui_state(SyncUiState::NoPermission);
            return None;
        }
        self.run(false)
    }

    /// Clears the change token and syncs everything in the window.
    pub fn force_full_sync(&self) -> Option<SyncOutcome> {
        if self.engine.is_syncing() {
            return None;
        }
        if !self.engine.source().has_permissions() {
            self.set_ui_state(SyncUiState::NoPermission);
            return None;
        }
        self.run(true)
    }

    /// Returns to `Ready` unless a sync is running.
    pub fn reset_to_ready(&self) {
        if self.engine.is_syncing() {
            return;
        }
        self.set_ui_state(SyncUiState::Ready(Self::load_cached(&self.engine)));
    }

    fn run(&self, force_full: bool) -> Option<SyncOutcome> {
        let permit = self.engine.try_begin()?;

        let busy = match Self::load_cached(&self.engine) {
            Some(cached) => SyncUiState::Refreshing(cached),
            None => SyncUiState::Syncing,
        };
        self.set_ui_state(busy);

        let outcome = self.engine.run(&permit, force_full);
        self.set_ui_state(SyncUiState::from_outcome(&outcome));
        if let Some(event) = outcome.event() {
            debug!(event = %event, "queueing sync event");
            self.events.lock().push_back(event);
        }
        drop(permit);

        Some(outcome)
    }

    fn permission_state(&self) -> SyncUiState {
        if self.engine.source().has_permissions() {
            SyncUiState::Ready(Self::load_cached(&self.engine))
        } else {
            SyncUiState::NoPermission
        }
    }

    fn set_ui_state(&self, state: SyncUiState) {
        *self.ui_state.write() = state;
    }

    fn load_cached(engine: &SyncEngine<S, R, K>) -> Option<CachedSyncData> {
        engine.cached_data().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read cached sync data");
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::SyncConfig;
    use crate::memory_source::MemoryHealthSource;
    use crate::remote::{MemoryBackend, ScriptedFailure};
    use crate::source::StepSample;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use healthsync_storage::InMemoryStore;
    use std::sync::Arc;

    type TestController =
        SyncController<Arc<MemoryHealthSource>, Arc<MemoryBackend>, InMemoryStore>;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 15, 14, 30, 0).unwrap()
    }

    fn controller() -> (Arc<MemoryHealthSource>, Arc<MemoryBackend>, TestController) {
        let source = Arc::new(MemoryHealthSource::new());
        let backend = Arc::new(MemoryBackend::new());
        let engine = SyncEngine::new(
            SyncConfig::default(),
            Arc::clone(&source),
            Arc::clone(&backend),
            InMemoryStore::new(),
        )
        .with_clock(Arc::new(FixedClock::new(now())));
        (source, backend, SyncController::new(engine))
    }

    fn sample(id: &str, count: u64) -> StepSample {
        StepSample {
            id: id.to_string(),
            start_time: now() - Duration::hours(1),
            end_time: now() - Duration::minutes(50),
            count,
        }
    }

    #[test]
    fn starts_ready_without_cache() {
        let (_, _, controller) = controller();
        assert_eq!(controller.ui_state(), SyncUiState::Ready(None));
    }

    #[test]
    fn availability_states() {
        let (source, _, controller) = controller();
        assert_eq!(controller.check_availability(), SyncUiState::Ready(None));

        source.set_permissions(false);
        assert_eq!(controller.check_availability(), SyncUiState::NoPermission);

        source.set_availability(SourceAvailability::NotInstalled);
        assert_eq!(controller.check_availability(), SyncUiState::NoHealthConnect);

        source.set_availability(SourceAvailability::NotSupported);
        assert_eq!(controller.check_availability(), SyncUiState::NotSupported);
    }

    #[test]
    fn permission_result() {
        let (_, _, controller) = controller();
        controller.on_permission_result(false);
        assert_eq!(controller.ui_state(), SyncUiState::NoPermission);
        controller.on_permission_result(true);
        assert_eq!(controller.ui_state(), SyncUiState::Ready(None));
    }

    #[test]
    fn sync_without_permission_does_nothing() {
        let (source, backend, controller) = controller();
        source.set_permissions(false);
        assert!(controller.sync().is_none());
        assert!(controller.force_full_sync().is_none());
        assert_eq!(controller.ui_state(), SyncUiState::NoPermission);
        assert_eq!(backend.submission_count(), 0);
    }

    #[test]
    fn auto_sync_checks_availability() {
        let (source, backend, controller) = controller();
        source.insert_steps(sample("a", 10));
        source.set_availability(SourceAvailability::NotInstalled);
        assert!(controller.auto_sync().is_none());
        assert_eq!(controller.ui_state(), SyncUiState::NoHealthConnect);
        assert_eq!(backend.submission_count(), 0);

        source.set_availability(SourceAvailability::Available);
        assert!(controller.auto_sync().unwrap().is_success());
        assert!(matches!(controller.ui_state(), SyncUiState::Success(_)));
    }

    #[test]
    fn incremental_changes_queue_events() {
        let (source, _, controller) = controller();
        source.insert_steps(sample("a", 10));
        assert!(controller.sync().unwrap().is_success());
        assert!(controller.take_events().is_empty());

        source.insert_steps(sample("b", 20));
        assert!(controller.sync().unwrap().is_success());
        assert_eq!(controller.take_events(), vec![SyncEvent::StepsUpdated(1)]);
        assert!(controller.take_events().is_empty());
    }

    #[test]
    fn error_keeps_cache_and_reset_returns_to_ready() {
        let (source, backend, controller) = controller();
        source.insert_steps(sample("a", 10));
        assert!(controller.sync().unwrap().is_success());
        let cached = controller.ui_state().cached().cloned().unwrap();

        source.insert_steps(sample("b", 20));
        backend.fail_next(ScriptedFailure::Unreachable);
        controller.sync().unwrap();
        assert_eq!(
            controller.ui_state(),
            SyncUiState::Error {
                message: "Network error: Cannot reach server".into(),
                cached: Some(cached.clone()),
            }
        );

        controller.reset_to_ready();
        assert_eq!(controller.ui_state(), SyncUiState::Ready(Some(cached)));
    }

    #[test]
    fn busy_engine_drops_triggers() {
        let (_, backend, controller) = controller();
        let permit = controller.engine().try_begin().unwrap();
        controller.on_permission_result(true);
        assert!(controller.sync().is_none());
        assert!(controller.auto_sync().is_none());
        assert!(controller.force_full_sync().is_none());
        controller.reset_to_ready();
        drop(permit);
        assert_eq!(backend.submission_count(), 0);
    }
}
