//! Status command implementation.

use super::{CliError, OutputFormat, Settings};
use healthsync_engine::{ChangeTokenStore, Clock, SyncCache, SystemClock};
use healthsync_storage::KeyValueStore;
use serde::Serialize;

/// Persisted sync state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// State file path.
    pub state: String,
    /// Whether the next sync will be incremental.
    pub incremental: bool,
    /// Abbreviated change token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_token: Option<String>,
    /// Display timestamp of the last successful sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<String>,
    /// Relative form of `last_synced`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_relative: Option<String>,
    /// RFC 3339 instant of the last successful sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_timestamp: Option<String>,
}

/// Reads the persisted state from `store`.
pub fn collect<K: KeyValueStore>(
    state: String,
    store: K,
    clock: &dyn Clock,
) -> Result<StatusReport, CliError> {
    let store = std::sync::Arc::new(store);
    let token = ChangeTokenStore::new(std::sync::Arc::clone(&store)).get()?;
    let cache = SyncCache::new(store);
    let cached = cache.load()?;
    let now = clock.now();

    Ok(StatusReport {
        state,
        incremental: token.is_some(),
        change_token: token.map(|t| t.short().to_string()),
        last_synced: cached.as_ref().map(|c| c.formatted_timestamp.clone()),
        last_synced_relative: cached
            .as_ref()
            .map(|c| c.relative_to(now, clock.local_offset(now))),
        last_sync_timestamp: cache.last_sync_timestamp()?.map(|at| at.to_rfc3339()),
    })
}

/// Prints the persisted sync state.
pub fn run(settings: &Settings, format: OutputFormat) -> Result<(), CliError> {
    let store = settings.open_store()?;
    let report = collect(settings.state.display().to_string(), store, &SystemClock)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("State file: {}", report.state);
            match &report.change_token {
                Some(token) => println!("Change token: {token}... (next sync is incremental)"),
                None => println!("Change token: none (next sync is full)"),
            }
            match (&report.last_synced, &report.last_synced_relative) {
                (Some(at), Some(relative)) => println!("Last synced: {at} ({relative})"),
                _ => println!("Last synced: never"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use healthsync_engine::{FixedClock, CACHED_SYNC_DATA_KEY, CHANGES_TOKEN_KEY};
    use healthsync_protocol::CachedSyncData;
    use healthsync_storage::InMemoryStore;

    #[test]
    fn empty_state() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 12, 15, 14, 30, 0).unwrap());
        let report = collect("mem".into(), InMemoryStore::new(), &clock).unwrap();
        assert!(!report.incremental);
        assert!(report.change_token.is_none());
        assert!(report.last_synced.is_none());
    }

    #[test]
    fn populated_state() {
        let at = Utc.with_ymd_and_hms(2025, 12, 15, 14, 30, 0).unwrap();
        let clock = FixedClock::new(at + Duration::hours(3));
        let cached = CachedSyncData::new(at, clock.local_offset(at));
        let store = InMemoryStore::with_entries([
            (CHANGES_TOKEN_KEY.to_string(), "g0-s12-k3".to_string()),
            (CACHED_SYNC_DATA_KEY.to_string(), cached.to_json().unwrap()),
        ]);

        let report = collect("mem".into(), store, &clock).unwrap();
        assert!(report.incremental);
        assert_eq!(report.change_token.as_deref(), Some("g0-s12-k3"));
        assert_eq!(report.last_synced.as_deref(), Some("Dec 15, 2025 at 2:30 PM"));
        assert_eq!(report.last_synced_relative.as_deref(), Some("3 hours ago"));
        assert!(report.last_sync_timestamp.is_none());
    }
}
