//! Durable storage for the last-known-good sync result.

use crate::error::SyncResult;
use chrono::{DateTime, Utc};
use healthsync_protocol::CachedSyncData;
use healthsync_storage::KeyValueStore;
use tracing::warn;

/// Key under which the cached sync result is persisted.
pub const CACHED_SYNC_DATA_KEY: &str = "cached_sync_data";

/// Key under which the last successful sync instant is persisted.
pub const LAST_SYNC_TIMESTAMP_KEY: &str = "last_sync_timestamp";

/// Reads and replaces the cached sync result.
#[derive(Debug)]
pub struct SyncCache<K: KeyValueStore> {
    store: K,
}

impl<K: KeyValueStore> SyncCache<K> {
    /// Wraps a key-value store.
    pub fn new(store: K) -> Self {
        Self { store }
    }

    /// Returns the cached result.
    ///
    /// An undecodable value is reported as absent.
    pub fn load(&self) -> SyncResult<Option<CachedSyncData>> {
        let Some(json) = self.store.get(CACHED_SYNC_DATA_KEY)? else {
            return Ok(None);
        };
        match CachedSyncData::from_json(&json) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                warn!(error = %e, "discarding unreadable cached sync data");
                Ok(None)
            }
        }
    }

    /// Replaces the cached result and the last sync instant.
    pub fn save(&self, data: &CachedSyncData) -> SyncResult<()> {
        self.store.set(CACHED_SYNC_DATA_KEY, &data.to_json()?)?;
        self.store
            .set(LAST_SYNC_TIMESTAMP_KEY, &data.sync_timestamp.to_rfc3339())?;
        Ok(())
    }

    /// Returns the instant of the last successful sync.
    pub fn last_sync_timestamp(&self) -> SyncResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.store.get(LAST_SYNC_TIMESTAMP_KEY)? else {
            return Ok(None);
        };
        Ok(DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .ok())
    }

    /// Removes the cached result and the last sync instant.
    pub fn clear(&self) -> SyncResult<()> {
        self.store.remove(CACHED_SYNC_DATA_KEY)?;
        self.store.remove(LAST_SYNC_TIMESTAMP_KEY)?;
        Ok(())
    }
}
