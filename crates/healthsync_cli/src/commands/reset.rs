//! Token and cache reset commands.

use super::{CliError, Settings};
use healthsync_engine::{ChangeTokenStore, SyncCache};
use healthsync_storage::KeyValueStore;
use std::sync::Arc;
use tracing::info;

/// Deletes the change token.
pub fn clear_token(settings: &Settings) -> Result<(), CliError> {
    let store = settings.open_store()?;
    clear_token_in(store)?;
    println!("Change token cleared; the next sync will be full.");
    Ok(())
}

/// Deletes the change token and the cached result.
pub fn reset(settings: &Settings) -> Result<(), CliError> {
    let store = settings.open_store()?;
    reset_in(store)?;
    println!("Sync state reset.");
    Ok(())
}

fn clear_token_in<K: KeyValueStore>(store: K) -> Result<(), CliError> {
    ChangeTokenStore::new(store).clear()?;
    info!("change token cleared");
    Ok(())
}

fn reset_in<K: KeyValueStore>(store: K) -> Result<(), CliError> {
    let store = Arc::new(store);
    ChangeTokenStore::new(Arc::clone(&store)).clear()?;
    SyncCache::new(store).clear()?;
    info!("change token and cached sync data cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthsync_engine::{CACHED_SYNC_DATA_KEY, CHANGES_TOKEN_KEY, LAST_SYNC_TIMESTAMP_KEY};
    use healthsync_storage::InMemoryStore;

    fn populated() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::with_entries([
            (CHANGES_TOKEN_KEY, "g0-s3-k3"),
            (CACHED_SYNC_DATA_KEY, "{}"),
            (LAST_SYNC_TIMESTAMP_KEY, "2025-12-15T14:30:00+00:00"),
        ]))
    }

    #[test]
    fn clear_token_keeps_cache() {
        let store = populated();
        clear_token_in(Arc::clone(&store)).unwrap();
        assert!(store.get(CHANGES_TOKEN_KEY).unwrap().is_none());
        assert!(store.get(CACHED_SYNC_DATA_KEY).unwrap().is_some());
    }

    #[test]
    fn reset_removes_everything() {
        let store = populated();
        reset_in(Arc::clone(&store)).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn reset_of_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        let store = healthsync_storage::FileStore::open(&path).unwrap();
        store.set(CHANGES_TOKEN_KEY, "g0-s1-k3").unwrap();
        reset_in(store).unwrap();

        let reopened = healthsync_storage::FileStore::open(&path).unwrap();
        assert!(reopened.get(CHANGES_TOKEN_KEY).unwrap().is_none());
    }
}
