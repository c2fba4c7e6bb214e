//! Durable storage for the change token.

use crate::source::ChangeToken;
use healthsync_storage::{KeyValueStore, StorageResult};
use tracing::debug;

/// Key under which the change token is persisted.
pub const CHANGES_TOKEN_KEY: &str = "changes_token";

/// Holds at most one change token.
///
/// Clearing is the only way to put the engine back into full-sync mode.
#[derive(Debug)]
pub struct ChangeTokenStore<K: KeyValueStore> {
    store: K,
}

impl<K: KeyValueStore> ChangeTokenStore<K> {
    /// Wraps a key-value store.
    pub fn new(store: K) -> Self {
        Self { store }
    }

    /// Returns the persisted token, if any.
    ///
    /// An empty stored value counts as no token.
    pub fn get(&self) -> StorageResult<Option<ChangeToken>> {
        Ok(self
            .store
            .get(CHANGES_TOKEN_KEY)?
            .filter(|token| !token.is_empty())
            .map(ChangeToken::from))
    }

    /// Persists `token`, replacing the previous one.
    pub fn set(&self, token: &ChangeToken) -> StorageResult<()> {
        debug!(token = token.short(), "persisting change token");
        self.store.set(CHANGES_TOKEN_KEY, token.as_str())
    }

    /// Deletes the persisted token.
    pub fn clear(&self) -> StorageResult<()> {
        debug!("clearing change token");
        self.store.remove(CHANGES_TOKEN_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthsync_storage::InMemoryStore;

    #[test]
    fn set_get_clear() {
        let tokens = ChangeTokenStore::new(InMemoryStore::new());
        assert_eq!(tokens.get().unwrap(), None);

        tokens.set(&ChangeToken::new("g0-s4-k3")).unwrap();
        assert_eq!(tokens.get().unwrap(), Some(ChangeToken::new("g0-s4-k3")));

        tokens.set(&ChangeToken::new("g0-s9-k3")).unwrap();
        assert_eq!(tokens.get().unwrap().unwrap().as_str(), "g0-s9-k3");

        tokens.clear().unwrap();
        assert_eq!(tokens.get().unwrap(), None);
    }

    #[test]
    fn empty_value_is_no_token() {
        let store = InMemoryStore::new();
        store.set(CHANGES_TOKEN_KEY, "").unwrap();
        assert_eq!(ChangeTokenStore::new(store).get().unwrap(), None);
    }
}
