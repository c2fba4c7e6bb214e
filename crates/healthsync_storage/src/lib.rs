//! # HealthSync Storage
//!
//! Durable key-value persistence for HealthSync.
//!
//! This crate provides the persistence boundary the sync engine writes
//! through. Stores are **flat string maps** - they do not interpret the
//! values they hold.
//!
//! ## Design Principles
//!
//! - A store is a simple `get` / `set` / `remove` map of strings
//! - No schema beyond flat key/value pairs
//! - Must be `Send + Sync` so one store can back several engine components
//! - A successful `set` or `remove` on a durable store survives restarts
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral state
//! - [`FileStore`] - For persistent state in a single JSON file
//!
//! ## Example
//!
//! ```rust
//! use healthsync_storage::{InMemoryStore, KeyValueStore};
//!
//! let store = InMemoryStore::new();
//! store.set("changes_token", "abc").unwrap();
//! assert_eq!(store.get("changes_token").unwrap().as_deref(), Some("abc"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::KeyValueStore;
