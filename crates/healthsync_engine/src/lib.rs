//! # HealthSync Engine
//!
//! Change-tracking sync engine for HealthSync.
//!
//! This crate provides:
//! - Sync state machine (idle → syncing → success / error)
//! - Full and incremental sync driven by source change tokens
//! - Change token and cached-result persistence
//! - Record aggregation (daily step totals, session metrics)
//! - Retry with exponential backoff on transient transport errors
//! - HTTP remote client abstraction, with a `reqwest` implementation
//! - A presentation-facing controller with screen states and notifications
//!
//! ## Architecture
//!
//! Each cycle runs one of two paths:
//! 1. **Incremental**, when a change token is persisted: page through the
//!    source's changes after the token and send only those.
//! 2. **Full**, when there is no token or it has expired: read the trailing
//!    lookback window and send everything in it.
//!
//! The token and the cached result are only replaced after the backend
//! acknowledges the batch, so a failed cycle leaves nothing half-written.
//!
//! ## Key Invariants
//!
//! - At most one cycle runs at a time
//! - The change token never moves backwards except by being cleared
//! - Backend writes are idempotent upserts keyed by record id
//! - Errors resolve to a [`SyncOutcome`]; public entry points never fail

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregator;
mod cache;
mod clock;
mod config;
mod controller;
mod error;
mod http;
mod memory_source;
mod remote;
mod source;
mod state;
mod token_store;

pub use cache::{SyncCache, CACHED_SYNC_DATA_KEY, LAST_SYNC_TIMESTAMP_KEY};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    RetryConfig, StepGranularity, SyncConfig, DEFAULT_LOOKBACK_DAYS, MAX_LOOKBACK_DAYS,
};
pub use controller::{SyncController, SyncUiState};
pub use error::{SyncError, SyncResult};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use http::{HttpClient, HttpError, HttpRemoteClient, HttpResponse};
pub use memory_source::{MemoryHealthSource, DEFAULT_PAGE_SIZE};
pub use remote::{MemoryBackend, RemoteSyncClient, ScriptedFailure, SubmitOutcome};
pub use source::{
    ChangeToken, ChangesPage, ExerciseSession, HealthSource, SessionAggregate, SessionLap,
    SourceAvailability, SourceRecord, StepSample, TimeWindow, WindowSnapshot,
};
pub use state::{SyncEngine, SyncOutcome, SyncPermit, SyncState, SyncStats};
pub use token_store::{ChangeTokenStore, CHANGES_TOKEN_KEY};
