//! # HealthSync Protocol
//!
//! Health record model and JSON wire types for HealthSync.
//!
//! This crate provides:
//! - `SyncRecord` for step and exercise-session records
//! - `ExerciseType` mapping from source integer codes
//! - Protocol messages (`SyncRequest`, `SyncResponse`)
//! - `CachedSyncData` and per-cycle `SyncChanges` / `SyncEvent`
//! - Display helpers for sync timestamps
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod changes;
mod error;
mod exercise;
mod messages;
mod record;
mod time_format;

pub use cache::CachedSyncData;
pub use changes::{SyncChanges, SyncEvent};
pub use error::{ProtocolError, ProtocolResult};
pub use exercise::ExerciseType;
pub use messages::{SyncRequest, SyncResponse, SyncType};
pub use record::{
    ExerciseLap, ExerciseSessionData, ExerciseSessionRecord, RecordKind, StepRecord,
    StepRecordData, SyncRecord,
};
pub use time_format::{format_display_timestamp, format_relative_timestamp};
