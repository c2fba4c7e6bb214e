//! Sync command implementation.

use super::{build_engine, CliError, OutputFormat, Settings};
use healthsync_engine::{Clock, SyncController, SyncOutcome};
use healthsync_protocol::SyncEvent;
use serde::Serialize;

/// Result of a sync command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Whether the cycle succeeded.
    pub success: bool,
    /// `full` or `incremental` on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_type: Option<String>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Display timestamp of the last successful sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<String>,
    /// Relative form of `last_synced`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_relative: Option<String>,
    /// Notifications raised by the cycle.
    pub events: Vec<String>,
}

impl SyncReport {
    fn new(outcome: &SyncOutcome, events: &[SyncEvent], clock: &dyn Clock) -> Self {
        let now = clock.now();
        let cached = outcome.cached();
        let (sync_type, message) = match outcome {
            SyncOutcome::Success { sync_type, .. } => (Some(sync_type.to_string()), None),
            SyncOutcome::Error { message, .. } => (None, Some(message.clone())),
        };
        Self {
            success: outcome.is_success(),
            sync_type,
            message,
            last_synced: cached.map(|c| c.formatted_timestamp.clone()),
            last_synced_relative: cached.map(|c| c.relative_to(now, clock.local_offset(now))),
            events: events.iter().map(SyncEvent::message).collect(),
        }
    }
}

/// Runs one cycle, optionally forcing the full path.
pub fn run(settings: &Settings, force_full: bool, format: OutputFormat) -> Result<(), CliError> {
    let controller = SyncController::new(build_engine(settings)?);

    let outcome = if force_full {
        controller.force_full_sync()
    } else {
        controller.auto_sync()
    };
    let Some(outcome) = outcome else {
        return Err(CliError::SyncFailed(format!(
            "sync not started: {:?}",
            controller.ui_state()
        )));
    };

    let events = controller.take_events();
    let report = SyncReport::new(&outcome, &events, controller.engine().clock());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }

    match outcome {
        SyncOutcome::Success { .. } => Ok(()),
        SyncOutcome::Error { message, .. } => Err(CliError::SyncFailed(message)),
    }
}

fn print_text(report: &SyncReport) {
    if report.success {
        println!(
            "Sync complete ({})",
            report.sync_type.as_deref().unwrap_or("unknown")
        );
    } else {
        println!(
            "Sync failed: {}",
            report.message.as_deref().unwrap_or("unknown error")
        );
    }
    if let (Some(at), Some(relative)) = (&report.last_synced, &report.last_synced_relative) {
        println!("Last synced: {at} ({relative})");
    }
    for event in &report.events {
        println!("  {event}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use healthsync_engine::FixedClock;
    use healthsync_protocol::{CachedSyncData, SyncChanges, SyncType};

    #[test]
    fn report_for_success() {
        let at = Utc.with_ymd_and_hms(2025, 12, 15, 14, 30, 0).unwrap();
        let clock = FixedClock::new(at + Duration::minutes(5));
        let cached = CachedSyncData::new(at, clock.local_offset(at));
        let outcome = SyncOutcome::Success {
            sync_type: SyncType::Incremental,
            cached,
            changes: SyncChanges {
                steps_updated: 2,
                ..Default::default()
            },
        };

        let report = SyncReport::new(&outcome, &[SyncEvent::StepsUpdated(2)], &clock);
        assert!(report.success);
        assert_eq!(report.sync_type.as_deref(), Some("incremental"));
        assert_eq!(report.last_synced.as_deref(), Some("Dec 15, 2025 at 2:30 PM"));
        assert_eq!(report.last_synced_relative.as_deref(), Some("5 min ago"));
        assert_eq!(report.events, vec!["2 step records updated".to_string()]);
    }

    #[test]
    fn report_for_error() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 12, 15, 14, 30, 0).unwrap());
        let outcome = SyncOutcome::Error {
            message: "Server error: 500".into(),
            cached: None,
        };
        let report = SyncReport::new(&outcome, &[], &clock);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Server error: 500");
        assert!(json.get("lastSynced").is_none());
    }
}
