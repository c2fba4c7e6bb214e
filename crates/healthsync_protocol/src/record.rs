//! Health records sent to the backend.

use crate::exercise::ExerciseType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The kinds of record the source store tracks for sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Step counts.
    Steps,
    /// Exercise sessions.
    ExerciseSession,
}

impl RecordKind {
    /// Returns the type discriminator used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Steps => "steps",
            RecordKind::ExerciseSession => "exercise_session",
        }
    }
}

/// A record in a sync batch.
///
/// Serialized with a `type` discriminator so both kinds can share one
/// `records` array:
///
/// ```json
/// {"type": "steps", "id": "a1", "date": "2025-12-14", "count": 8500}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncRecord {
    /// A step record.
    #[serde(rename = "steps")]
    Steps(StepRecord),
    /// An exercise session record.
    #[serde(rename = "exercise_session")]
    ExerciseSession(ExerciseSessionRecord),
}

impl SyncRecord {
    /// Returns the source-assigned identifier.
    ///
    /// Empty for aggregated-only records.
    pub fn id(&self) -> &str {
        match self {
            SyncRecord::Steps(r) => &r.id,
            SyncRecord::ExerciseSession(r) => &r.id,
        }
    }

    /// Returns the record kind.
    pub fn kind(&self) -> RecordKind {
        match self {
            SyncRecord::Steps(_) => RecordKind::Steps,
            SyncRecord::ExerciseSession(_) => RecordKind::ExerciseSession,
        }
    }
}

impl From<StepRecord> for SyncRecord {
    fn from(record: StepRecord) -> Self {
        SyncRecord::Steps(record)
    }
}

impl From<ExerciseSessionRecord> for SyncRecord {
    fn from(record: ExerciseSessionRecord) -> Self {
        SyncRecord::ExerciseSession(record)
    }
}

/// Steps counted over one source record or one aggregated day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    /// Source record ID, empty for daily totals.
    #[serde(default)]
    pub id: String,
    /// Local calendar day of the start instant.
    pub date: NaiveDate,
    /// Number of steps.
    pub count: u64,
    /// Time range of the source record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<StepRecordData>,
}

impl StepRecord {
    /// Creates a step record for a single source record.
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        count: u64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            count,
            data: Some(StepRecordData {
                start_time,
                end_time,
            }),
        }
    }

    /// Creates a daily total with no source identity.
    pub fn daily_total(date: NaiveDate, count: u64) -> Self {
        Self {
            id: String::new(),
            date,
            count,
            data: None,
        }
    }
}

/// Time range of a step record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecordData {
    /// Start instant.
    pub start_time: DateTime<Utc>,
    /// End instant.
    pub end_time: DateTime<Utc>,
}

/// An exercise session with its aggregated metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSessionRecord {
    /// Source record ID.
    pub id: String,
    /// Exercise kind.
    pub exercise_type: ExerciseType,
    /// Session start.
    pub start_time: DateTime<Utc>,
    /// Session end.
    pub end_time: DateTime<Utc>,
    /// Identifier of the app that recorded the session.
    pub source: String,
    /// User-provided title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// User-provided notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Aggregated metrics and laps.
    pub data: ExerciseSessionData,
}

/// Metrics aggregated over an exercise session's window.
///
/// Each metric is `None` when the source could not compute it; absent
/// metrics are left out of the JSON body rather than sent as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSessionData {
    /// Active energy in kilocalories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_burned: Option<f64>,
    /// Distance in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_distance: Option<f64>,
    /// Steps taken during the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u64>,
    /// Elevation gained in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_gain: Option<f64>,
    /// Average heart rate in beats per minute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_heart_rate: Option<f64>,
    /// Recorded laps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub laps: Vec<ExerciseLap>,
}

impl ExerciseSessionData {
    /// Returns true if no metric is available.
    pub fn has_no_metrics(&self) -> bool {
        self.energy_burned.is_none()
            && self.total_distance.is_none()
            && self.steps.is_none()
            && self.elevation_gain.is_none()
            && self.avg_heart_rate.is_none()
    }
}

/// A lap within an exercise session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseLap {
    /// Lap start.
    pub start_time: DateTime<Utc>,
    /// Lap end.
    pub end_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn instant(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 14, h, m, 0).unwrap()
    }

    #[test]
    fn step_record_json_shape() {
        let record = SyncRecord::from(StepRecord::new(
            "abc",
            NaiveDate::from_ymd_opt(2025, 12, 14).unwrap(),
            8500,
            instant(8, 0),
            instant(9, 0),
        ));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "steps",
                "id": "abc",
                "date": "2025-12-14",
                "count": 8500,
                "data": {
                    "startTime": "2025-12-14T08:00:00Z",
                    "endTime": "2025-12-14T09:00:00Z"
                }
            })
        );
    }

    #[test]
    fn daily_total_has_no_data() {
        let record = StepRecord::daily_total(NaiveDate::from_ymd_opt(2025, 12, 14).unwrap(), 10);
        let value = serde_json::to_value(SyncRecord::from(record)).unwrap();
        assert_eq!(value["id"], "");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn session_absent_metrics_are_omitted() {
        let record = SyncRecord::from(ExerciseSessionRecord {
            id: "s1".into(),
            exercise_type: ExerciseType::Running,
            start_time: instant(7, 0),
            end_time: instant(7, 45),
            source: "com.example.tracker".into(),
            title: Some("Morning run".into()),
            notes: None,
            data: ExerciseSessionData {
                energy_burned: Some(412.5),
                steps: Some(6100),
                ..Default::default()
            },
        });

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "exercise_session");
        assert_eq!(value["exerciseType"], "RUNNING");
        assert_eq!(value["title"], "Morning run");
        assert!(value.get("notes").is_none());
        assert_eq!(value["data"]["energyBurned"], 412.5);
        assert_eq!(value["data"]["steps"], 6100);
        assert!(value["data"].get("totalDistance").is_none());
        assert!(value["data"].get("avgHeartRate").is_none());
        assert!(value["data"].get("laps").is_none());
    }

    #[test]
    fn record_accessors() {
        let step = SyncRecord::from(StepRecord::daily_total(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            1,
        ));
        assert_eq!(step.id(), "");
        assert_eq!(step.kind(), RecordKind::Steps);
        assert_eq!(RecordKind::ExerciseSession.as_str(), "exercise_session");
    }

    #[test]
    fn session_data_metrics_presence() {
        assert!(ExerciseSessionData::default().has_no_metrics());
        let data = ExerciseSessionData {
            avg_heart_rate: Some(140.0),
            ..Default::default()
        };
        assert!(!data.has_no_metrics());
    }
}
