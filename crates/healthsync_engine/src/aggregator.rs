//! Shapes raw source records into sync records.
//!
//! Every function here is deterministic: the result depends only on the
//! inputs and the explicit UTC offset, never on the ambient timezone.

use crate::source::{ExerciseSession, HealthSource, SourceRecord, StepSample};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use healthsync_protocol::{
    ExerciseLap, ExerciseSessionData, ExerciseSessionRecord, ExerciseType, StepRecord, SyncRecord,
};
use std::collections::BTreeMap;
use tracing::warn;

/// Total steps for one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyStepCount {
    /// Local calendar day.
    pub date: NaiveDate,
    /// Summed step count.
    pub count: u64,
}

/// Returns the local calendar day of `instant`.
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// Groups samples by the local day of their start instant and sums them.
///
/// Days are returned newest first.
pub fn aggregate_steps(samples: &[StepSample], offset: FixedOffset) -> Vec<DailyStepCount> {
    let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for sample in samples {
        *by_day
            .entry(local_date(sample.start_time, offset))
            .or_default() += sample.count;
    }

    by_day
        .into_iter()
        .rev()
        .map(|(date, count)| DailyStepCount { date, count })
        .collect()
}

/// One step record per sample, keeping the source identifier.
pub fn step_records(samples: &[StepSample], offset: FixedOffset) -> Vec<SyncRecord> {
    samples.iter().map(|s| step_record(s, offset)).collect()
}

/// One identifier-less step record per local day.
pub fn daily_step_records(samples: &[StepSample], offset: FixedOffset) -> Vec<SyncRecord> {
    aggregate_steps(samples, offset)
        .into_iter()
        .map(|day| StepRecord::daily_total(day.date, day.count).into())
        .collect()
}

/// Converts a single sample.
pub fn step_record(sample: &StepSample, offset: FixedOffset) -> SyncRecord {
    StepRecord::new(
        sample.id.clone(),
        local_date(sample.start_time, offset),
        sample.count,
        sample.start_time,
        sample.end_time,
    )
    .into()
}

/// Aggregates metrics over exactly the session window.
///
/// A failed query yields all-absent metrics; the failure is logged and never
/// propagated, so one bad session cannot fail a whole sync.
pub fn aggregate_session_metrics<S: HealthSource + ?Sized>(
    session: &ExerciseSession,
    source: &S,
) -> ExerciseSessionData {
    match source.aggregate_session(session.start_time, session.end_time) {
        Ok(aggregate) => ExerciseSessionData {
            energy_burned: aggregate.energy_kcal,
            total_distance: aggregate.distance_meters,
            steps: aggregate.steps,
            elevation_gain: aggregate.elevation_gain_meters,
            avg_heart_rate: aggregate.avg_heart_rate_bpm,
            laps: Vec::new(),
        },
        Err(e) => {
            warn!(session = %session.id, error = %e, "session aggregate query failed");
            ExerciseSessionData::default()
        }
    }
}

/// Builds the full exercise record for a session.
pub fn session_record<S: HealthSource + ?Sized>(
    session: &ExerciseSession,
    source: &S,
) -> SyncRecord {
    let mut data = aggregate_session_metrics(session, source);
    data.laps = session
        .laps
        .iter()
        .map(|lap| ExerciseLap {
            start_time: lap.start_time,
            end_time: lap.end_time,
        })
        .collect();

    ExerciseSessionRecord {
        id: session.id.clone(),
        exercise_type: ExerciseType::from_source_code(session.exercise_type),
        start_time: session.start_time,
        end_time: session.end_time,
        source: session.source_app.clone(),
        title: session.title.clone(),
        notes: session.notes.clone(),
        data,
    }
    .into()
}

/// Converts a changed record from the change feed.
///
/// Steps always keep their identity here so deletions can be matched.
pub fn change_record<S: HealthSource + ?Sized>(
    record: &SourceRecord,
    source: &S,
    offset: FixedOffset,
) -> SyncRecord {
    match record {
        SourceRecord::Steps(sample) => step_record(sample, offset),
        SourceRecord::ExerciseSession(session) => session_record(session, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_source::MemoryHealthSource;
    use crate::source::{SessionAggregate, SessionLap};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn utc(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, day, hour, min, 0).unwrap()
    }

    fn sample(id: &str, start: DateTime<Utc>, count: u64) -> StepSample {
        StepSample {
            id: id.to_string(),
            start_time: start,
            end_time: start + Duration::minutes(10),
            count,
        }
    }

    fn run(id: &str) -> ExerciseSession {
        ExerciseSession {
            id: id.to_string(),
            exercise_type: 56,
            start_time: utc(14, 7, 0),
            end_time: utc(14, 7, 45),
            source_app: "com.example.tracker".into(),
            title: Some("Morning run".into()),
            notes: None,
            laps: vec![SessionLap {
                start_time: utc(14, 7, 0),
                end_time: utc(14, 7, 20),
            }],
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, day).unwrap()
    }

    #[test]
    fn groups_by_local_day_newest_first() {
        let samples = vec![
            sample("a", utc(13, 10, 0), 100),
            sample("b", utc(14, 10, 0), 200),
            sample("c", utc(14, 18, 0), 50),
        ];
        let days = aggregate_steps(&samples, FixedOffset::east_opt(0).unwrap());
        assert_eq!(
            days,
            vec![
                DailyStepCount {
                    date: date(14),
                    count: 250
                },
                DailyStepCount {
                    date: date(13),
                    count: 100
                },
            ]
        );
    }

    #[test]
    fn day_boundary_follows_offset() {
        // 23:30 UTC is already the next day at UTC+2.
        let samples = vec![sample("late", utc(14, 23, 30), 10)];
        let east = aggregate_steps(&samples, FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(east[0].date, date(15));

        let utc_days = aggregate_steps(&samples, FixedOffset::east_opt(0).unwrap());
        assert_eq!(utc_days[0].date, date(14));
    }

    #[test]
    fn per_record_and_daily_shapes() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let samples = vec![
            sample("a", utc(14, 9, 0), 100),
            sample("b", utc(14, 10, 0), 200),
        ];

        let records = step_records(&samples, offset);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), "a");

        let daily = daily_step_records(&samples, offset);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].id(), "");
        match &daily[0] {
            SyncRecord::Steps(r) => assert_eq!(r.count, 300),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn session_record_maps_type_and_laps() {
        let source = MemoryHealthSource::new();
        let session = run("e1");
        source.set_session_metrics(
            session.start_time,
            session.end_time,
            SessionAggregate {
                energy_kcal: Some(412.5),
                steps: Some(6100),
                ..Default::default()
            },
        );

        match session_record(&session, &source) {
            SyncRecord::ExerciseSession(r) => {
                assert_eq!(r.exercise_type, ExerciseType::Running);
                assert_eq!(r.source, "com.example.tracker");
                assert_eq!(r.data.energy_burned, Some(412.5));
                assert_eq!(r.data.steps, Some(6100));
                assert_eq!(r.data.total_distance, None);
                assert_eq!(r.data.laps.len(), 1);
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn failed_aggregate_yields_absent_metrics() {
        let source = MemoryHealthSource::new();
        source.set_aggregate_failure(true);
        let data = aggregate_session_metrics(&run("e1"), &source);
        assert!(data.has_no_metrics());
        assert_eq!(source.aggregate_calls(), 1);
    }

    proptest! {
        #[test]
        fn aggregation_is_order_independent(
            entries in prop::collection::vec((0u32..14, 0u32..24, 0u64..20_000), 0..40),
            offset_hours in -12i32..=14,
        ) {
            let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap();
            let samples: Vec<StepSample> = entries
                .iter()
                .enumerate()
                .map(|(i, (day, hour, count))| {
                    sample(&format!("s{i}"), utc(1 + day, *hour, 0), *count)
                })
                .collect();

            let forward = aggregate_steps(&samples, offset);
            let mut reversed_input = samples.clone();
            reversed_input.reverse();
            let backward = aggregate_steps(&reversed_input, offset);
            prop_assert_eq!(&forward, &backward);

            let total: u64 = samples.iter().map(|s| s.count).sum();
            prop_assert_eq!(forward.iter().map(|d| d.count).sum::<u64>(), total);
            prop_assert!(forward.windows(2).all(|w| w[0].date > w[1].date));
        }
    }
}
