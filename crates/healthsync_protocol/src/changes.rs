//! Per-cycle change summaries and the notifications derived from them.

use std::fmt;

/// What one sync cycle changed at the backend.
///
/// Not persisted; it only drives a one-time notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncChanges {
    /// Step records added or updated.
    pub steps_updated: usize,
    /// Exercise sessions added or updated.
    pub sessions_updated: usize,
    /// Records deleted at the source.
    pub records_deleted: usize,
}

impl SyncChanges {
    /// Returns true if anything changed.
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }

    /// Total number of changed records.
    pub fn total(&self) -> usize {
        self.steps_updated + self.sessions_updated + self.records_deleted
    }

    /// The notification to show for these changes, if any.
    pub fn event(&self) -> Option<SyncEvent> {
        let categories = [
            self.steps_updated,
            self.sessions_updated,
            self.records_deleted,
        ]
        .iter()
        .filter(|n| **n > 0)
        .count();

        match categories {
            0 => None,
            1 if self.steps_updated > 0 => Some(SyncEvent::StepsUpdated(self.steps_updated)),
            1 if self.sessions_updated > 0 => {
                Some(SyncEvent::SessionsUpdated(self.sessions_updated))
            }
            1 => Some(SyncEvent::StepsDeleted(self.records_deleted)),
            _ => Some(SyncEvent::MultipleChanges(self.total())),
        }
    }
}

/// One-shot notification emitted after a sync that changed something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// Steps were added or updated.
    StepsUpdated(usize),
    /// Records were deleted.
    StepsDeleted(usize),
    /// Exercise sessions were added or updated.
    SessionsUpdated(usize),
    /// More than one kind of change.
    MultipleChanges(usize),
}

impl SyncEvent {
    /// The display message for this event.
    pub fn message(&self) -> String {
        match *self {
            SyncEvent::StepsUpdated(1) => "Steps updated".to_string(),
            SyncEvent::StepsUpdated(n) => format!("{n} step records updated"),
            SyncEvent::StepsDeleted(1) => "Steps deleted".to_string(),
            SyncEvent::StepsDeleted(n) => format!("{n} step records deleted"),
            SyncEvent::SessionsUpdated(1) => "Workout updated".to_string(),
            SyncEvent::SessionsUpdated(n) => format!("{n} workouts updated"),
            SyncEvent::MultipleChanges(n) => format!("{n} records updated"),
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_changes_no_event() {
        let changes = SyncChanges::default();
        assert!(!changes.has_changes());
        assert_eq!(changes.event(), None);
    }

    #[test]
    fn single_category_events() {
        let steps = SyncChanges {
            steps_updated: 2,
            ..Default::default()
        };
        assert_eq!(steps.event(), Some(SyncEvent::StepsUpdated(2)));

        let deleted = SyncChanges {
            records_deleted: 1,
            ..Default::default()
        };
        assert_eq!(deleted.event(), Some(SyncEvent::StepsDeleted(1)));

        let sessions = SyncChanges {
            sessions_updated: 4,
            ..Default::default()
        };
        assert_eq!(sessions.event(), Some(SyncEvent::SessionsUpdated(4)));
    }

    #[test]
    fn mixed_changes_are_multiple() {
        let changes = SyncChanges {
            steps_updated: 2,
            sessions_updated: 0,
            records_deleted: 1,
        };
        assert_eq!(changes.total(), 3);
        assert_eq!(changes.event(), Some(SyncEvent::MultipleChanges(3)));
    }

    #[test]
    fn messages() {
        assert_eq!(SyncEvent::StepsUpdated(1).message(), "Steps updated");
        assert_eq!(SyncEvent::StepsUpdated(5).message(), "5 step records updated");
        assert_eq!(SyncEvent::StepsDeleted(1).to_string(), "Steps deleted");
        assert_eq!(SyncEvent::StepsDeleted(2).message(), "2 step records deleted");
        assert_eq!(SyncEvent::MultipleChanges(3).message(), "3 records updated");
    }
}
