//! Conflict checking against the remote store
//!
//! The draft's range already carries a lead-in and trailing padding, so the
//! checked window is shrunk by a fixed margin on both ends: only overlaps
//! with the substantive middle of the slot count as conflicts.

use anyhow::Result;
use chrono::Duration;
use tracing::debug;

use crate::calendar::{CalendarEventDraft, CalendarStore};

/// Conflict window policy.
#[derive(Debug, Clone, Copy)]
pub struct ConflictChecker {
    margin: Duration,
}

impl ConflictChecker {
    pub fn new(margin_min: i64) -> Self {
        Self {
            margin: Duration::minutes(margin_min),
        }
    }

    /// True when any existing event overlaps the trimmed window
    /// `[start + margin, end - margin]`. Events that merely touch a window
    /// boundary do not conflict.
    pub async fn has_conflict(
        &self,
        store: &dyn CalendarStore,
        draft: &CalendarEventDraft,
    ) -> Result<bool> {
        let win_start = draft.start + self.margin;
        let win_end = draft.end - self.margin;
        if win_start >= win_end {
            // Margin swallowed the whole slot; nothing substantive to check.
            return Ok(false);
        }

        let existing = store.list_events(win_start, win_end).await?;
        // Stores may return boundary-touching events for a range query;
        // re-filter with a strict overlap test.
        let conflicting = existing
            .iter()
            .filter(|ev| ev.start < win_end && ev.end > win_start)
            .count();
        debug!(
            "conflict check for '{}': {} existing in window, {} overlapping",
            draft.summary,
            existing.len(),
            conflicting
        );
        Ok(conflicting > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{Attendee, CalendarEvent, CalendarIdentity};
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};

    struct FixedStore {
        events: Vec<CalendarEvent>,
    }

    #[async_trait]
    impl CalendarStore for FixedStore {
        async fn list_events(
            &self,
            start: NaiveDateTime,
            end: NaiveDateTime,
        ) -> Result<Vec<CalendarEvent>> {
            // Inclusive range query, the way a remote store would answer.
            Ok(self
                .events
                .iter()
                .filter(|ev| ev.start <= end && ev.end >= start)
                .cloned()
                .collect())
        }

        async fn create_event(&self, _draft: &CalendarEventDraft) -> Result<CalendarEvent> {
            unreachable!()
        }

        async fn delete_event(&self, _event_id: &str) -> Result<()> {
            unreachable!()
        }

        async fn add_attendees(
            &self,
            _event_id: &str,
            _ids: &[CalendarIdentity],
        ) -> Result<()> {
            unreachable!()
        }

        async fn list_attendees(&self, _event_id: &str) -> Result<Vec<Attendee>> {
            unreachable!()
        }

        async fn remove_attendee(&self, _event_id: &str, _attendee_id: &str) -> Result<()> {
            unreachable!()
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn draft() -> CalendarEventDraft {
        CalendarEventDraft {
            summary: "【向晚单播】向晚直播".to_string(),
            description: String::new(),
            start: at(19, 20),
            end: at(21, 10),
            color: 0,
            attendees: vec![],
            reminder_minutes: vec![5],
        }
    }

    fn event(start: NaiveDateTime, end: NaiveDateTime) -> CalendarEvent {
        CalendarEvent {
            event_id: "evt".to_string(),
            summary: None,
            start,
            end,
        }
    }

    #[tokio::test]
    async fn test_boundary_touch_is_not_a_conflict() {
        // Trimmed window is 19:45..20:45; an event ending exactly at 19:45
        // touches but does not overlap.
        let store = FixedStore {
            events: vec![event(at(18, 0), at(19, 45))],
        };
        let checker = ConflictChecker::new(25);
        assert!(!checker.has_conflict(&store, &draft()).await.unwrap());
    }

    #[tokio::test]
    async fn test_overlapping_window_is_a_conflict() {
        let store = FixedStore {
            events: vec![event(at(18, 0), at(19, 46))],
        };
        let checker = ConflictChecker::new(25);
        assert!(checker.has_conflict(&store, &draft()).await.unwrap());
    }

    #[tokio::test]
    async fn test_event_inside_window_conflicts() {
        let store = FixedStore {
            events: vec![event(at(20, 0), at(20, 30))],
        };
        let checker = ConflictChecker::new(25);
        assert!(checker.has_conflict(&store, &draft()).await.unwrap());
    }

    #[tokio::test]
    async fn test_degenerate_window_never_conflicts() {
        let mut d = draft();
        d.end = d.start + Duration::minutes(40); // 40min slot, 50min of margin
        let store = FixedStore {
            events: vec![event(at(19, 0), at(22, 0))],
        };
        let checker = ConflictChecker::new(25);
        assert!(!checker.has_conflict(&store, &d).await.unwrap());
    }
}
