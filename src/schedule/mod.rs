//! Schedule domain logic
//!
//! Pure (no I/O) reconciliation of detection geometry and OCR text into
//! calendar-event drafts: geometry matching, consume-once field extraction,
//! membership inference, and slot resolution.

pub mod fields;
pub mod geometry;
pub mod members;
pub mod slots;

use chrono::{Duration, NaiveDate};

pub use fields::{FieldPool, Topic};
pub use geometry::GridLayout;
pub use members::{Member, MemberMask};
pub use slots::{SlotInput, SlotResolver, SlotSkip};

/// Anchor date for one schedule image, derived once per run from header OCR
/// and shared read-only by every box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub date: NaiveDate,
}

impl TimeBase {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }

    /// Calendar date `offset` days away from the anchor.
    pub fn day(&self, offset: i32) -> NaiveDate {
        self.date + Duration::days(offset as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timebase_day_arithmetic() {
        let base = TimeBase::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(base.day(0), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(base.day(1), NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(base.day(-1), NaiveDate::from_ymd_opt(2024, 4, 30).unwrap());
    }
}
