//! Capacity arithmetic for a single schedule day.
//!
//! Capacity is always derived, never stored: available minutes come
//! from the day's availability slots, committed minutes from the
//! estimates of the tickets already scheduled on it.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::api::TicketId;
use crate::models::{AvailabilitySlot, ScheduleAssignment};

/// Snapshot of one day's load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCapacity {
    pub date: NaiveDate,
    pub available_minutes: i64,
    pub committed_minutes: i64,
}

impl DayCapacity {
    /// Minutes still open on this day. Negative when the day is
    /// overcommitted, which manual assignment allows.
    pub fn remaining_minutes(&self) -> i64 {
        self.available_minutes - self.committed_minutes
    }
}

/// Sum of slot durations, in minutes.
pub fn available_minutes(slots: &[AvailabilitySlot]) -> i64 {
    slots.iter().map(|slot| slot.duration_minutes()).sum()
}

/// Sum of estimates for the given assignments.
///
/// A ticket with no known estimate commits zero minutes rather than
/// blocking the day.
pub fn committed_minutes(
    assignments: &[ScheduleAssignment],
    estimates: &HashMap<TicketId, i64>,
) -> i64 {
    assignments
        .iter()
        .map(|a| estimates.get(&a.ticket_id).copied().unwrap_or(0).max(0))
        .sum()
}

pub fn day_capacity(
    date: NaiveDate,
    slots: &[AvailabilitySlot],
    assignments: &[ScheduleAssignment],
    estimates: &HashMap<TicketId, i64>,
) -> DayCapacity {
    DayCapacity {
        date,
        available_minutes: available_minutes(slots),
        committed_minutes: committed_minutes(assignments, estimates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::WorkerId;
    use chrono::{Days, Utc};

    fn day() -> NaiveDate {
        Utc::now().date_naive() + Days::new(10)
    }

    fn slot(start_h: u32, end_h: u32) -> AvailabilitySlot {
        let date = day();
        AvailabilitySlot::new(
            WorkerId(1),
            date.and_hms_opt(start_h, 0, 0).unwrap().and_utc(),
            date.and_hms_opt(end_h, 0, 0).unwrap().and_utc(),
        )
        .unwrap()
    }

    fn assignment(ticket: i64) -> ScheduleAssignment {
        ScheduleAssignment::new_auto(WorkerId(1), TicketId(ticket), day(), None)
    }

    #[test]
    fn test_available_minutes_sums_slots() {
        assert_eq!(available_minutes(&[slot(9, 12), slot(13, 17)]), 420);
        assert_eq!(available_minutes(&[]), 0);
    }

    #[test]
    fn test_committed_minutes_ignores_unknown_estimates() {
        let estimates = HashMap::from([(TicketId(1), 90), (TicketId(2), 30)]);
        let assignments = vec![assignment(1), assignment(2), assignment(3)];
        assert_eq!(committed_minutes(&assignments, &estimates), 120);
    }

    #[test]
    fn test_committed_minutes_clamps_negative_estimates() {
        let estimates = HashMap::from([(TicketId(1), -45)]);
        assert_eq!(committed_minutes(&[assignment(1)], &estimates), 0);
    }

    #[test]
    fn test_remaining_minutes_can_go_negative() {
        let estimates = HashMap::from([(TicketId(1), 600)]);
        let cap = day_capacity(day(), &[slot(9, 17)], &[assignment(1)], &estimates);
        assert_eq!(cap.available_minutes, 480);
        assert_eq!(cap.committed_minutes, 600);
        assert_eq!(cap.remaining_minutes(), -120);
    }
}
