use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::WorkerId;
use crate::models::assignment::ScheduleAssignment;
use crate::models::availability::AvailabilitySlot;

/// One day of a worker's calendar: availability plus assignments, with
/// the capacity numbers already summed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub slots: Vec<AvailabilitySlot>,
    pub assignments: Vec<ScheduleAssignment>,
    pub available_minutes: i64,
    pub committed_minutes: i64,
}

impl DaySchedule {
    /// Capacity left on the day. Negative when overcommitted.
    pub fn remaining_minutes(&self) -> i64 {
        self.available_minutes - self.committed_minutes
    }
}

/// Seven consecutive `DaySchedule` entries starting at `week_start`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeekSchedule {
    pub worker_id: WorkerId,
    pub week_start: NaiveDate,
    pub days: Vec<DaySchedule>,
}

impl WeekSchedule {
    pub fn day(&self, date: NaiveDate) -> Option<&DaySchedule> {
        self.days.iter().find(|d| d.date == date)
    }

    pub fn total_available_minutes(&self) -> i64 {
        self.days.iter().map(|d| d.available_minutes).sum()
    }

    pub fn total_assignments(&self) -> usize {
        self.days.iter().map(|d| d.assignments.len()).sum()
    }
}
