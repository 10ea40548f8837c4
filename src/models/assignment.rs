use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{AssignmentId, TicketId, WorkerId};

/// Human-readable priority tier derived from the numeric priority score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLabel {
    High,
    Medium,
    Low,
}

impl PriorityLabel {
    /// Derive the tier from a numeric score: >= 8 is high, <= 3 is low,
    /// anything else is medium. No score, no label.
    pub fn from_priority(priority: Option<u32>) -> Option<Self> {
        let p = priority?;
        if p >= 8 {
            Some(PriorityLabel::High)
        } else if p <= 3 {
            Some(PriorityLabel::Low)
        } else {
            Some(PriorityLabel::Medium)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLabel::High => "high",
            PriorityLabel::Medium => "medium",
            PriorityLabel::Low => "low",
        }
    }
}

/// One ticket placed on one worker's calendar for one day.
///
/// The (worker, ticket, date) triple is unique; the Schedule Store owns
/// that constraint. Day granularity is carried by `NaiveDate` itself, so
/// there is no time-of-day component to truncate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleAssignment {
    /// Database ID (None until persisted)
    #[serde(default)]
    pub id: Option<AssignmentId>,
    pub worker_id: WorkerId,
    pub ticket_id: TicketId,
    pub scheduled_date: NaiveDate,
    pub assigned_at: DateTime<Utc>,
    /// Worker who performed the assignment; None when auto-assigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<WorkerId>,
    pub auto_assigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl ScheduleAssignment {
    /// New manual assignment, stamped now.
    pub fn new_manual(
        worker_id: WorkerId,
        ticket_id: TicketId,
        scheduled_date: NaiveDate,
        assigned_by: Option<WorkerId>,
        priority: Option<u32>,
    ) -> Self {
        Self {
            id: None,
            worker_id,
            ticket_id,
            scheduled_date,
            assigned_at: Utc::now(),
            assigned_by,
            auto_assigned: false,
            priority,
        }
    }

    /// New planner-created assignment, stamped now.
    pub fn new_auto(
        worker_id: WorkerId,
        ticket_id: TicketId,
        scheduled_date: NaiveDate,
        priority: Option<u32>,
    ) -> Self {
        Self {
            id: None,
            worker_id,
            ticket_id,
            scheduled_date,
            assigned_at: Utc::now(),
            assigned_by: None,
            auto_assigned: true,
            priority,
        }
    }

    /// Move the assignment to another worker and/or day, resetting the
    /// commitment timestamp.
    pub fn reassign(
        &mut self,
        worker_id: WorkerId,
        scheduled_date: NaiveDate,
        assigned_by: Option<WorkerId>,
        auto_assigned: bool,
    ) {
        self.worker_id = worker_id;
        self.scheduled_date = scheduled_date;
        self.assigned_by = assigned_by;
        self.auto_assigned = auto_assigned;
        self.assigned_at = Utc::now();
    }

    /// Flip provenance to auto without changing placement.
    pub fn mark_auto_assigned(&mut self) {
        self.auto_assigned = true;
        self.assigned_by = None;
    }

    /// Flip provenance to manual without changing placement.
    pub fn mark_manual(&mut self, assigned_by: WorkerId) {
        self.auto_assigned = false;
        self.assigned_by = Some(assigned_by);
    }

    pub fn priority_label(&self) -> Option<PriorityLabel> {
        PriorityLabel::from_priority(self.priority)
    }

    /// Display order within one day: priority descending (unscored last),
    /// then earliest commitment first.
    pub fn day_display_order(a: &Self, b: &Self) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.assigned_at.cmp(&b.assigned_at))
    }

    /// Display order across a period: date ascending, then the within-day
    /// order.
    pub fn period_display_order(a: &Self, b: &Self) -> Ordering {
        a.scheduled_date
            .cmp(&b.scheduled_date)
            .then_with(|| Self::day_display_order(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, day).unwrap()
    }

    #[test]
    fn test_priority_label_thresholds() {
        assert_eq!(
            PriorityLabel::from_priority(Some(8)),
            Some(PriorityLabel::High)
        );
        assert_eq!(
            PriorityLabel::from_priority(Some(10)),
            Some(PriorityLabel::High)
        );
        assert_eq!(
            PriorityLabel::from_priority(Some(3)),
            Some(PriorityLabel::Low)
        );
        assert_eq!(
            PriorityLabel::from_priority(Some(0)),
            Some(PriorityLabel::Low)
        );
        assert_eq!(
            PriorityLabel::from_priority(Some(5)),
            Some(PriorityLabel::Medium)
        );
        assert_eq!(PriorityLabel::from_priority(None), None);
    }

    #[test]
    fn test_priority_label_as_str() {
        assert_eq!(PriorityLabel::High.as_str(), "high");
        assert_eq!(PriorityLabel::Medium.as_str(), "medium");
        assert_eq!(PriorityLabel::Low.as_str(), "low");
    }

    #[test]
    fn test_new_manual_provenance() {
        let a = ScheduleAssignment::new_manual(
            WorkerId(1),
            TicketId(2),
            date(7),
            Some(WorkerId(9)),
            Some(5),
        );
        assert!(!a.auto_assigned);
        assert_eq!(a.assigned_by, Some(WorkerId(9)));
        assert_eq!(a.priority_label(), Some(PriorityLabel::Medium));
    }

    #[test]
    fn test_new_auto_provenance() {
        let a = ScheduleAssignment::new_auto(WorkerId(1), TicketId(2), date(7), None);
        assert!(a.auto_assigned);
        assert_eq!(a.assigned_by, None);
        assert_eq!(a.priority_label(), None);
    }

    #[test]
    fn test_reassign_resets_timestamp() {
        let mut a = ScheduleAssignment::new_auto(WorkerId(1), TicketId(2), date(7), None);
        let before = a.assigned_at;
        a.reassign(WorkerId(4), date(8), Some(WorkerId(9)), false);
        assert_eq!(a.worker_id, WorkerId(4));
        assert_eq!(a.scheduled_date, date(8));
        assert!(!a.auto_assigned);
        assert!(a.assigned_at >= before);
    }

    #[test]
    fn test_mark_provenance_keeps_placement() {
        let mut a = ScheduleAssignment::new_manual(
            WorkerId(1),
            TicketId(2),
            date(7),
            Some(WorkerId(9)),
            None,
        );
        let stamped = a.assigned_at;

        a.mark_auto_assigned();
        assert!(a.auto_assigned);
        assert_eq!(a.assigned_by, None);
        assert_eq!(a.assigned_at, stamped);

        a.mark_manual(WorkerId(9));
        assert!(!a.auto_assigned);
        assert_eq!(a.assigned_by, Some(WorkerId(9)));
        assert_eq!(a.scheduled_date, date(7));
    }

    #[test]
    fn test_day_display_order() {
        let mut high = ScheduleAssignment::new_auto(WorkerId(1), TicketId(1), date(7), Some(9));
        let mut low = ScheduleAssignment::new_auto(WorkerId(1), TicketId(2), date(7), Some(2));
        let mut unscored = ScheduleAssignment::new_auto(WorkerId(1), TicketId(3), date(7), None);
        let stamp = Utc::now();
        high.assigned_at = stamp;
        low.assigned_at = stamp;
        unscored.assigned_at = stamp;

        let mut items = vec![unscored.clone(), low.clone(), high.clone()];
        items.sort_by(ScheduleAssignment::day_display_order);
        assert_eq!(items[0].ticket_id, TicketId(1));
        assert_eq!(items[1].ticket_id, TicketId(2));
        assert_eq!(items[2].ticket_id, TicketId(3));
    }

    #[test]
    fn test_day_display_order_tie_break() {
        let mut first = ScheduleAssignment::new_auto(WorkerId(1), TicketId(1), date(7), Some(5));
        let mut second = ScheduleAssignment::new_auto(WorkerId(1), TicketId(2), date(7), Some(5));
        let stamp = Utc::now();
        first.assigned_at = stamp;
        second.assigned_at = stamp + chrono::Duration::seconds(10);

        let mut items = vec![second.clone(), first.clone()];
        items.sort_by(ScheduleAssignment::day_display_order);
        // Earliest commitment wins the tie
        assert_eq!(items[0].ticket_id, TicketId(1));
    }

    #[test]
    fn test_period_display_order_groups_by_date() {
        let mut monday = ScheduleAssignment::new_auto(WorkerId(1), TicketId(1), date(7), Some(1));
        let mut tuesday = ScheduleAssignment::new_auto(WorkerId(1), TicketId(2), date(8), Some(9));
        let stamp = Utc::now();
        monday.assigned_at = stamp;
        tuesday.assigned_at = stamp;

        let mut items = vec![tuesday.clone(), monday.clone()];
        items.sort_by(ScheduleAssignment::period_display_order);
        // Date ascending beats priority
        assert_eq!(items[0].ticket_id, TicketId(1));
    }
}
