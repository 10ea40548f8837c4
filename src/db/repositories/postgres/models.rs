//! Diesel row types for the scheduling tables.
//!
//! These mirror the column layout in `schema.rs` and convert to and from
//! the domain entities at the repository boundary, so Diesel types never
//! leak past this module.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use crate::api::{AssignmentId, SlotId, TicketId, WorkerId};
use crate::db::repository::{RepositoryError, RepositoryResult};
use crate::models::{AvailabilitySlot, ScheduleAssignment};

use super::schema::{availability_slots, schedule_assignments};

/// Map a domain priority onto the INTEGER column, rejecting values the
/// column cannot hold instead of letting the cast wrap negative.
pub fn db_priority(priority: Option<u32>) -> RepositoryResult<Option<i32>> {
    priority
        .map(|p| {
            i32::try_from(p).map_err(|_| {
                RepositoryError::invalid_range(format!(
                    "priority {} exceeds the storable maximum {}",
                    p,
                    i32::MAX
                ))
            })
        })
        .transpose()
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = availability_slots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SlotRow {
    pub id: i64,
    pub worker_id: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = availability_slots)]
pub struct NewSlotRow {
    pub worker_id: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl NewSlotRow {
    pub fn from_slot(slot: &AvailabilitySlot) -> Self {
        Self {
            worker_id: slot.worker_id.value(),
            start_at: slot.start,
            end_at: slot.end,
            created_at: slot.created_at,
            updated_at: slot.updated_at,
        }
    }
}

impl From<SlotRow> for AvailabilitySlot {
    fn from(row: SlotRow) -> Self {
        AvailabilitySlot {
            id: Some(SlotId(row.id)),
            worker_id: WorkerId(row.worker_id),
            start: row.start_at,
            end: row.end_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schedule_assignments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AssignmentRow {
    pub id: i64,
    pub worker_id: i64,
    pub ticket_id: i64,
    pub scheduled_date: NaiveDate,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Option<i64>,
    pub auto_assigned: bool,
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schedule_assignments)]
pub struct NewAssignmentRow {
    pub worker_id: i64,
    pub ticket_id: i64,
    pub scheduled_date: NaiveDate,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Option<i64>,
    pub auto_assigned: bool,
    pub priority: Option<i32>,
}

impl NewAssignmentRow {
    pub fn from_assignment(assignment: &ScheduleAssignment) -> RepositoryResult<Self> {
        Ok(Self {
            worker_id: assignment.worker_id.value(),
            ticket_id: assignment.ticket_id.value(),
            scheduled_date: assignment.scheduled_date,
            assigned_at: assignment.assigned_at,
            assigned_by: assignment.assigned_by.map(|w| w.value()),
            auto_assigned: assignment.auto_assigned,
            priority: db_priority(assignment.priority)?,
        })
    }
}

impl From<AssignmentRow> for ScheduleAssignment {
    fn from(row: AssignmentRow) -> Self {
        ScheduleAssignment {
            id: Some(AssignmentId(row.id)),
            worker_id: WorkerId(row.worker_id),
            ticket_id: TicketId(row.ticket_id),
            scheduled_date: row.scheduled_date,
            assigned_at: row.assigned_at,
            assigned_by: row.assigned_by.map(WorkerId),
            auto_assigned: row.auto_assigned,
            // Rows written by this crate never hold a negative priority;
            // anything out of range reads back as unprioritized.
            priority: row.priority.and_then(|p| u32::try_from(p).ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_priority_passes_storable_values() {
        assert_eq!(db_priority(None).unwrap(), None);
        assert_eq!(db_priority(Some(0)).unwrap(), Some(0));
        assert_eq!(db_priority(Some(i32::MAX as u32)).unwrap(), Some(i32::MAX));
    }

    #[test]
    fn test_db_priority_rejects_values_beyond_the_column() {
        let err = db_priority(Some(u32::MAX)).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidRange { .. }));
    }
}
