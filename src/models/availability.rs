use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{SlotId, WorkerId};
use crate::db::repository::error::{RepositoryError, RepositoryResult};

/// One contiguous window of time a worker can work.
///
/// A slot never crosses midnight: start and end fall on the same calendar
/// day. Slots for the same worker and day must not overlap, which is
/// enforced by the repositories on save rather than by the entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilitySlot {
    /// Database ID (None until persisted)
    #[serde(default)]
    pub id: Option<SlotId>,
    pub worker_id: WorkerId,
    /// Window start (UTC)
    pub start: DateTime<Utc>,
    /// Window end (UTC, same calendar day as start)
    pub end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AvailabilitySlot {
    /// Create a new unsaved slot, validating the window.
    pub fn new(
        worker_id: WorkerId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Self> {
        validate_window(start, end)?;
        Ok(Self {
            id: None,
            worker_id,
            start,
            end,
            created_at: Utc::now(),
            updated_at: None,
        })
    }

    /// Calendar day this slot belongs to.
    pub fn day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Whole minutes between start and end, floored, never negative.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().max(0)
    }

    /// Check if this window intersects another in time.
    ///
    /// Windows that merely touch (one ends exactly where the other
    /// starts) do not overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Replace the window, revalidating and touching `updated_at`.
    pub fn update_window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        validate_window(start, end)?;
        self.start = start;
        self.end = end;
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Re-check the window invariants on an already-built slot.
    ///
    /// The repositories call this on save so that slots whose fields were
    /// mutated directly cannot bypass validation.
    pub fn validate(&self) -> RepositoryResult<()> {
        validate_window(self.start, self.end)
    }
}

pub(crate) fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> RepositoryResult<()> {
    if end < start {
        return Err(RepositoryError::invalid_window(
            start,
            end,
            "window end precedes start",
        ));
    }
    if start.date_naive() != end.date_naive() {
        return Err(RepositoryError::invalid_window(
            start,
            end,
            "window crosses midnight",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, day, hour, min, 0).unwrap()
    }

    #[test]
    fn test_new_slot_valid_window() {
        let slot = AvailabilitySlot::new(WorkerId(1), dt(7, 9, 0), dt(7, 17, 0)).unwrap();
        assert_eq!(slot.id, None);
        assert_eq!(slot.duration_minutes(), 480);
        assert_eq!(slot.day(), NaiveDate::from_ymd_opt(2026, 9, 7).unwrap());
        assert!(slot.updated_at.is_none());
    }

    #[test]
    fn test_new_slot_inverted_window() {
        let err = AvailabilitySlot::new(WorkerId(1), dt(7, 17, 0), dt(7, 9, 0)).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidRange { .. }));
    }

    #[test]
    fn test_new_slot_crossing_midnight() {
        let err = AvailabilitySlot::new(WorkerId(1), dt(7, 22, 0), dt(8, 2, 0)).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidRange { .. }));
    }

    #[test]
    fn test_zero_length_window_is_valid() {
        let slot = AvailabilitySlot::new(WorkerId(1), dt(7, 9, 0), dt(7, 9, 0)).unwrap();
        assert_eq!(slot.duration_minutes(), 0);
    }

    #[test]
    fn test_duration_floors_partial_minutes() {
        let start = dt(7, 9, 0);
        let end = start + chrono::Duration::seconds(150);
        let slot = AvailabilitySlot::new(WorkerId(1), start, end).unwrap();
        assert_eq!(slot.duration_minutes(), 2);
    }

    #[test]
    fn test_overlap_detection() {
        let a = AvailabilitySlot::new(WorkerId(1), dt(7, 9, 0), dt(7, 12, 0)).unwrap();
        let b = AvailabilitySlot::new(WorkerId(1), dt(7, 11, 0), dt(7, 14, 0)).unwrap();
        let c = AvailabilitySlot::new(WorkerId(1), dt(7, 12, 0), dt(7, 15, 0)).unwrap();

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        // Touching endpoints are not an overlap
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_update_window_touches_updated_at() {
        let mut slot = AvailabilitySlot::new(WorkerId(1), dt(7, 9, 0), dt(7, 12, 0)).unwrap();
        slot.update_window(dt(7, 10, 0), dt(7, 13, 0)).unwrap();
        assert_eq!(slot.start, dt(7, 10, 0));
        assert!(slot.updated_at.is_some());
    }

    #[test]
    fn test_update_window_rejects_bad_range() {
        let mut slot = AvailabilitySlot::new(WorkerId(1), dt(7, 9, 0), dt(7, 12, 0)).unwrap();
        let err = slot.update_window(dt(7, 13, 0), dt(7, 11, 0)).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidRange { .. }));
        // Failed update leaves the slot untouched
        assert_eq!(slot.start, dt(7, 9, 0));
        assert!(slot.updated_at.is_none());
    }
}
