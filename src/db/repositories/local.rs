//! In-memory local repository implementation.
//!
//! This module provides a local implementation of both store traits,
//! suitable for unit testing and local development. All data lives in
//! memory behind one lock, giving fast, deterministic, isolated runs.
//! Every invariant the production backend enforces (window validity,
//! slot non-overlap, triple uniqueness, past-date rejection) is
//! enforced here too, so tests exercise the real contract.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;

use crate::api::{AssignmentId, SlotId, TicketId, WorkerId};
use crate::db::repository::{
    validate_replacement_batch, AvailabilityRepository, RepositoryError, RepositoryResult,
    ScheduleRepository,
};
use crate::models::{AvailabilitySlot, ScheduleAssignment};

/// In-memory storage backend.
///
/// Cloning is cheap and clones share state, mirroring how a pooled
/// database backend behaves.
///
/// # Example
/// ```ignore
/// let repo = LocalRepository::new();
/// let slot = AvailabilitySlot::new(WorkerId(1), start, end)?;
/// let stored = repo.save_slot(&slot).await?;
/// assert!(stored.id.is_some());
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    slots: HashMap<SlotId, AvailabilitySlot>,
    assignments: HashMap<AssignmentId, ScheduleAssignment>,

    // ID counters
    next_slot_id: i64,
    next_assignment_id: i64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            assignments: HashMap::new(),
            next_slot_id: 1,
            next_assignment_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Clear all data, keeping the health flag.
    pub fn clear(&self) {
        let mut data = self.data.write();
        *data = LocalData {
            is_healthy: data.is_healthy,
            ..Default::default()
        };
    }

    /// Number of stored availability slots.
    pub fn slot_count(&self) -> usize {
        self.data.read().slots.len()
    }

    /// Number of stored assignments.
    pub fn assignment_count(&self) -> usize {
        self.data.read().assignments.len()
    }

    /// Helper to check health and return an error if unhealthy.
    fn check_health(&self) -> RepositoryResult<()> {
        if !self.data.read().is_healthy {
            return Err(RepositoryError::connection("storage is not healthy"));
        }
        Ok(())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl LocalData {
    fn overlap_for(
        &self,
        candidate: &AvailabilitySlot,
        exclude: Option<SlotId>,
    ) -> Option<AvailabilitySlot> {
        self.slots
            .values()
            .filter(|s| s.worker_id == candidate.worker_id && s.day() == candidate.day())
            .filter(|s| exclude.map_or(true, |id| s.id != Some(id)))
            .find(|s| s.overlaps(candidate))
            .cloned()
    }

    fn triple_taken(
        &self,
        worker_id: WorkerId,
        ticket_id: TicketId,
        date: NaiveDate,
        exclude: Option<AssignmentId>,
    ) -> bool {
        self.assignments
            .values()
            .filter(|a| exclude.map_or(true, |id| a.id != Some(id)))
            .any(|a| {
                a.worker_id == worker_id && a.ticket_id == ticket_id && a.scheduled_date == date
            })
    }

    fn insert_slot(&mut self, slot: &AvailabilitySlot) -> AvailabilitySlot {
        let id = SlotId(self.next_slot_id);
        self.next_slot_id += 1;
        let mut stored = slot.clone();
        stored.id = Some(id);
        self.slots.insert(id, stored.clone());
        stored
    }

    fn insert_assignment(&mut self, assignment: &ScheduleAssignment) -> ScheduleAssignment {
        let id = AssignmentId(self.next_assignment_id);
        self.next_assignment_id += 1;
        let mut stored = assignment.clone();
        stored.id = Some(id);
        self.assignments.insert(id, stored.clone());
        stored
    }

    /// Reject an unsaved assignment that breaks the store invariants.
    fn validate_new_assignment(
        &self,
        assignment: &ScheduleAssignment,
        batch_seen: &HashSet<(WorkerId, TicketId, NaiveDate)>,
    ) -> RepositoryResult<()> {
        if assignment.scheduled_date < today() {
            return Err(RepositoryError::past_date(assignment.scheduled_date, today()));
        }
        let triple = (
            assignment.worker_id,
            assignment.ticket_id,
            assignment.scheduled_date,
        );
        if batch_seen.contains(&triple)
            || self.triple_taken(
                assignment.worker_id,
                assignment.ticket_id,
                assignment.scheduled_date,
                None,
            )
        {
            return Err(RepositoryError::duplicate_assignment(
                assignment.worker_id,
                assignment.ticket_id,
                assignment.scheduled_date,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AvailabilityRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn find_for_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<AvailabilitySlot>> {
        self.check_health()?;
        let data = self.data.read();
        let mut slots: Vec<AvailabilitySlot> = data
            .slots
            .values()
            .filter(|s| s.worker_id == worker_id && s.day() == date)
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.start);
        Ok(slots)
    }

    async fn find_for_period(
        &self,
        worker_id: WorkerId,
        start_day: NaiveDate,
        end_day: NaiveDate,
    ) -> RepositoryResult<Vec<AvailabilitySlot>> {
        self.check_health()?;
        if end_day < start_day {
            return Err(RepositoryError::invalid_period(start_day, end_day));
        }
        let data = self.data.read();
        let mut slots: Vec<AvailabilitySlot> = data
            .slots
            .values()
            .filter(|s| s.worker_id == worker_id && s.day() >= start_day && s.day() <= end_day)
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.start);
        Ok(slots)
    }

    async fn save_slot(&self, slot: &AvailabilitySlot) -> RepositoryResult<AvailabilitySlot> {
        self.check_health()?;
        slot.validate()?;
        let mut data = self.data.write();

        if let Some(existing) = data.overlap_for(slot, slot.id) {
            return Err(RepositoryError::overlap(
                slot.worker_id,
                slot.day(),
                (slot.start, slot.end),
                (existing.start, existing.end),
            ));
        }

        match slot.id {
            None => Ok(data.insert_slot(slot)),
            Some(id) => {
                if !data.slots.contains_key(&id) {
                    return Err(RepositoryError::not_found(format!(
                        "Availability slot {} not found",
                        id
                    )));
                }
                data.slots.insert(id, slot.clone());
                Ok(slot.clone())
            }
        }
    }

    async fn remove_slot(&self, slot_id: SlotId) -> RepositoryResult<()> {
        self.check_health()?;
        let mut data = self.data.write();
        if data.slots.remove(&slot_id).is_none() {
            return Err(RepositoryError::not_found(format!(
                "Availability slot {} not found",
                slot_id
            )));
        }
        Ok(())
    }

    async fn remove_all_for_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<usize> {
        self.check_health()?;
        let mut data = self.data.write();
        let before = data.slots.len();
        data.slots
            .retain(|_, s| !(s.worker_id == worker_id && s.day() == date));
        Ok(before - data.slots.len())
    }

    async fn replace_for_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
        slots: &[AvailabilitySlot],
    ) -> RepositoryResult<Vec<AvailabilitySlot>> {
        self.check_health()?;
        validate_replacement_batch(worker_id, date, slots)?;

        // One critical section for the whole swap: the old day is only
        // dropped once every replacement is known good.
        let mut data = self.data.write();
        data.slots
            .retain(|_, s| !(s.worker_id == worker_id && s.day() == date));
        let mut stored: Vec<AvailabilitySlot> =
            slots.iter().map(|s| data.insert_slot(s)).collect();
        stored.sort_by_key(|s| s.start);
        Ok(stored)
    }
}

#[async_trait]
impl ScheduleRepository for LocalRepository {
    async fn find_by_worker_and_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        self.check_health()?;
        let data = self.data.read();
        let mut rows: Vec<ScheduleAssignment> = data
            .assignments
            .values()
            .filter(|a| a.worker_id == worker_id && a.scheduled_date == date)
            .cloned()
            .collect();
        rows.sort_by(ScheduleAssignment::day_display_order);
        Ok(rows)
    }

    async fn find_by_worker_and_period(
        &self,
        worker_id: WorkerId,
        start_day: NaiveDate,
        end_day: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        self.check_health()?;
        if end_day < start_day {
            return Err(RepositoryError::invalid_period(start_day, end_day));
        }
        let data = self.data.read();
        let mut rows: Vec<ScheduleAssignment> = data
            .assignments
            .values()
            .filter(|a| {
                a.worker_id == worker_id
                    && a.scheduled_date >= start_day
                    && a.scheduled_date <= end_day
            })
            .cloned()
            .collect();
        rows.sort_by(ScheduleAssignment::period_display_order);
        Ok(rows)
    }

    async fn find_by_ticket_and_date(
        &self,
        ticket_id: TicketId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        self.check_health()?;
        let data = self.data.read();
        let mut rows: Vec<ScheduleAssignment> = data
            .assignments
            .values()
            .filter(|a| a.ticket_id == ticket_id && a.scheduled_date == date)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.assigned_at);
        Ok(rows)
    }

    async fn find_one_by_worker_ticket_and_date(
        &self,
        worker_id: WorkerId,
        ticket_id: TicketId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<ScheduleAssignment>> {
        self.check_health()?;
        let data = self.data.read();
        Ok(data
            .assignments
            .values()
            .find(|a| {
                a.worker_id == worker_id && a.ticket_id == ticket_id && a.scheduled_date == date
            })
            .cloned())
    }

    async fn save_assignment(
        &self,
        assignment: &ScheduleAssignment,
    ) -> RepositoryResult<ScheduleAssignment> {
        self.check_health()?;
        let mut data = self.data.write();

        match assignment.id {
            None => {
                data.validate_new_assignment(assignment, &HashSet::new())?;
                Ok(data.insert_assignment(assignment))
            }
            Some(id) => {
                let stored_date = match data.assignments.get(&id) {
                    Some(stored) => stored.scheduled_date,
                    None => {
                        return Err(RepositoryError::not_found(format!(
                            "Assignment {} not found",
                            id
                        )))
                    }
                };
                // The past-date rule applies to reassignment, not to
                // provenance updates of rows that stayed in place.
                if assignment.scheduled_date != stored_date
                    && assignment.scheduled_date < today()
                {
                    return Err(RepositoryError::past_date(assignment.scheduled_date, today()));
                }
                if data.triple_taken(
                    assignment.worker_id,
                    assignment.ticket_id,
                    assignment.scheduled_date,
                    Some(id),
                ) {
                    return Err(RepositoryError::duplicate_assignment(
                        assignment.worker_id,
                        assignment.ticket_id,
                        assignment.scheduled_date,
                    ));
                }
                data.assignments.insert(id, assignment.clone());
                Ok(assignment.clone())
            }
        }
    }

    async fn save_assignments(
        &self,
        assignments: &[ScheduleAssignment],
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        self.check_health()?;
        let mut data = self.data.write();

        // Validate the whole batch before touching the map so a failure
        // leaves the store exactly as it was.
        let mut batch_seen: HashSet<(WorkerId, TicketId, NaiveDate)> = HashSet::new();
        for assignment in assignments {
            if assignment.id.is_some() {
                return Err(RepositoryError::internal(
                    "save_assignments expects unsaved assignments (id must be None)",
                ));
            }
            data.validate_new_assignment(assignment, &batch_seen)?;
            batch_seen.insert((
                assignment.worker_id,
                assignment.ticket_id,
                assignment.scheduled_date,
            ));
        }

        Ok(assignments
            .iter()
            .map(|a| data.insert_assignment(a))
            .collect())
    }

    async fn remove_assignment(&self, assignment: &ScheduleAssignment) -> RepositoryResult<()> {
        self.check_health()?;
        let mut data = self.data.write();

        let id = match assignment.id {
            Some(id) if data.assignments.contains_key(&id) => Some(id),
            Some(id) => {
                return Err(RepositoryError::not_found(format!(
                    "Assignment {} not found",
                    id
                )))
            }
            None => data
                .assignments
                .values()
                .find(|a| {
                    a.worker_id == assignment.worker_id
                        && a.ticket_id == assignment.ticket_id
                        && a.scheduled_date == assignment.scheduled_date
                })
                .and_then(|a| a.id),
        };

        match id {
            Some(id) => {
                data.assignments.remove(&id);
                Ok(())
            }
            None => Err(RepositoryError::not_found(format!(
                "No assignment of ticket {} for worker {} on {}",
                assignment.ticket_id, assignment.worker_id, assignment.scheduled_date
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Days};

    fn future_day(offset: u64) -> NaiveDate {
        Utc::now().date_naive() + Days::new(offset)
    }

    fn at(day: NaiveDate, hour: u32, min: u32) -> DateTime<Utc> {
        day.and_hms_opt(hour, min, 0).unwrap().and_utc()
    }

    fn slot(worker: i64, day: NaiveDate, from: (u32, u32), to: (u32, u32)) -> AvailabilitySlot {
        AvailabilitySlot::new(WorkerId(worker), at(day, from.0, from.1), at(day, to.0, to.1))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let repo = LocalRepository::new();
        assert!(repo.health_check().await.unwrap());

        repo.set_healthy(false);
        assert!(!repo.health_check().await.unwrap());
        let err = repo.find_for_date(WorkerId(1), future_day(1)).await;
        assert!(matches!(err, Err(RepositoryError::ConnectionError { .. })));
    }

    #[tokio::test]
    async fn test_save_slot_assigns_id() {
        let repo = LocalRepository::new();
        let day = future_day(1);

        let stored = repo.save_slot(&slot(1, day, (9, 0), (12, 0))).await.unwrap();
        assert_eq!(stored.id, Some(SlotId(1)));
        assert_eq!(repo.slot_count(), 1);
    }

    #[tokio::test]
    async fn test_save_slot_rejects_overlap() {
        let repo = LocalRepository::new();
        let day = future_day(1);

        repo.save_slot(&slot(1, day, (9, 0), (12, 0))).await.unwrap();
        let err = repo
            .save_slot(&slot(1, day, (11, 0), (14, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Overlap { .. }));
        assert_eq!(repo.slot_count(), 1);
    }

    #[tokio::test]
    async fn test_touching_slots_do_not_overlap() {
        let repo = LocalRepository::new();
        let day = future_day(1);

        repo.save_slot(&slot(1, day, (9, 0), (12, 0))).await.unwrap();
        repo.save_slot(&slot(1, day, (12, 0), (17, 0))).await.unwrap();
        assert_eq!(repo.slot_count(), 2);
    }

    #[tokio::test]
    async fn test_other_worker_may_overlap() {
        let repo = LocalRepository::new();
        let day = future_day(1);

        repo.save_slot(&slot(1, day, (9, 0), (12, 0))).await.unwrap();
        repo.save_slot(&slot(2, day, (9, 0), (12, 0))).await.unwrap();
        assert_eq!(repo.slot_count(), 2);
    }

    #[tokio::test]
    async fn test_update_slot_excludes_itself_from_overlap() {
        let repo = LocalRepository::new();
        let day = future_day(1);

        let mut stored = repo.save_slot(&slot(1, day, (9, 0), (12, 0))).await.unwrap();
        stored
            .update_window(at(day, 9, 30), at(day, 12, 30))
            .unwrap();
        let updated = repo.save_slot(&stored).await.unwrap();
        assert_eq!(updated.start, at(day, 9, 30));
        assert_eq!(repo.slot_count(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_slot_not_found() {
        let repo = LocalRepository::new();
        let day = future_day(1);
        let mut phantom = slot(1, day, (9, 0), (12, 0));
        phantom.id = Some(SlotId(99));

        let err = repo.save_slot(&phantom).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_find_for_date_sorted_by_start() {
        let repo = LocalRepository::new();
        let day = future_day(1);

        repo.save_slot(&slot(1, day, (13, 0), (17, 0))).await.unwrap();
        repo.save_slot(&slot(1, day, (9, 0), (12, 0))).await.unwrap();

        let found = repo.find_for_date(WorkerId(1), day).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].start < found[1].start);
    }

    #[tokio::test]
    async fn test_find_for_period_rejects_inverted_range() {
        let repo = LocalRepository::new();
        let err = repo
            .find_for_period(WorkerId(1), future_day(5), future_day(2))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidRange { .. }));
    }

    #[tokio::test]
    async fn test_remove_all_for_date_counts() {
        let repo = LocalRepository::new();
        let day = future_day(1);

        repo.save_slot(&slot(1, day, (9, 0), (12, 0))).await.unwrap();
        repo.save_slot(&slot(1, day, (13, 0), (17, 0))).await.unwrap();
        repo.save_slot(&slot(1, future_day(2), (9, 0), (12, 0)))
            .await
            .unwrap();

        assert_eq!(repo.remove_all_for_date(WorkerId(1), day).await.unwrap(), 2);
        assert_eq!(repo.remove_all_for_date(WorkerId(1), day).await.unwrap(), 0);
        assert_eq!(repo.slot_count(), 1);
    }

    #[tokio::test]
    async fn test_save_assignment_rejects_duplicate_triple() {
        let repo = LocalRepository::new();
        let day = future_day(1);
        let a = ScheduleAssignment::new_manual(WorkerId(1), TicketId(7), day, None, None);

        repo.save_assignment(&a).await.unwrap();
        let err = repo.save_assignment(&a).await.unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateAssignment { .. }));
        assert_eq!(repo.assignment_count(), 1);
    }

    #[tokio::test]
    async fn test_save_assignment_rejects_past_date() {
        let repo = LocalRepository::new();
        let yesterday = Utc::now().date_naive() - Days::new(1);
        let a = ScheduleAssignment::new_manual(WorkerId(1), TicketId(7), yesterday, None, None);

        let err = repo.save_assignment(&a).await.unwrap_err();
        assert!(matches!(err, RepositoryError::PastDate { .. }));
        assert_eq!(repo.assignment_count(), 0);
    }

    #[tokio::test]
    async fn test_update_without_date_change_allowed_on_old_row() {
        // Provenance flips on a row whose date has meanwhile passed
        // must still be storable; only reassignment re-checks the date.
        let repo = LocalRepository::new();
        let day = future_day(1);
        let stored = repo
            .save_assignment(&ScheduleAssignment::new_auto(
                WorkerId(1),
                TicketId(7),
                day,
                None,
            ))
            .await
            .unwrap();

        let mut updated = stored.clone();
        updated.mark_manual(WorkerId(9));
        let saved = repo.save_assignment(&updated).await.unwrap();
        assert!(!saved.auto_assigned);
        assert_eq!(saved.assigned_by, Some(WorkerId(9)));
        assert_eq!(repo.assignment_count(), 1);
    }

    #[tokio::test]
    async fn test_reassign_to_taken_triple_rejected() {
        let repo = LocalRepository::new();
        let day = future_day(1);

        repo.save_assignment(&ScheduleAssignment::new_manual(
            WorkerId(1),
            TicketId(7),
            day,
            None,
            None,
        ))
        .await
        .unwrap();
        let stored = repo
            .save_assignment(&ScheduleAssignment::new_manual(
                WorkerId(1),
                TicketId(7),
                future_day(2),
                None,
                None,
            ))
            .await
            .unwrap();

        let mut moved = stored.clone();
        moved.reassign(WorkerId(1), day, None, false);
        let err = repo.save_assignment(&moved).await.unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateAssignment { .. }));
    }

    #[tokio::test]
    async fn test_batch_save_is_atomic() {
        let repo = LocalRepository::new();
        let day = future_day(1);

        let good = ScheduleAssignment::new_auto(WorkerId(1), TicketId(1), day, None);
        let dup_in_batch = ScheduleAssignment::new_auto(WorkerId(1), TicketId(1), day, None);

        let err = repo
            .save_assignments(&[good.clone(), dup_in_batch])
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateAssignment { .. }));
        assert_eq!(repo.assignment_count(), 0);

        let stored = repo.save_assignments(&[good]).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, Some(AssignmentId(1)));
    }

    #[tokio::test]
    async fn test_remove_assignment_by_triple() {
        let repo = LocalRepository::new();
        let day = future_day(1);
        repo.save_assignment(&ScheduleAssignment::new_manual(
            WorkerId(1),
            TicketId(7),
            day,
            None,
            None,
        ))
        .await
        .unwrap();

        // Locate by triple, no id on the probe
        let probe = ScheduleAssignment::new_manual(WorkerId(1), TicketId(7), day, None, None);
        repo.remove_assignment(&probe).await.unwrap();
        assert_eq!(repo.assignment_count(), 0);

        let err = repo.remove_assignment(&probe).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_clear_keeps_health() {
        let repo = LocalRepository::new();
        repo.set_healthy(false);
        repo.clear();
        assert!(!repo.health_check().await.unwrap());
    }
}
