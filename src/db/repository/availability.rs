//! Availability store trait: when can a worker work.
//!
//! Slots are same-day windows. The store owns the no-overlap rule for a
//! worker's day; every mutation is immediately durable so capacity reads
//! by the Scheduler stay consistent.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::error::{RepositoryError, RepositoryResult};
use crate::api::{SlotId, WorkerId};
use crate::models::AvailabilitySlot;

/// Shared pre-check for [`AvailabilityRepository::replace_for_date`]
/// batches: every slot must be unsaved, well-formed, belong to the given
/// worker and day, and not overlap another slot in the batch.
pub fn validate_replacement_batch(
    worker_id: WorkerId,
    date: NaiveDate,
    slots: &[AvailabilitySlot],
) -> RepositoryResult<()> {
    for (index, slot) in slots.iter().enumerate() {
        if slot.id.is_some() {
            return Err(RepositoryError::internal(
                "replace_for_date expects unsaved slots (id must be None)",
            ));
        }
        slot.validate()?;
        if slot.worker_id != worker_id || slot.day() != date {
            return Err(RepositoryError::invalid_window(
                slot.start,
                slot.end,
                "window does not fall on the day being replaced",
            ));
        }
        if let Some(clash) = slots[..index].iter().find(|kept| kept.overlaps(slot)) {
            return Err(RepositoryError::overlap(
                worker_id,
                date,
                (slot.start, slot.end),
                (clash.start, clash.end),
            ));
        }
    }
    Ok(())
}

/// Repository trait for availability window operations.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    // ==================== Health & Connection ====================

    /// Check if the storage backend is healthy.
    ///
    /// # Returns
    /// - `Ok(true)` if the backend is healthy
    /// - `Ok(false)` if unhealthy but no error occurred
    /// - `Err(RepositoryError)` if the check itself failed
    async fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Slot Operations ====================

    /// All slots for one worker on one day, ascending by start time.
    async fn find_for_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<AvailabilitySlot>>;

    /// All slots for one worker whose day falls inside the inclusive
    /// range, ascending by start time.
    ///
    /// # Returns
    /// * `Err(RepositoryError::InvalidRange)` - If `end_day` precedes `start_day`
    async fn find_for_period(
        &self,
        worker_id: WorkerId,
        start_day: NaiveDate,
        end_day: NaiveDate,
    ) -> RepositoryResult<Vec<AvailabilitySlot>>;

    /// Persist a slot: insert when `id` is None, update when Some.
    ///
    /// The window is revalidated, and the no-overlap rule is checked
    /// against the worker's other slots on the same day (an update is
    /// checked against everything but itself).
    ///
    /// # Returns
    /// * `Ok(AvailabilitySlot)` - The stored slot with its assigned id
    /// * `Err(RepositoryError::InvalidRange)` - Inverted or midnight-crossing window
    /// * `Err(RepositoryError::Overlap)` - The window collides with a stored slot
    /// * `Err(RepositoryError::NotFound)` - Update of an id that does not exist
    async fn save_slot(&self, slot: &AvailabilitySlot) -> RepositoryResult<AvailabilitySlot>;

    /// Delete one slot by id.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the id does not exist
    async fn remove_slot(&self, slot_id: SlotId) -> RepositoryResult<()>;

    /// Delete every slot for one worker on one day.
    ///
    /// # Returns
    /// * `Ok(usize)` - How many slots were removed (0 is not an error)
    async fn remove_all_for_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<usize>;

    /// Replace the worker's slots for one day with `slots`, atomically.
    ///
    /// The whole batch is validated (well-formed, unsaved, on `date`, no
    /// overlap within the batch) before anything is touched, and the swap
    /// itself is one critical section: a failure anywhere leaves the
    /// stored day exactly as it was.
    ///
    /// # Returns
    /// * `Ok(Vec<AvailabilitySlot>)` - The stored slots with assigned ids,
    ///   ascending by start time
    /// * `Err(RepositoryError::InvalidRange)` - A window is inverted,
    ///   crosses midnight, or does not fall on `date`
    /// * `Err(RepositoryError::Overlap)` - Two replacement windows collide
    async fn replace_for_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
        slots: &[AvailabilitySlot],
    ) -> RepositoryResult<Vec<AvailabilitySlot>>;
}
