//! Schedule store trait: the allocation table.
//!
//! The store exclusively owns assignment identity and the uniqueness of
//! the (worker, ticket, date) triple. Writes are optimistic: callers
//! probe first, and the store still rejects a duplicate insert so a
//! concurrent race cannot slip a second row in.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::error::RepositoryResult;
use crate::api::{TicketId, WorkerId};
use crate::models::ScheduleAssignment;

/// Repository trait for schedule assignment operations.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    // ==================== Query Operations ====================

    /// One worker's assignments for one day, ordered by priority
    /// descending (unscored last), then assigned-at ascending: the
    /// earliest commitment wins display order on a tie.
    async fn find_by_worker_and_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>>;

    /// One worker's assignments inside the inclusive day range, ordered
    /// by date ascending, then priority descending, then assigned-at
    /// ascending.
    ///
    /// # Returns
    /// * `Err(RepositoryError::InvalidRange)` - If `end_day` precedes `start_day`
    async fn find_by_worker_and_period(
        &self,
        worker_id: WorkerId,
        start_day: NaiveDate,
        end_day: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>>;

    /// Every worker's assignment of one ticket on one day. Cross-worker
    /// duplication is permitted, so this may return several rows.
    async fn find_by_ticket_and_date(
        &self,
        ticket_id: TicketId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>>;

    /// The uniqueness probe: at most one assignment can match.
    async fn find_one_by_worker_ticket_and_date(
        &self,
        worker_id: WorkerId,
        ticket_id: TicketId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<ScheduleAssignment>>;

    // ==================== Mutation Operations ====================

    /// Persist an assignment: insert when `id` is None, update when Some.
    ///
    /// # Returns
    /// * `Ok(ScheduleAssignment)` - The stored row with its assigned id
    /// * `Err(RepositoryError::DuplicateAssignment)` - The triple already exists
    /// * `Err(RepositoryError::PastDate)` - Insert (or a date-changing update)
    ///   with a scheduled date before today
    /// * `Err(RepositoryError::NotFound)` - Update of an id that does not exist
    async fn save_assignment(
        &self,
        assignment: &ScheduleAssignment,
    ) -> RepositoryResult<ScheduleAssignment>;

    /// Persist a batch of new assignments, all or nothing.
    ///
    /// Used by auto-assignment: either the whole plan lands or the store
    /// is untouched. The batch is validated with the same rules as
    /// [`save_assignment`](Self::save_assignment).
    async fn save_assignments(
        &self,
        assignments: &[ScheduleAssignment],
    ) -> RepositoryResult<Vec<ScheduleAssignment>>;

    /// Delete an assignment (located by id when present, else by its
    /// (worker, ticket, date) triple).
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If no matching row exists
    async fn remove_assignment(&self, assignment: &ScheduleAssignment) -> RepositoryResult<()>;
}
