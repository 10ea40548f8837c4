//! The allocation engine.
//!
//! [`Scheduler`] orchestrates every schedule read and mutation: manual
//! assignment, removal, week auto-assignment, the week view, workload
//! predictions, and day availability replacement. It holds no
//! persistent state of its own; schedule data lives behind
//! [`FullRepository`] and the ticket system behind
//! [`BacklogProvider`].
//!
//! Mutations for one worker are serialized through a per-worker async
//! lock, so an auto-assignment run can never race a manual assignment
//! for the same worker. Operations on different workers proceed in
//! parallel.

pub mod capacity;
mod locks;
pub mod plan;

pub use capacity::{available_minutes, committed_minutes, day_capacity, DayCapacity};
pub use plan::{plan_week, PlannedAssignment};

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, Utc};
use futures::future::try_join_all;
use log::{info, warn};

use crate::api::{CategoryId, TicketId, WorkerId};
use crate::backlog::BacklogProvider;
use crate::db::repository::{FullRepository, RepositoryError, RepositoryResult};
use crate::events::{EventPublisher, ScheduleEvent};
use crate::models::{
    AvailabilitySlot, CategoryCatalog, DaySchedule, ScheduleAssignment, WeekSchedule,
    WorkloadPrediction,
};
use crate::services::prediction::{compute_prediction, TRAILING_WINDOW_DAYS};
use locks::WorkerLocks;

/// Days covered by one scheduling window.
pub const WEEK_DAYS: u64 = 7;

/// What a manual assignment produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignOutcome {
    pub assignment: ScheduleAssignment,
    /// True when the day's committed minutes exceed its available
    /// minutes with this ticket on it. Advisory: the assignment has
    /// been stored either way, because workers may take overtime.
    pub capacity_exceeded: bool,
}

/// Orchestrator for one scheduling domain.
///
/// Cheap to clone; clones share the repository, the ticket system
/// handles, and the per-worker locks.
#[derive(Clone)]
pub struct Scheduler {
    repo: Arc<dyn FullRepository>,
    backlog: Arc<dyn BacklogProvider>,
    catalog: Arc<CategoryCatalog>,
    publisher: Arc<dyn EventPublisher>,
    locks: WorkerLocks,
    time_budget: Option<Duration>,
}

impl Scheduler {
    pub fn new(
        repo: Arc<dyn FullRepository>,
        backlog: Arc<dyn BacklogProvider>,
        catalog: Arc<CategoryCatalog>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            repo,
            backlog,
            catalog,
            publisher,
            locks: WorkerLocks::new(),
            time_budget: None,
        }
    }

    /// Bound every operation, lock wait included, by `budget`.
    pub fn with_timeout(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub async fn health_check(&self) -> RepositoryResult<bool> {
        self.repo.health_check().await
    }

    // ==================== Manual Assignment ====================

    /// Assign one ticket to one worker on one day.
    ///
    /// The capacity check is advisory: an assignment that overcommits
    /// the day still lands, flagged through
    /// [`AssignOutcome::capacity_exceeded`].
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - Unknown worker
    /// * `Err(RepositoryError::PastDate)` - `date` precedes today
    /// * `Err(RepositoryError::DuplicateAssignment)` - The triple already exists
    pub async fn assign_ticket(
        &self,
        ticket_id: TicketId,
        worker_id: WorkerId,
        date: NaiveDate,
        assigned_by: Option<WorkerId>,
    ) -> RepositoryResult<AssignOutcome> {
        let lock = self.locks.for_worker(worker_id);
        self.bounded("assign_ticket", async {
            let _serial = lock.lock().await;
            self.ensure_worker(worker_id).await?;

            let today = Self::today();
            if date < today {
                return Err(
                    RepositoryError::past_date(date, today).with_operation("assign_ticket")
                );
            }
            let probe = self
                .repo
                .find_one_by_worker_ticket_and_date(worker_id, ticket_id, date)
                .await?;
            if probe.is_some() {
                return Err(RepositoryError::duplicate_assignment(
                    worker_id, ticket_id, date,
                ));
            }

            let slots = self.repo.find_for_date(worker_id, date).await?;
            let committed = self.repo.find_by_worker_and_date(worker_id, date).await?;
            let estimates = self
                .estimates_for(committed.iter().map(|a| a.ticket_id))
                .await?;
            let estimate = self
                .backlog
                .estimated_minutes(ticket_id)
                .await?
                .unwrap_or(0)
                .max(0);
            let cap = day_capacity(date, &slots, &committed, &estimates);
            let capacity_exceeded = estimate > cap.remaining_minutes();

            let assignment =
                ScheduleAssignment::new_manual(worker_id, ticket_id, date, assigned_by, None);
            let stored = self.save_with_retry(&assignment).await?;

            self.publish(ScheduleEvent::assigned(&stored)).await;
            if capacity_exceeded {
                warn!(
                    "Scheduler: worker {} is overcommitted on {} ({} min estimated vs {} remaining)",
                    worker_id,
                    date,
                    estimate,
                    cap.remaining_minutes()
                );
            }
            info!(
                "Scheduler: assigned ticket {} to worker {} on {}",
                ticket_id, worker_id, date
            );
            Ok(AssignOutcome {
                assignment: stored,
                capacity_exceeded,
            })
        })
        .await
    }

    /// Remove one assignment, located by its (worker, ticket, date)
    /// triple.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - The triple holds no assignment
    pub async fn unassign_ticket(
        &self,
        ticket_id: TicketId,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<()> {
        let lock = self.locks.for_worker(worker_id);
        self.bounded("unassign_ticket", async {
            let _serial = lock.lock().await;
            let existing = self
                .repo
                .find_one_by_worker_ticket_and_date(worker_id, ticket_id, date)
                .await?
                .ok_or_else(|| {
                    RepositoryError::not_found(format!(
                        "ticket {} is not assigned to worker {} on {}",
                        ticket_id, worker_id, date
                    ))
                    .with_operation("unassign_ticket")
                })?;
            self.repo.remove_assignment(&existing).await?;

            self.publish(ScheduleEvent::unassigned(worker_id, ticket_id, date))
                .await;
            info!(
                "Scheduler: unassigned ticket {} from worker {} on {}",
                ticket_id, worker_id, date
            );
            Ok(())
        })
        .await
    }

    // ==================== Auto-Assignment ====================

    /// Fill one worker's week from the backlog.
    ///
    /// Pulls eligible tickets (narrowed to `category_filter` when
    /// given, else to everything the worker is authorized for), plans
    /// the seven days starting at `week_start` with
    /// [`plan_week`], and commits the whole plan in one batch. Days
    /// already in the past are left alone; assignments that already
    /// exist in the window are never touched and their tickets are
    /// never replanned.
    ///
    /// Same backlog and same availability always produce the same
    /// plan.
    ///
    /// # Returns
    /// * `Ok(Vec<ScheduleAssignment>)` - The newly created assignments
    ///   (possibly empty)
    /// * `Err(RepositoryError::NotFound)` - Unknown worker, or a filter
    ///   id missing from the category catalog
    /// * `Err(RepositoryError::PastDate)` - The whole window precedes today
    pub async fn auto_assign(
        &self,
        worker_id: WorkerId,
        week_start: NaiveDate,
        category_filter: Option<&[CategoryId]>,
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        let lock = self.locks.for_worker(worker_id);
        self.bounded("auto_assign", async {
            let _serial = lock.lock().await;
            self.ensure_worker(worker_id).await?;

            let today = Self::today();
            let week_end = week_start + Days::new(WEEK_DAYS - 1);
            if week_end < today {
                return Err(
                    RepositoryError::past_date(week_end, today).with_operation("auto_assign")
                );
            }

            let categories = self.resolve_categories(worker_id, category_filter).await?;
            let candidates = self
                .backlog
                .eligible_tickets(worker_id, Some(&categories))
                .await?;

            let existing = self
                .repo
                .find_by_worker_and_period(worker_id, week_start, week_end)
                .await?;
            let slots = self
                .repo
                .find_for_period(worker_id, week_start, week_end)
                .await?;
            let estimates = self
                .estimates_for(existing.iter().map(|a| a.ticket_id))
                .await?;

            let already_assigned: HashSet<TicketId> =
                existing.iter().map(|a| a.ticket_id).collect();
            let slots_by_day = group_slots_by_day(slots);
            let existing_by_day = group_assignments_by_day(existing);

            let mut days = Vec::new();
            for offset in 0..WEEK_DAYS {
                let date = week_start + Days::new(offset);
                if date < today {
                    continue;
                }
                let day_slots = slots_by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
                let day_rows = existing_by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
                days.push(day_capacity(date, day_slots, day_rows, &estimates));
            }

            let planned = plan_week(&candidates, &already_assigned, &days);
            if planned.is_empty() {
                info!(
                    "Scheduler: nothing to auto-assign for worker {} in the week of {}",
                    worker_id, week_start
                );
                return Ok(Vec::new());
            }

            let rows: Vec<ScheduleAssignment> = planned
                .iter()
                .map(|p| ScheduleAssignment::new_auto(worker_id, p.ticket_id, p.date, p.priority))
                .collect();
            let stored = self.save_batch_with_retry(&rows).await?;

            for row in &stored {
                self.publish(ScheduleEvent::assigned(row)).await;
            }
            info!(
                "Scheduler: auto-assigned {} tickets to worker {} in the week of {}",
                stored.len(),
                worker_id,
                week_start
            );
            Ok(stored)
        })
        .await
    }

    // ==================== Week Views ====================

    /// The worker's calendar for the seven days starting at
    /// `week_start`: availability, assignments, and capacity sums per
    /// day. An unknown worker yields an empty week rather than an
    /// error.
    pub async fn get_week_schedule(
        &self,
        worker_id: WorkerId,
        week_start: NaiveDate,
    ) -> RepositoryResult<WeekSchedule> {
        self.bounded("get_week_schedule", async {
            let week_end = week_start + Days::new(WEEK_DAYS - 1);
            let slots = self
                .repo
                .find_for_period(worker_id, week_start, week_end)
                .await?;
            let assignments = self
                .repo
                .find_by_worker_and_period(worker_id, week_start, week_end)
                .await?;
            let estimates = self
                .estimates_for(assignments.iter().map(|a| a.ticket_id))
                .await?;

            let mut slots_by_day = group_slots_by_day(slots);
            let mut rows_by_day = group_assignments_by_day(assignments);

            let days = (0..WEEK_DAYS)
                .map(|offset| {
                    let date = week_start + Days::new(offset);
                    let slots = slots_by_day.remove(&date).unwrap_or_default();
                    let assignments = rows_by_day.remove(&date).unwrap_or_default();
                    let available_minutes = capacity::available_minutes(&slots);
                    let committed_minutes = capacity::committed_minutes(&assignments, &estimates);
                    DaySchedule {
                        date,
                        slots,
                        assignments,
                        available_minutes,
                        committed_minutes,
                    }
                })
                .collect();

            Ok(WeekSchedule {
                worker_id,
                week_start,
                days,
            })
        })
        .await
    }

    /// Per-day workload forecast for the seven days starting at
    /// `week_start`, from the trailing ticket history and the
    /// availability already on the calendar.
    pub async fn get_predictions(
        &self,
        worker_id: WorkerId,
        week_start: NaiveDate,
    ) -> RepositoryResult<Vec<WorkloadPrediction>> {
        self.bounded("get_predictions", async {
            let week_end = week_start + Days::new(WEEK_DAYS - 1);
            let slots = self
                .repo
                .find_for_period(worker_id, week_start, week_end)
                .await?;
            let stats = self
                .backlog
                .worker_stats(worker_id, TRAILING_WINDOW_DAYS)
                .await?;

            let slots_by_day = group_slots_by_day(slots);
            let predictions = (0..WEEK_DAYS)
                .map(|offset| {
                    let date = week_start + Days::new(offset);
                    let available = slots_by_day
                        .get(&date)
                        .map_or(0, |day| capacity::available_minutes(day));
                    compute_prediction(date, available, stats.as_ref())
                })
                .collect();
            Ok(predictions)
        })
        .await
    }

    // ==================== Availability ====================

    /// Replace the worker's availability for one day with the given
    /// windows.
    ///
    /// The swap happens through one atomic store operation: every window
    /// is validated (well-formed, on `date`, no overlap among
    /// themselves) before the old day is dropped, and a storage failure
    /// mid-swap rolls back to the stored day rather than leaving it
    /// half-replaced.
    pub async fn save_day_availability(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
        windows: &[(DateTime<Utc>, DateTime<Utc>)],
    ) -> RepositoryResult<Vec<AvailabilitySlot>> {
        let lock = self.locks.for_worker(worker_id);
        self.bounded("save_day_availability", async {
            let _serial = lock.lock().await;
            self.ensure_worker(worker_id).await?;

            let mut replacements: Vec<AvailabilitySlot> = Vec::with_capacity(windows.len());
            for &(start, end) in windows {
                replacements.push(AvailabilitySlot::new(worker_id, start, end)?);
            }
            let stored = self
                .repo
                .replace_for_date(worker_id, date, &replacements)
                .await?;
            info!(
                "Scheduler: replaced availability with {} slots for worker {} on {}",
                stored.len(),
                worker_id,
                date
            );
            Ok(stored)
        })
        .await
    }

    // ==================== Internals ====================

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    async fn ensure_worker(&self, worker_id: WorkerId) -> RepositoryResult<()> {
        if self.backlog.worker_exists(worker_id).await? {
            Ok(())
        } else {
            Err(RepositoryError::not_found(format!(
                "worker {} is not registered",
                worker_id
            )))
        }
    }

    /// Resolve the candidate category set: an explicit filter must name
    /// known categories; no filter means everything the worker is
    /// authorized for. Sorted for a deterministic downstream query.
    async fn resolve_categories(
        &self,
        worker_id: WorkerId,
        filter: Option<&[CategoryId]>,
    ) -> RepositoryResult<Vec<CategoryId>> {
        let resolved: HashSet<CategoryId> = match filter {
            Some(requested) => {
                for id in requested {
                    if !self.catalog.contains(*id) {
                        return Err(RepositoryError::not_found(format!(
                            "unknown ticket category {}",
                            id
                        ))
                        .with_operation("auto_assign"));
                    }
                }
                requested.iter().copied().collect()
            }
            None => self.backlog.authorized_category_ids(worker_id).await?,
        };
        let mut categories: Vec<CategoryId> = resolved.into_iter().collect();
        categories.sort_unstable();
        Ok(categories)
    }

    /// Estimates for a set of tickets, deduplicated, fetched
    /// concurrently. Tickets with no known estimate are absent from the
    /// map.
    async fn estimates_for(
        &self,
        tickets: impl IntoIterator<Item = TicketId>,
    ) -> RepositoryResult<HashMap<TicketId, i64>> {
        let unique: HashSet<TicketId> = tickets.into_iter().collect();
        let lookups = unique.into_iter().map(|ticket_id| async move {
            let estimate = self.backlog.estimated_minutes(ticket_id).await?;
            Ok::<_, RepositoryError>((ticket_id, estimate))
        });
        let resolved = try_join_all(lookups).await?;
        Ok(resolved
            .into_iter()
            .filter_map(|(id, estimate)| estimate.map(|minutes| (id, minutes)))
            .collect())
    }

    async fn save_with_retry(
        &self,
        assignment: &ScheduleAssignment,
    ) -> RepositoryResult<ScheduleAssignment> {
        match self.repo.save_assignment(assignment).await {
            Err(err) if err.is_retryable() => {
                warn!("Scheduler: save_assignment failed, retrying once: {}", err);
                self.repo.save_assignment(assignment).await
            }
            other => other,
        }
    }

    async fn save_batch_with_retry(
        &self,
        rows: &[ScheduleAssignment],
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        match self.repo.save_assignments(rows).await {
            Err(err) if err.is_retryable() => {
                warn!("Scheduler: save_assignments failed, retrying once: {}", err);
                self.repo.save_assignments(rows).await
            }
            other => other,
        }
    }

    /// Publish after commit. A failed publish is logged and swallowed;
    /// the schedule mutation stands.
    async fn publish(&self, event: ScheduleEvent) {
        if let Err(err) = self.publisher.publish(event).await {
            warn!(
                "Scheduler: event delivery failed (the mutation is committed): {}",
                err
            );
        }
    }

    /// Run `fut` under the configured time budget, if any.
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> RepositoryResult<T>
    where
        F: Future<Output = RepositoryResult<T>>,
    {
        match self.time_budget {
            Some(budget) => match tokio::time::timeout(budget, fut).await {
                Ok(result) => result,
                Err(_) => Err(RepositoryError::timeout(format!(
                    "operation exceeded its {} ms budget",
                    budget.as_millis()
                ))
                .with_operation(operation)),
            },
            None => fut.await,
        }
    }
}

fn group_slots_by_day(slots: Vec<AvailabilitySlot>) -> HashMap<NaiveDate, Vec<AvailabilitySlot>> {
    let mut by_day: HashMap<NaiveDate, Vec<AvailabilitySlot>> = HashMap::new();
    for slot in slots {
        by_day.entry(slot.day()).or_default().push(slot);
    }
    by_day
}

fn group_assignments_by_day(
    assignments: Vec<ScheduleAssignment>,
) -> HashMap<NaiveDate, Vec<ScheduleAssignment>> {
    let mut by_day: HashMap<NaiveDate, Vec<ScheduleAssignment>> = HashMap::new();
    for assignment in assignments {
        by_day
            .entry(assignment.scheduled_date)
            .or_default()
            .push(assignment);
    }
    by_day
}
