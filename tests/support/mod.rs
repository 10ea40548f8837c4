//! Shared fixtures for the scheduler integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use parking_lot::Mutex;

use deskplan::api::{CategoryId, SlotId, TicketId, WorkerId};
use deskplan::backlog::LocalBacklog;
use deskplan::db::repositories::LocalRepository;
use deskplan::db::{
    AvailabilityRepository, RepositoryError, RepositoryResult, ScheduleRepository,
};
use deskplan::events::BufferingPublisher;
use deskplan::models::{
    AvailabilitySlot, BacklogTicket, CategoryCatalog, ScheduleAssignment, TicketCategory,
};
use deskplan::scheduler::Scheduler;

/// Categories every test scheduler knows about.
pub fn catalog() -> CategoryCatalog {
    CategoryCatalog::new(vec![
        TicketCategory::new(CategoryId(1), "Billing"),
        TicketCategory::new(CategoryId(2), "Technical"),
        TicketCategory::new(CategoryId(3), "Returns"),
    ])
}

/// A scheduler wired to fresh in-memory collaborators, plus handles to
/// seed and inspect them.
pub fn build_scheduler() -> (Scheduler, LocalRepository, LocalBacklog, BufferingPublisher) {
    let repo = LocalRepository::new();
    let backlog = LocalBacklog::new();
    let publisher = BufferingPublisher::new();
    let scheduler = Scheduler::new(
        Arc::new(repo.clone()),
        Arc::new(backlog.clone()),
        Arc::new(catalog()),
        Arc::new(publisher.clone()),
    );
    (scheduler, repo, backlog, publisher)
}

/// Register a worker and authorize it for every catalog category.
pub fn seed_worker(backlog: &LocalBacklog, worker: WorkerId) {
    backlog.insert_worker(worker);
    backlog.authorize(worker, CategoryId(1));
    backlog.authorize(worker, CategoryId(2));
    backlog.authorize(worker, CategoryId(3));
}

/// Today plus `offset` days. Offset 0 is today itself.
pub fn future_day(offset: u64) -> NaiveDate {
    Utc::now().date_naive() + Days::new(offset)
}

pub fn at(day: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    day.and_hms_opt(hour, minute, 0).unwrap().and_utc()
}

/// Storage wrapper that can stall every call or fail assignment saves a
/// set number of times before delegating to the in-memory backend.
/// Drives the scheduler's time-budget and single-retry paths.
#[derive(Clone)]
pub struct FaultInjectingRepository {
    inner: LocalRepository,
    stall: Arc<Mutex<Option<StdDuration>>>,
    save_failures: Arc<AtomicUsize>,
}

impl FaultInjectingRepository {
    pub fn new(inner: LocalRepository) -> Self {
        Self {
            inner,
            stall: Arc::new(Mutex::new(None)),
            save_failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every repository call sleeps this long before touching storage.
    pub fn stall_for(&self, delay: StdDuration) {
        *self.stall.lock() = Some(delay);
    }

    /// The next `n` assignment saves fail with a retryable connection
    /// error; later saves go through.
    pub fn fail_next_saves(&self, n: usize) {
        self.save_failures.store(n, Ordering::SeqCst);
    }

    pub fn assignment_count(&self) -> usize {
        self.inner.assignment_count()
    }

    pub fn slot_count(&self) -> usize {
        self.inner.slot_count()
    }

    async fn pause(&self) {
        let delay = *self.stall.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn injected_save_failure(&self) -> Option<RepositoryError> {
        self.save_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| RepositoryError::connection("injected transient save failure"))
    }
}

#[async_trait]
impl AvailabilityRepository for FaultInjectingRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.pause().await;
        self.inner.health_check().await
    }

    async fn find_for_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<AvailabilitySlot>> {
        self.pause().await;
        self.inner.find_for_date(worker_id, date).await
    }

    async fn find_for_period(
        &self,
        worker_id: WorkerId,
        start_day: NaiveDate,
        end_day: NaiveDate,
    ) -> RepositoryResult<Vec<AvailabilitySlot>> {
        self.pause().await;
        self.inner.find_for_period(worker_id, start_day, end_day).await
    }

    async fn save_slot(&self, slot: &AvailabilitySlot) -> RepositoryResult<AvailabilitySlot> {
        self.pause().await;
        self.inner.save_slot(slot).await
    }

    async fn remove_slot(&self, slot_id: SlotId) -> RepositoryResult<()> {
        self.pause().await;
        self.inner.remove_slot(slot_id).await
    }

    async fn remove_all_for_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<usize> {
        self.pause().await;
        self.inner.remove_all_for_date(worker_id, date).await
    }

    async fn replace_for_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
        slots: &[AvailabilitySlot],
    ) -> RepositoryResult<Vec<AvailabilitySlot>> {
        self.pause().await;
        self.inner.replace_for_date(worker_id, date, slots).await
    }
}

#[async_trait]
impl ScheduleRepository for FaultInjectingRepository {
    async fn find_by_worker_and_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        self.pause().await;
        self.inner.find_by_worker_and_date(worker_id, date).await
    }

    async fn find_by_worker_and_period(
        &self,
        worker_id: WorkerId,
        start_day: NaiveDate,
        end_day: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        self.pause().await;
        self.inner
            .find_by_worker_and_period(worker_id, start_day, end_day)
            .await
    }

    async fn find_by_ticket_and_date(
        &self,
        ticket_id: TicketId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        self.pause().await;
        self.inner.find_by_ticket_and_date(ticket_id, date).await
    }

    async fn find_one_by_worker_ticket_and_date(
        &self,
        worker_id: WorkerId,
        ticket_id: TicketId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<ScheduleAssignment>> {
        self.pause().await;
        self.inner
            .find_one_by_worker_ticket_and_date(worker_id, ticket_id, date)
            .await
    }

    async fn save_assignment(
        &self,
        assignment: &ScheduleAssignment,
    ) -> RepositoryResult<ScheduleAssignment> {
        self.pause().await;
        if let Some(err) = self.injected_save_failure() {
            return Err(err);
        }
        self.inner.save_assignment(assignment).await
    }

    async fn save_assignments(
        &self,
        assignments: &[ScheduleAssignment],
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        self.pause().await;
        if let Some(err) = self.injected_save_failure() {
            return Err(err);
        }
        self.inner.save_assignments(assignments).await
    }

    async fn remove_assignment(&self, assignment: &ScheduleAssignment) -> RepositoryResult<()> {
        self.pause().await;
        self.inner.remove_assignment(assignment).await
    }
}

/// A scheduler whose store faults can be injected per test.
pub fn build_faulty_scheduler() -> (
    Scheduler,
    FaultInjectingRepository,
    LocalBacklog,
    BufferingPublisher,
) {
    let repo = FaultInjectingRepository::new(LocalRepository::new());
    let backlog = LocalBacklog::new();
    let publisher = BufferingPublisher::new();
    let scheduler = Scheduler::new(
        Arc::new(repo.clone()),
        Arc::new(backlog.clone()),
        Arc::new(catalog()),
        Arc::new(publisher.clone()),
    );
    (scheduler, repo, backlog, publisher)
}

/// Backlog ticket created `age_minutes` ago, so tests can steer the
/// age tie-break deterministically.
pub fn ticket(
    id: i64,
    category: i64,
    minutes: i64,
    age_minutes: i64,
    priority: Option<u32>,
) -> BacklogTicket {
    BacklogTicket::new(
        TicketId(id),
        CategoryId(category),
        minutes,
        Utc::now() - Duration::minutes(age_minutes),
        priority,
    )
}
