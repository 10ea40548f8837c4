//! Contracts consumed from the ticket system.
//!
//! The scheduling core does not own tickets, workers, or permissions; it
//! reaches them through these narrow traits. [`BacklogProvider`] bundles
//! them into the single collaborator handle the Scheduler holds, and
//! [`LocalBacklog`] is the in-memory implementation used in development
//! and tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::api::{CategoryId, TicketId, WorkerId};
use crate::db::repository::{RepositoryError, RepositoryResult};
use crate::models::BacklogTicket;

/// Closed/assigned counters for one worker over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub tickets_closed: u32,
    pub tickets_assigned: u32,
    /// Days actually observed inside the window
    pub days_observed: u32,
}

/// Unscheduled tickets and their resolution estimates.
#[async_trait]
pub trait TicketBacklog: Send + Sync {
    /// Unscheduled tickets this worker could take, optionally narrowed
    /// to the given categories. Order is not guaranteed; the planner
    /// sorts deterministically on its own.
    async fn eligible_tickets(
        &self,
        worker_id: WorkerId,
        categories: Option<&[CategoryId]>,
    ) -> RepositoryResult<Vec<BacklogTicket>>;

    /// Estimated resolution minutes for one ticket, None when unknown.
    /// Answers for scheduled tickets too, not just backlog members.
    async fn estimated_minutes(&self, ticket_id: TicketId) -> RepositoryResult<Option<i64>>;
}

/// Worker identity checks.
#[async_trait]
pub trait WorkerDirectory: Send + Sync {
    async fn worker_exists(&self, worker_id: WorkerId) -> RepositoryResult<bool>;
}

/// Which ticket categories a worker may handle.
#[async_trait]
pub trait CategoryAuthorization: Send + Sync {
    async fn authorized_category_ids(
        &self,
        worker_id: WorkerId,
    ) -> RepositoryResult<HashSet<CategoryId>>;
}

/// Historical throughput counters for the workload predictor.
#[async_trait]
pub trait TicketHistory: Send + Sync {
    /// Counters over the trailing window, None when the worker has no
    /// recorded history.
    async fn worker_stats(
        &self,
        worker_id: WorkerId,
        trailing_days: u32,
    ) -> RepositoryResult<Option<WorkerStats>>;
}

/// Everything the Scheduler consumes from the ticket system, in one bound.
///
/// Automatically implemented for any type that implements the four
/// consumed contracts.
pub trait BacklogProvider:
    TicketBacklog + WorkerDirectory + CategoryAuthorization + TicketHistory
{
}

// Blanket implementation: the four contracts together make a provider
impl<T> BacklogProvider for T where
    T: TicketBacklog + WorkerDirectory + CategoryAuthorization + TicketHistory
{
}

/// In-memory backlog provider for development and tests.
///
/// Cloning is cheap and clones share state. Seed it with workers,
/// authorizations, tickets, and history, then hand it to the Scheduler.
#[derive(Clone)]
pub struct LocalBacklog {
    data: Arc<RwLock<BacklogData>>,
}

#[derive(Default)]
struct BacklogData {
    workers: HashSet<WorkerId>,
    authorized: HashMap<WorkerId, HashSet<CategoryId>>,
    tickets: Vec<BacklogTicket>,
    estimates: HashMap<TicketId, i64>,
    stats: HashMap<WorkerId, WorkerStats>,

    // Simulated outage for failure-path tests
    is_reachable: bool,
}

impl LocalBacklog {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BacklogData {
                is_reachable: true,
                ..Default::default()
            })),
        }
    }

    /// Register a worker id as known.
    pub fn insert_worker(&self, worker_id: WorkerId) {
        self.data.write().workers.insert(worker_id);
    }

    /// Grant a worker one more category.
    pub fn authorize(&self, worker_id: WorkerId, category_id: CategoryId) {
        self.data
            .write()
            .authorized
            .entry(worker_id)
            .or_default()
            .insert(category_id);
    }

    /// Add a ticket to the backlog, recording its estimate.
    pub fn push_ticket(&self, ticket: BacklogTicket) {
        let mut data = self.data.write();
        data.estimates
            .insert(ticket.ticket_id, ticket.estimated_minutes);
        data.tickets.push(ticket);
    }

    /// Record an estimate for a ticket that is not (or no longer) in the
    /// backlog, e.g. one already scheduled.
    pub fn set_estimate(&self, ticket_id: TicketId, minutes: i64) {
        self.data.write().estimates.insert(ticket_id, minutes);
    }

    /// Drop a ticket from the backlog (it was scheduled or closed).
    /// Its estimate stays known.
    pub fn remove_ticket(&self, ticket_id: TicketId) -> bool {
        let mut data = self.data.write();
        let before = data.tickets.len();
        data.tickets.retain(|t| t.ticket_id != ticket_id);
        data.tickets.len() < before
    }

    /// Record history counters for a worker.
    pub fn record_stats(&self, worker_id: WorkerId, stats: WorkerStats) {
        self.data.write().stats.insert(worker_id, stats);
    }

    /// Simulate the ticket system being unreachable.
    pub fn set_reachable(&self, reachable: bool) {
        self.data.write().is_reachable = reachable;
    }

    pub fn ticket_count(&self) -> usize {
        self.data.read().tickets.len()
    }

    fn check_reachable(&self) -> RepositoryResult<()> {
        if !self.data.read().is_reachable {
            return Err(RepositoryError::connection("ticket system unreachable"));
        }
        Ok(())
    }
}

impl Default for LocalBacklog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketBacklog for LocalBacklog {
    async fn eligible_tickets(
        &self,
        _worker_id: WorkerId,
        categories: Option<&[CategoryId]>,
    ) -> RepositoryResult<Vec<BacklogTicket>> {
        self.check_reachable()?;
        let data = self.data.read();
        Ok(data
            .tickets
            .iter()
            .filter(|t| categories.map_or(true, |cats| cats.contains(&t.category_id)))
            .cloned()
            .collect())
    }

    async fn estimated_minutes(&self, ticket_id: TicketId) -> RepositoryResult<Option<i64>> {
        self.check_reachable()?;
        Ok(self.data.read().estimates.get(&ticket_id).copied())
    }
}

#[async_trait]
impl WorkerDirectory for LocalBacklog {
    async fn worker_exists(&self, worker_id: WorkerId) -> RepositoryResult<bool> {
        self.check_reachable()?;
        Ok(self.data.read().workers.contains(&worker_id))
    }
}

#[async_trait]
impl CategoryAuthorization for LocalBacklog {
    async fn authorized_category_ids(
        &self,
        worker_id: WorkerId,
    ) -> RepositoryResult<HashSet<CategoryId>> {
        self.check_reachable()?;
        Ok(self
            .data
            .read()
            .authorized
            .get(&worker_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl TicketHistory for LocalBacklog {
    async fn worker_stats(
        &self,
        worker_id: WorkerId,
        _trailing_days: u32,
    ) -> RepositoryResult<Option<WorkerStats>> {
        self.check_reachable()?;
        Ok(self.data.read().stats.get(&worker_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ticket(id: i64, category: i64, minutes: i64) -> BacklogTicket {
        BacklogTicket::new(
            TicketId(id),
            CategoryId(category),
            minutes,
            Utc::now(),
            None,
        )
    }

    #[tokio::test]
    async fn test_eligible_tickets_filters_by_category() {
        let backlog = LocalBacklog::new();
        backlog.push_ticket(ticket(1, 10, 60));
        backlog.push_ticket(ticket(2, 20, 90));

        let all = backlog.eligible_tickets(WorkerId(1), None).await.unwrap();
        assert_eq!(all.len(), 2);

        let narrowed = backlog
            .eligible_tickets(WorkerId(1), Some(&[CategoryId(20)]))
            .await
            .unwrap();
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].ticket_id, TicketId(2));

        let none = backlog
            .eligible_tickets(WorkerId(1), Some(&[]))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_estimate_survives_ticket_removal() {
        let backlog = LocalBacklog::new();
        backlog.push_ticket(ticket(1, 10, 60));

        assert!(backlog.remove_ticket(TicketId(1)));
        assert!(!backlog.remove_ticket(TicketId(1)));
        assert_eq!(backlog.ticket_count(), 0);
        assert_eq!(
            backlog.estimated_minutes(TicketId(1)).await.unwrap(),
            Some(60)
        );
    }

    #[tokio::test]
    async fn test_worker_directory_and_authorization() {
        let backlog = LocalBacklog::new();
        backlog.insert_worker(WorkerId(5));
        backlog.authorize(WorkerId(5), CategoryId(10));

        assert!(backlog.worker_exists(WorkerId(5)).await.unwrap());
        assert!(!backlog.worker_exists(WorkerId(6)).await.unwrap());

        let cats = backlog.authorized_category_ids(WorkerId(5)).await.unwrap();
        assert!(cats.contains(&CategoryId(10)));
        assert!(backlog
            .authorized_category_ids(WorkerId(6))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backlog_fails() {
        let backlog = LocalBacklog::new();
        backlog.set_reachable(false);

        let err = backlog.eligible_tickets(WorkerId(1), None).await;
        assert!(matches!(err, Err(RepositoryError::ConnectionError { .. })));

        backlog.set_reachable(true);
        assert!(backlog.eligible_tickets(WorkerId(1), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_worker_stats_lookup() {
        let backlog = LocalBacklog::new();
        backlog.record_stats(
            WorkerId(1),
            WorkerStats {
                tickets_closed: 12,
                tickets_assigned: 15,
                days_observed: 5,
            },
        );

        let stats = backlog.worker_stats(WorkerId(1), 30).await.unwrap();
        assert_eq!(stats.unwrap().tickets_closed, 12);
        assert!(backlog.worker_stats(WorkerId(2), 30).await.unwrap().is_none());
    }
}
