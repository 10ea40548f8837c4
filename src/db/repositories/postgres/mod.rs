//! Postgres repository implementation using Diesel.
//!
//! This module implements the store traits against a Postgres database.
//! The (worker, ticket, date) uniqueness rule is carried by a database
//! constraint, so concurrent inserts of the same triple resolve to a
//! `DuplicateAssignment` error instead of a second row.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Connection health monitoring
//! - Automatic migration execution
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DESKPLAN_DATABASE_URL` or `DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task;

use crate::api::{SlotId, TicketId, WorkerId};
use crate::db::repository::{
    validate_replacement_batch, AvailabilityRepository, ErrorContext, RepositoryError,
    RepositoryResult, ScheduleRepository,
};
use crate::models::{AvailabilitySlot, ScheduleAssignment};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `DESKPLAN_DATABASE_URL` or `DATABASE_URL`: Connection string (required)
    /// - `PG_POOL_MAX`: Maximum pool size (default: 10)
    /// - `PG_POOL_MIN`: Minimum pool size (default: 1)
    /// - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
    /// - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
    /// - `PG_MAX_RETRIES`: Maximum retry attempts (default: 3)
    /// - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DESKPLAN_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| "DESKPLAN_DATABASE_URL or DATABASE_URL must be set".to_string())?;

        let max_pool_size = std::env::var("PG_POOL_MAX")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        let min_pool_size = std::env::var("PG_POOL_MIN")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);

        let connection_timeout_sec = std::env::var("PG_CONN_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let idle_timeout_sec = std::env::var("PG_IDLE_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(600);

        let max_retries = std::env::var("PG_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        let retry_delay_ms = std::env::var("PG_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(100);

        Ok(Self {
            database_url,
            max_pool_size,
            min_pool_size,
            connection_timeout_sec,
            idle_timeout_sec,
            max_retries,
            retry_delay_ms,
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool health statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of connections currently in use
    pub connections_in_use: u32,
    /// Number of idle connections
    pub idle_connections: u32,
    /// Total number of connections in the pool
    pub total_connections: u32,
    /// Maximum pool size
    pub max_size: u32,
    /// Total successful queries executed
    pub total_queries: u64,
    /// Total failed queries
    pub failed_queries: u64,
    /// Total retried operations
    pub retried_operations: u64,
}

/// Diesel-backed repository for Postgres.
///
/// This repository implementation provides:
/// - Connection pooling with configurable limits
/// - Automatic retry for transient failures
/// - Health monitoring and statistics
/// - Automatic schema migrations
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    // Metrics counters
    total_queries: std::sync::Arc<AtomicU64>,
    failed_queries: std::sync::Arc<AtomicU64>,
    retried_operations: std::sync::Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    ///
    /// # Arguments
    /// * `config` - Database configuration
    ///
    /// # Returns
    /// * `Ok(PostgresRepository)` on success
    /// * `Err(RepositoryError)` if connection or migration fails
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true) // Validate connections before use
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        // Run migrations once during initialization
        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        Ok(Self {
            pool,
            config,
            total_queries: std::sync::Arc::new(AtomicU64::new(0)),
            failed_queries: std::sync::Arc::new(AtomicU64::new(0)),
            retried_operations: std::sync::Arc::new(AtomicU64::new(0)),
        })
    }

    /// Run pending database migrations.
    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;

        Ok(())
    }

    /// Execute a database operation with automatic retry for transient failures.
    ///
    /// This method will retry the operation up to `max_retries` times if a
    /// retryable error occurs (connection errors, timeouts, serialization failures).
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2; // Exponential backoff
                }

                // Get connection
                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1))
                                .retryable(),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                // Execute the operation
                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            failed_queries.fetch_add(1, Ordering::Relaxed);
            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    /// Get pool health statistics.
    ///
    /// Returns current pool state and query statistics for monitoring.
    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }

    /// Check if the database connection is healthy.
    ///
    /// Performs a simple query to verify connectivity.
    pub async fn is_healthy(&self) -> bool {
        self.health_check().await.unwrap_or(false)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// UTC instants bounding one calendar day: midnight inclusive to the next
/// midnight exclusive. Slots never cross midnight, so filtering `start_at`
/// against these bounds selects exactly the slots of that day.
fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = (date + Days::new(1)).and_time(NaiveTime::MIN).and_utc();
    (start, end)
}

/// Insert one unsaved assignment inside an open transaction.
///
/// No prior existence probe: the unique index on the (worker, ticket,
/// date) triple closes the probe-then-insert race, and a violation maps
/// to `DuplicateAssignment`.
fn insert_assignment_row(
    conn: &mut PgConnection,
    assignment: &ScheduleAssignment,
) -> RepositoryResult<ScheduleAssignment> {
    let row: AssignmentRow = diesel::insert_into(schedule_assignments::table)
        .values(NewAssignmentRow::from_assignment(assignment)?)
        .returning(AssignmentRow::as_returning())
        .get_result(conn)?;
    Ok(row.into())
}

#[async_trait]
impl AvailabilityRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1").execute(conn)?;
            Ok(true)
        })
        .await
    }

    async fn find_for_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<AvailabilitySlot>> {
        self.with_conn(move |conn| {
            let (day_start, day_end) = day_bounds(date);
            let rows: Vec<SlotRow> = availability_slots::table
                .filter(availability_slots::worker_id.eq(worker_id.value()))
                .filter(availability_slots::start_at.ge(day_start))
                .filter(availability_slots::start_at.lt(day_end))
                .order(availability_slots::start_at.asc())
                .load(conn)?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
        .await
    }

    async fn find_for_period(
        &self,
        worker_id: WorkerId,
        start_day: NaiveDate,
        end_day: NaiveDate,
    ) -> RepositoryResult<Vec<AvailabilitySlot>> {
        if end_day < start_day {
            return Err(RepositoryError::invalid_period(start_day, end_day));
        }
        self.with_conn(move |conn| {
            let range_start = day_bounds(start_day).0;
            let range_end = day_bounds(end_day).1;
            let rows: Vec<SlotRow> = availability_slots::table
                .filter(availability_slots::worker_id.eq(worker_id.value()))
                .filter(availability_slots::start_at.ge(range_start))
                .filter(availability_slots::start_at.lt(range_end))
                .order(availability_slots::start_at.asc())
                .load(conn)?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
        .await
    }

    async fn save_slot(&self, slot: &AvailabilitySlot) -> RepositoryResult<AvailabilitySlot> {
        slot.validate()?;
        let slot = slot.clone();
        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|tx| {
                let (day_start, day_end) = day_bounds(slot.day());
                let neighbors: Vec<AvailabilitySlot> = availability_slots::table
                    .filter(availability_slots::worker_id.eq(slot.worker_id.value()))
                    .filter(availability_slots::start_at.ge(day_start))
                    .filter(availability_slots::start_at.lt(day_end))
                    .load::<SlotRow>(tx)?
                    .into_iter()
                    .map(Into::into)
                    .collect();

                for stored in &neighbors {
                    // An update is checked against everything but itself.
                    if stored.id == slot.id {
                        continue;
                    }
                    if stored.overlaps(&slot) {
                        return Err(RepositoryError::overlap(
                            slot.worker_id,
                            slot.day(),
                            (slot.start, slot.end),
                            (stored.start, stored.end),
                        ));
                    }
                }

                match slot.id {
                    None => {
                        let row: SlotRow = diesel::insert_into(availability_slots::table)
                            .values(NewSlotRow::from_slot(&slot))
                            .returning(SlotRow::as_returning())
                            .get_result(tx)?;
                        Ok(row.into())
                    }
                    Some(id) => {
                        let updated: SlotRow =
                            diesel::update(availability_slots::table.find(id.value()))
                                .set((
                                    availability_slots::worker_id.eq(slot.worker_id.value()),
                                    availability_slots::start_at.eq(slot.start),
                                    availability_slots::end_at.eq(slot.end),
                                    availability_slots::created_at.eq(slot.created_at),
                                    availability_slots::updated_at.eq(slot.updated_at),
                                ))
                                .returning(SlotRow::as_returning())
                                .get_result(tx)
                                .optional()?
                                .ok_or_else(|| {
                                    RepositoryError::not_found(format!(
                                        "Availability slot {} not found",
                                        id
                                    ))
                                })?;
                        Ok(updated.into())
                    }
                }
            })
        })
        .await
    }

    async fn remove_slot(&self, slot_id: SlotId) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            let deleted =
                diesel::delete(availability_slots::table.find(slot_id.value())).execute(conn)?;
            if deleted == 0 {
                return Err(RepositoryError::not_found(format!(
                    "Availability slot {} not found",
                    slot_id
                )));
            }
            Ok(())
        })
        .await
    }

    async fn remove_all_for_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<usize> {
        self.with_conn(move |conn| {
            let (day_start, day_end) = day_bounds(date);
            let deleted = diesel::delete(
                availability_slots::table
                    .filter(availability_slots::worker_id.eq(worker_id.value()))
                    .filter(availability_slots::start_at.ge(day_start))
                    .filter(availability_slots::start_at.lt(day_end)),
            )
            .execute(conn)?;
            Ok(deleted)
        })
        .await
    }

    async fn replace_for_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
        slots: &[AvailabilitySlot],
    ) -> RepositoryResult<Vec<AvailabilitySlot>> {
        validate_replacement_batch(worker_id, date, slots)?;
        let slots = slots.to_vec();
        self.with_conn(move |conn| {
            // Delete and re-insert under one transaction so a failure
            // mid-swap rolls the old day back instead of losing it.
            conn.transaction::<_, RepositoryError, _>(|tx| {
                let (day_start, day_end) = day_bounds(date);
                diesel::delete(
                    availability_slots::table
                        .filter(availability_slots::worker_id.eq(worker_id.value()))
                        .filter(availability_slots::start_at.ge(day_start))
                        .filter(availability_slots::start_at.lt(day_end)),
                )
                .execute(tx)?;

                let mut stored: Vec<AvailabilitySlot> = Vec::with_capacity(slots.len());
                for slot in &slots {
                    let row: SlotRow = diesel::insert_into(availability_slots::table)
                        .values(NewSlotRow::from_slot(slot))
                        .returning(SlotRow::as_returning())
                        .get_result(tx)?;
                    stored.push(row.into());
                }
                stored.sort_by_key(|s| s.start);
                Ok(stored)
            })
        })
        .await
    }
}

#[async_trait]
impl ScheduleRepository for PostgresRepository {
    async fn find_by_worker_and_date(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        self.with_conn(move |conn| {
            let rows: Vec<AssignmentRow> = schedule_assignments::table
                .filter(schedule_assignments::worker_id.eq(worker_id.value()))
                .filter(schedule_assignments::scheduled_date.eq(date))
                .load(conn)?;
            // Priority ordering with unscored rows last is done in
            // process so both backends sort identically.
            let mut assignments: Vec<ScheduleAssignment> =
                rows.into_iter().map(Into::into).collect();
            assignments.sort_by(ScheduleAssignment::day_display_order);
            Ok(assignments)
        })
        .await
    }

    async fn find_by_worker_and_period(
        &self,
        worker_id: WorkerId,
        start_day: NaiveDate,
        end_day: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        if end_day < start_day {
            return Err(RepositoryError::invalid_period(start_day, end_day));
        }
        self.with_conn(move |conn| {
            let rows: Vec<AssignmentRow> = schedule_assignments::table
                .filter(schedule_assignments::worker_id.eq(worker_id.value()))
                .filter(schedule_assignments::scheduled_date.ge(start_day))
                .filter(schedule_assignments::scheduled_date.le(end_day))
                .load(conn)?;
            let mut assignments: Vec<ScheduleAssignment> =
                rows.into_iter().map(Into::into).collect();
            assignments.sort_by(ScheduleAssignment::period_display_order);
            Ok(assignments)
        })
        .await
    }

    async fn find_by_ticket_and_date(
        &self,
        ticket_id: TicketId,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        self.with_conn(move |conn| {
            let rows: Vec<AssignmentRow> = schedule_assignments::table
                .filter(schedule_assignments::ticket_id.eq(ticket_id.value()))
                .filter(schedule_assignments::scheduled_date.eq(date))
                .order(schedule_assignments::assigned_at.asc())
                .load(conn)?;
            Ok(rows.into_iter().map(Into::into).collect())
        })
        .await
    }

    async fn find_one_by_worker_ticket_and_date(
        &self,
        worker_id: WorkerId,
        ticket_id: TicketId,
        date: NaiveDate,
    ) -> RepositoryResult<Option<ScheduleAssignment>> {
        self.with_conn(move |conn| {
            let row: Option<AssignmentRow> = schedule_assignments::table
                .filter(schedule_assignments::worker_id.eq(worker_id.value()))
                .filter(schedule_assignments::ticket_id.eq(ticket_id.value()))
                .filter(schedule_assignments::scheduled_date.eq(date))
                .first(conn)
                .optional()?;
            Ok(row.map(Into::into))
        })
        .await
    }

    async fn save_assignment(
        &self,
        assignment: &ScheduleAssignment,
    ) -> RepositoryResult<ScheduleAssignment> {
        let assignment = assignment.clone();
        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|tx| match assignment.id {
                None => {
                    if assignment.scheduled_date < today() {
                        return Err(RepositoryError::past_date(
                            assignment.scheduled_date,
                            today(),
                        ));
                    }
                    insert_assignment_row(tx, &assignment)
                }
                Some(id) => {
                    let stored: AssignmentRow = schedule_assignments::table
                        .find(id.value())
                        .first(tx)
                        .optional()?
                        .ok_or_else(|| {
                            RepositoryError::not_found(format!("Assignment {} not found", id))
                        })?;
                    // The past-date rule applies to reassignment, not to
                    // provenance updates of rows that stayed in place.
                    if assignment.scheduled_date != stored.scheduled_date
                        && assignment.scheduled_date < today()
                    {
                        return Err(RepositoryError::past_date(
                            assignment.scheduled_date,
                            today(),
                        ));
                    }
                    let clash: Option<i64> = schedule_assignments::table
                        .filter(schedule_assignments::worker_id.eq(assignment.worker_id.value()))
                        .filter(schedule_assignments::ticket_id.eq(assignment.ticket_id.value()))
                        .filter(schedule_assignments::scheduled_date.eq(assignment.scheduled_date))
                        .filter(schedule_assignments::id.ne(id.value()))
                        .select(schedule_assignments::id)
                        .first(tx)
                        .optional()?;
                    if clash.is_some() {
                        return Err(RepositoryError::duplicate_assignment(
                            assignment.worker_id,
                            assignment.ticket_id,
                            assignment.scheduled_date,
                        ));
                    }
                    let updated: AssignmentRow =
                        diesel::update(schedule_assignments::table.find(id.value()))
                            .set((
                                schedule_assignments::worker_id.eq(assignment.worker_id.value()),
                                schedule_assignments::ticket_id.eq(assignment.ticket_id.value()),
                                schedule_assignments::scheduled_date.eq(assignment.scheduled_date),
                                schedule_assignments::assigned_at.eq(assignment.assigned_at),
                                schedule_assignments::assigned_by
                                    .eq(assignment.assigned_by.map(|w| w.value())),
                                schedule_assignments::auto_assigned.eq(assignment.auto_assigned),
                                schedule_assignments::priority
                                    .eq(db_priority(assignment.priority)?),
                            ))
                            .returning(AssignmentRow::as_returning())
                            .get_result(tx)?;
                    Ok(updated.into())
                }
            })
        })
        .await
    }

    async fn save_assignments(
        &self,
        assignments: &[ScheduleAssignment],
    ) -> RepositoryResult<Vec<ScheduleAssignment>> {
        if assignments.is_empty() {
            return Ok(Vec::new());
        }
        let assignments = assignments.to_vec();
        self.with_conn(move |conn| {
            for assignment in &assignments {
                if assignment.id.is_some() {
                    return Err(RepositoryError::internal(
                        "save_assignments expects unsaved assignments (id must be None)",
                    ));
                }
                if assignment.scheduled_date < today() {
                    return Err(RepositoryError::past_date(
                        assignment.scheduled_date,
                        today(),
                    ));
                }
            }
            // One transaction for the whole batch: a duplicate anywhere,
            // in-batch or against stored rows, rolls everything back.
            conn.transaction::<_, RepositoryError, _>(|tx| {
                let mut stored = Vec::with_capacity(assignments.len());
                for assignment in &assignments {
                    stored.push(insert_assignment_row(tx, assignment)?);
                }
                Ok(stored)
            })
        })
        .await
    }

    async fn remove_assignment(&self, assignment: &ScheduleAssignment) -> RepositoryResult<()> {
        let assignment = assignment.clone();
        self.with_conn(move |conn| match assignment.id {
            Some(id) => {
                let deleted =
                    diesel::delete(schedule_assignments::table.find(id.value())).execute(conn)?;
                if deleted == 0 {
                    return Err(RepositoryError::not_found(format!(
                        "Assignment {} not found",
                        id
                    )));
                }
                Ok(())
            }
            None => {
                let deleted = diesel::delete(
                    schedule_assignments::table
                        .filter(schedule_assignments::worker_id.eq(assignment.worker_id.value()))
                        .filter(schedule_assignments::ticket_id.eq(assignment.ticket_id.value()))
                        .filter(schedule_assignments::scheduled_date.eq(assignment.scheduled_date)),
                )
                .execute(conn)?;
                if deleted == 0 {
                    return Err(RepositoryError::not_found(format!(
                        "No assignment of ticket {} for worker {} on {}",
                        assignment.ticket_id, assignment.worker_id, assignment.scheduled_date
                    )));
                }
                Ok(())
            }
        })
        .await
    }
}
