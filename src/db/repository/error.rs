//! Error types for repository and scheduling operations.
//!
//! One taxonomy covers both stores and the scheduler: domain conflicts
//! (overlap, duplicate, past date) and storage failures, each carrying
//! structured context for debugging and monitoring.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

use crate::api::{TicketId, WorkerId};

/// Result type for repository and scheduler operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Structured context for repository errors.
///
/// Provides additional information about where and why an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g., "save_assignment", "auto_assign")
    pub operation: Option<String>,
    /// The entity type involved (e.g., "availability_slot", "schedule_assignment")
    pub entity: Option<String>,
    /// The entity ID if applicable
    pub entity_id: Option<String>,
    /// Additional details about the error
    pub details: Option<String>,
    /// Whether this error is retryable
    pub retryable: bool,
}

impl ErrorContext {
    /// Create a new error context with an operation name.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    /// Set the entity type.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Set the entity ID.
    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    /// Set additional details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Mark this error as retryable.
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(ref id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        if self.retryable {
            parts.push("retryable=true".to_string());
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for repository and scheduler operations
#[derive(Debug, thiserror::Error)]
#[allow(clippy::result_large_err)]
pub enum RepositoryError {
    /// Connection pool or database connection errors.
    /// These are typically transient and may be retried.
    #[error("Connection error: {message} {context}")]
    ConnectionError {
        message: String,
        context: ErrorContext,
    },

    /// SQL query execution errors.
    #[error("Query error: {message} {context}")]
    QueryError {
        message: String,
        context: ErrorContext,
    },

    /// Requested entity was not found.
    #[error("Not found: {message} {context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// Malformed or inverted date/time range (end before start, or a
    /// window crossing midnight).
    #[error("Invalid range: {message} {context}")]
    InvalidRange {
        message: String,
        context: ErrorContext,
    },

    /// A new availability window intersects an existing one for the
    /// same worker and day.
    #[error("Overlap: {message} {context}")]
    Overlap {
        message: String,
        context: ErrorContext,
    },

    /// Attempt to schedule on a date before today.
    #[error("Past date: {message} {context}")]
    PastDate {
        message: String,
        context: ErrorContext,
    },

    /// The (worker, ticket, date) triple already exists.
    #[error("Duplicate assignment: {message} {context}")]
    DuplicateAssignment {
        message: String,
        context: ErrorContext,
    },

    /// Configuration or initialization error.
    #[error("Configuration error: {message} {context}")]
    ConfigurationError {
        message: String,
        context: ErrorContext,
    },

    /// Internal/unexpected errors.
    #[error("Internal error: {message} {context}")]
    InternalError {
        message: String,
        context: ErrorContext,
    },

    /// Transaction error (commit/rollback failed).
    #[error("Transaction error: {message} {context}")]
    TransactionError {
        message: String,
        context: ErrorContext,
    },

    /// Timeout waiting for a connection, query, or time-budgeted operation.
    #[error("Timeout error: {message} {context}")]
    TimeoutError {
        message: String,
        context: ErrorContext,
    },
}

impl RepositoryError {
    /// Create a connection error with context.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
            context: ErrorContext::default().retryable(),
        }
    }

    /// Create a connection error with full context.
    pub fn connection_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::ConnectionError {
            message: message.into(),
            context: context.retryable(),
        }
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a query error with context.
    pub fn query_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::QueryError {
            message: message.into(),
            context,
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a not found error with context.
    pub fn not_found_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::NotFound {
            message: message.into(),
            context,
        }
    }

    /// Create an invalid range error from a free-form description.
    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::InvalidRange {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Invalid availability window (inverted or midnight-crossing).
    pub fn invalid_window(start: DateTime<Utc>, end: DateTime<Utc>, detail: &str) -> Self {
        Self::InvalidRange {
            message: format!("{} (start={}, end={})", detail, start, end),
            context: ErrorContext::default().with_entity("availability_slot"),
        }
    }

    /// Invalid day period (end day before start day).
    pub fn invalid_period(start: NaiveDate, end: NaiveDate) -> Self {
        Self::InvalidRange {
            message: format!("period end {} precedes start {}", end, start),
            context: ErrorContext::default(),
        }
    }

    /// A new availability window collides with a stored one.
    pub fn overlap(
        worker_id: WorkerId,
        day: NaiveDate,
        new: (DateTime<Utc>, DateTime<Utc>),
        existing: (DateTime<Utc>, DateTime<Utc>),
    ) -> Self {
        Self::Overlap {
            message: format!(
                "window {}-{} overlaps existing {}-{} for worker {} on {}",
                new.0.format("%H:%M"),
                new.1.format("%H:%M"),
                existing.0.format("%H:%M"),
                existing.1.format("%H:%M"),
                worker_id,
                day
            ),
            context: ErrorContext::default()
                .with_entity("availability_slot")
                .with_entity_id(worker_id)
                .with_details(format!("existing={} to {}", existing.0, existing.1)),
        }
    }

    /// Scheduling on a date before today.
    pub fn past_date(date: NaiveDate, today: NaiveDate) -> Self {
        Self::PastDate {
            message: format!("scheduled date {} precedes today {}", date, today),
            context: ErrorContext::default().with_entity("schedule_assignment"),
        }
    }

    /// The (worker, ticket, date) triple already holds an assignment.
    pub fn duplicate_assignment(worker_id: WorkerId, ticket_id: TicketId, date: NaiveDate) -> Self {
        Self::DuplicateAssignment {
            message: format!(
                "ticket {} is already scheduled for worker {} on {}",
                ticket_id, worker_id, date
            ),
            context: ErrorContext::default()
                .with_entity("schedule_assignment")
                .with_entity_id(format!("({}, {}, {})", worker_id, ticket_id, date)),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a configuration error with context.
    pub fn configuration_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            context,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create an internal error with context.
    pub fn internal_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::InternalError {
            message: message.into(),
            context,
        }
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::TimeoutError {
            message: message.into(),
            context: ErrorContext::default().retryable(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError { context, .. } => context.retryable,
            Self::TimeoutError { context, .. } => context.retryable,
            Self::QueryError { context, .. } => context.retryable,
            Self::TransactionError { context, .. } => context.retryable,
            _ => false,
        }
    }

    /// Get the error context.
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::ConnectionError { context, .. } => context,
            Self::QueryError { context, .. } => context,
            Self::NotFound { context, .. } => context,
            Self::InvalidRange { context, .. } => context,
            Self::Overlap { context, .. } => context,
            Self::PastDate { context, .. } => context,
            Self::DuplicateAssignment { context, .. } => context,
            Self::ConfigurationError { context, .. } => context,
            Self::InternalError { context, .. } => context,
            Self::TransactionError { context, .. } => context,
            Self::TimeoutError { context, .. } => context,
        }
    }

    /// Add or update the operation in the error context.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        match &mut self {
            Self::ConnectionError { context, .. }
            | Self::QueryError { context, .. }
            | Self::NotFound { context, .. }
            | Self::InvalidRange { context, .. }
            | Self::Overlap { context, .. }
            | Self::PastDate { context, .. }
            | Self::DuplicateAssignment { context, .. }
            | Self::ConfigurationError { context, .. }
            | Self::InternalError { context, .. }
            | Self::TransactionError { context, .. }
            | Self::TimeoutError { context, .. } => {
                context.operation = Some(operation.into());
            }
        }
        self
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::result::Error> for RepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => RepositoryError::not_found("Record not found"),
            diesel::result::Error::DatabaseError(kind, info) => {
                let message = info.message().to_string();
                let context =
                    ErrorContext::default().with_details(format!("db_error_kind={:?}", kind));

                // The only unique index besides primary keys is the
                // (worker_id, ticket_id, scheduled_date) triple, so a
                // unique violation is a lost optimistic-insert race.
                if matches!(kind, diesel::result::DatabaseErrorKind::UniqueViolation) {
                    return RepositoryError::DuplicateAssignment { message, context };
                }

                // Some database errors are retryable (deadlocks, serialization failures)
                let is_retryable = matches!(
                    kind,
                    diesel::result::DatabaseErrorKind::SerializationFailure
                );

                let context = if is_retryable {
                    context.retryable()
                } else {
                    context
                };

                RepositoryError::QueryError { message, context }
            }
            diesel::result::Error::QueryBuilderError(e) => {
                RepositoryError::query(format!("Query builder error: {}", e))
            }
            diesel::result::Error::DeserializationError(e) => {
                RepositoryError::internal(format!("Deserialization error: {}", e))
            }
            diesel::result::Error::SerializationError(e) => {
                RepositoryError::internal(format!("Serialization error: {}", e))
            }
            other => RepositoryError::query(other.to_string()),
        }
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::r2d2::PoolError> for RepositoryError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        RepositoryError::connection_with_context(
            err.to_string(),
            ErrorContext::default()
                .with_details("pool_error")
                .retryable(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let ctx = ErrorContext::new("save_assignment")
            .with_entity("schedule_assignment")
            .with_entity_id(7);
        let rendered = ctx.to_string();
        assert!(rendered.contains("operation=save_assignment"));
        assert!(rendered.contains("entity=schedule_assignment"));
        assert!(rendered.contains("id=7"));
    }

    #[test]
    fn test_duplicate_assignment_carries_triple() {
        let err = RepositoryError::duplicate_assignment(
            WorkerId(3),
            TicketId(11),
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        );
        assert!(matches!(err, RepositoryError::DuplicateAssignment { .. }));
        assert!(err.to_string().contains("ticket 11"));
        assert!(err.to_string().contains("worker 3"));
        assert!(err.to_string().contains("2026-09-01"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_connection_is_retryable() {
        assert!(RepositoryError::connection("pool exhausted").is_retryable());
        assert!(RepositoryError::timeout("budget spent").is_retryable());
        assert!(!RepositoryError::not_found("nothing here").is_retryable());
    }

    #[test]
    fn test_with_operation_updates_context() {
        let err = RepositoryError::past_date(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(),
        )
        .with_operation("assign");
        assert_eq!(err.context().operation.as_deref(), Some("assign"));
    }
}
