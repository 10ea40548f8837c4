//! Storage module for the scheduling stores.
//!
//! This module provides abstractions for storage operations via the
//! Repository pattern, allowing backends to be swapped without touching
//! the Scheduler.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Scheduler / services (business logic)      │
//! └───────────────────┬─────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────┐
//! │  Repository traits (repository/)            │
//! │  AvailabilityRepository + ScheduleRepository│
//! └───────────────────┬─────────────────────────┘
//!                     │
//!     ┌───────────────┴───────────────┐
//!     │ LocalRepository │ PostgresRepository │
//!     │   (in-memory)   │  (Diesel, pooled)  │
//!     └───────────────────────────────┘
//! ```
//!
//! # Module contents
//! - `repository`: trait definitions and the error taxonomy
//! - `repositories::local`: in-memory backend for tests and development
//! - `repositories::postgres`: Diesel/PostgreSQL backend (feature `postgres-repo`)
//! - `repo_config`: TOML configuration for backend selection
//! - `factory`: construction of configured backends
//!
//! # Recommended Usage
//!
//! ```ignore
//! use deskplan::db::{RepositoryFactory, RepositoryType};
//!
//! let repo = RepositoryFactory::create(RepositoryType::Local, None).await?;
//! let scheduler = Scheduler::new(repo, backlog, catalog, publisher);
//! ```

// Feature flag priority: postgres > local
// When multiple features are enabled (e.g., --all-features), postgres takes precedence.
#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;

// Postgres config is colocated with the repository implementation.
#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::{PoolStats, PostgresConfig};
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    _private: (),
}

pub use repo_config::RepositoryConfig;

pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    AvailabilityRepository, ErrorContext, FullRepository, RepositoryError, RepositoryResult,
    ScheduleRepository,
};
