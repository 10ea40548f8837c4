//! Repository trait definitions for the scheduling stores.
//!
//! This module provides focused repository traits that abstract storage
//! operations. By splitting responsibilities per aggregate, implementations
//! stay narrow and the Scheduler depends only on behavior.
//!
//! # Module Organization
//!
//! - [`error`]: Error types for repository and scheduler operations
//! - [`availability`]: Per-worker, per-day availability windows
//! - [`schedule`]: The assignment allocation table
//!
//! # Trait Composition
//!
//! A complete backend implements both traits:
//!
//! ```ignore
//! impl AvailabilityRepository for MyRepo { ... }
//! impl ScheduleRepository for MyRepo { ... }
//! ```
//!
//! Functions that need the whole store take the [`FullRepository`] bound,
//! which is blanket-implemented for any such type.

pub mod availability;
pub mod error;
pub mod schedule;

// Re-export error types
pub use error::{ErrorContext, RepositoryError, RepositoryResult};

// Re-export all traits
pub use availability::{validate_replacement_batch, AvailabilityRepository};
pub use schedule::ScheduleRepository;

/// Composite trait bound for a complete storage backend.
///
/// Automatically implemented for any type that implements both store
/// traits. The Scheduler holds its backend as `Arc<dyn FullRepository>`.
pub trait FullRepository: AvailabilityRepository + ScheduleRepository {}

// Blanket implementation: both traits together make a full repository
impl<T> FullRepository for T where T: AvailabilityRepository + ScheduleRepository {}
