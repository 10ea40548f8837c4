//! Service layer for derived, read-only computations.
//!
//! Services sit beside the Scheduler: they take data the Scheduler has
//! already loaded and turn it into presentation-ready values without
//! touching a repository themselves.

pub mod prediction;

pub use prediction::{compute_prediction, TRAILING_WINDOW_DAYS};
