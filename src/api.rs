//! Public API surface for the scheduling engine.
//!
//! This file consolidates the identifier newtypes and re-exports the DTO
//! types callers interact with. All types derive Serialize/Deserialize.

pub use crate::models::assignment::PriorityLabel;
pub use crate::models::assignment::ScheduleAssignment;
pub use crate::models::availability::AvailabilitySlot;
pub use crate::models::backlog::BacklogTicket;
pub use crate::models::category::CategoryCatalog;
pub use crate::models::category::TicketCategory;
pub use crate::models::prediction::WorkloadPrediction;
pub use crate::models::week::DaySchedule;
pub use crate::models::week::WeekSchedule;
pub use crate::scheduler::AssignOutcome;

use serde::{Deserialize, Serialize};

/// Worker identifier (database primary key).
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct WorkerId(pub i64);

/// Ticket identifier.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TicketId(pub i64);

/// Ticket category identifier.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CategoryId(pub i64);

/// Schedule assignment identifier.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AssignmentId(pub i64);

/// Availability slot identifier.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SlotId(pub i64);

impl WorkerId {
    pub fn new(value: i64) -> Self {
        WorkerId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TicketId {
    pub fn new(value: i64) -> Self {
        TicketId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl CategoryId {
    pub fn new(value: i64) -> Self {
        CategoryId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl AssignmentId {
    pub fn new(value: i64) -> Self {
        AssignmentId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl SlotId {
    pub fn new(value: i64) -> Self {
        SlotId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<WorkerId> for i64 {
    fn from(id: WorkerId) -> Self {
        id.0
    }
}

impl From<TicketId> for i64 {
    fn from(id: TicketId) -> Self {
        id.0
    }
}
