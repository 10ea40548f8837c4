use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{CategoryId, TicketId};

/// Read-only view of an unscheduled ticket, as exposed by the ticket
/// system collaborator. Everything the planner needs, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacklogTicket {
    pub ticket_id: TicketId,
    pub category_id: CategoryId,
    /// Estimated resolution time in minutes (never negative)
    pub estimated_minutes: i64,
    pub created_at: DateTime<Utc>,
    /// Optional priority signal (higher is more urgent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl BacklogTicket {
    pub fn new(
        ticket_id: TicketId,
        category_id: CategoryId,
        estimated_minutes: i64,
        created_at: DateTime<Utc>,
        priority: Option<u32>,
    ) -> Self {
        Self {
            ticket_id,
            category_id,
            estimated_minutes: estimated_minutes.max(0),
            created_at,
            priority,
        }
    }
}
