//! Pure week-planning pass for auto-assignment.
//!
//! The planner is deterministic and side-effect free: given the same
//! candidate pool and the same day capacities it always produces the
//! same plan. All repository and backlog traffic happens before and
//! after this pass, in the Scheduler.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::NaiveDate;

use crate::api::TicketId;
use crate::models::BacklogTicket;
use crate::scheduler::capacity::DayCapacity;

/// One slot of the computed plan, not yet persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedAssignment {
    pub ticket_id: TicketId,
    pub date: NaiveDate,
    pub estimated_minutes: i64,
    pub priority: Option<u32>,
}

/// Candidate ordering: priority descending with unprioritized tickets
/// last, then oldest first, then ticket id as the final tiebreak.
fn candidate_order(a: &BacklogTicket, b: &BacklogTicket) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.ticket_id.cmp(&b.ticket_id))
}

/// Greedy first-fit placement of `candidates` across `days`.
///
/// Days are visited in the order given. Within a day the sorted pool is
/// scanned once and every ticket whose estimate fits the remaining
/// minutes is placed; a ticket that does not fit stays in the pool for
/// later days. Tickets in `already_assigned` never enter the pool, and
/// a ticket id occurring twice in `candidates` is planned at most once.
pub fn plan_week(
    candidates: &[BacklogTicket],
    already_assigned: &HashSet<TicketId>,
    days: &[DayCapacity],
) -> Vec<PlannedAssignment> {
    let mut pool: Vec<BacklogTicket> = candidates
        .iter()
        .filter(|t| !already_assigned.contains(&t.ticket_id))
        .cloned()
        .collect();
    pool.sort_by(candidate_order);
    let mut seen = HashSet::new();
    pool.retain(|t| seen.insert(t.ticket_id));

    let mut plan = Vec::new();
    for day in days {
        let mut remaining = day.remaining_minutes();
        pool.retain(|ticket| {
            let estimate = ticket.estimated_minutes.max(0);
            if estimate <= remaining {
                remaining -= estimate;
                plan.push(PlannedAssignment {
                    ticket_id: ticket.ticket_id,
                    date: day.date,
                    estimated_minutes: estimate,
                    priority: ticket.priority,
                });
                false
            } else {
                true
            }
        });
    }
    plan
}
