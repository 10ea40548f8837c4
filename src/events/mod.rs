//! Schedule change notification.
//!
//! Every schedule mutation publishes a [`ScheduleEvent`] through the
//! injected [`EventPublisher`]. Delivery is best-effort and
//! at-least-once: the write has already committed by the time the event
//! goes out, and a failed publish never rolls it back (the Scheduler
//! logs the failure and moves on).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::api::{TicketId, WorkerId};
use crate::models::ScheduleAssignment;

/// What happened to the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleEventKind {
    Assigned,
    Unassigned,
}

/// One schedule mutation, ready for external fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    #[serde(rename = "type")]
    pub kind: ScheduleEventKind,
    pub worker_id: WorkerId,
    pub ticket_id: TicketId,
    pub date: NaiveDate,
}

impl ScheduleEvent {
    pub fn assigned(assignment: &ScheduleAssignment) -> Self {
        Self {
            kind: ScheduleEventKind::Assigned,
            worker_id: assignment.worker_id,
            ticket_id: assignment.ticket_id,
            date: assignment.scheduled_date,
        }
    }

    pub fn unassigned(worker_id: WorkerId, ticket_id: TicketId, date: NaiveDate) -> Self {
        Self {
            kind: ScheduleEventKind::Unassigned,
            worker_id,
            ticket_id,
            date,
        }
    }
}

/// Outbound transport for schedule events.
///
/// Implementations carry their own failure modes (broker down, queue
/// full), so publish reports through `anyhow`. Callers must treat a
/// failure as a delivery problem only; the schedule mutation stands.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: ScheduleEvent) -> anyhow::Result<()>;
}

/// Publisher that drops every event. For embedders without fan-out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

#[async_trait]
impl EventPublisher for NullPublisher {
    async fn publish(&self, _event: ScheduleEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// In-memory queue publisher.
///
/// Buffers events for a draining consumer; also the test double of
/// choice. Clones share the buffer.
#[derive(Clone, Default)]
pub struct BufferingPublisher {
    inner: Arc<RwLock<BufferState>>,
}

#[derive(Default)]
struct BufferState {
    events: Vec<ScheduleEvent>,
    failing: bool,
}

impl BufferingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every buffered event, oldest first.
    pub fn drain(&self) -> Vec<ScheduleEvent> {
        std::mem::take(&mut self.inner.write().events)
    }

    pub fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().events.is_empty()
    }

    /// Simulate a broken transport: publishes fail and buffer nothing.
    pub fn set_failing(&self, failing: bool) {
        self.inner.write().failing = failing;
    }
}

#[async_trait]
impl EventPublisher for BufferingPublisher {
    async fn publish(&self, event: ScheduleEvent) -> anyhow::Result<()> {
        let mut state = self.inner.write();
        if state.failing {
            anyhow::bail!("event transport unavailable");
        }
        state.events.push(event);
        Ok(())
    }
}
