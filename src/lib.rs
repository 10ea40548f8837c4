//! # Deskplan
//!
//! Worker schedule and auto-assignment engine for a call-center back office.
//!
//! This crate owns the scheduling core: worker availability calendars, the
//! per-day ticket allocation table, a deterministic greedy auto-assignment
//! planner, and a per-day workload forecast. Everything around it (ticket
//! lifecycle, authentication, transport) is reached through narrow trait
//! contracts so the engine can be embedded behind any delivery layer.
//!
//! ## Features
//!
//! - **Availability calendars**: non-overlapping same-day time windows per worker
//! - **Schedule store**: unique (worker, ticket, date) assignments with provenance
//! - **Manual assignment**: advisory capacity check with an overcommit flag
//! - **Auto-assignment**: greedy, deterministic week planner over the ticket backlog
//! - **Workload prediction**: moving-average forecast from availability and history
//! - **Change events**: best-effort publish on every schedule mutation
//!
//! ## Architecture
//!
//! - [`api`]: identifier newtypes and the public DTO surface
//! - [`models`]: domain entities and derived views
//! - [`db`]: repository contracts and storage backends (in-memory, PostgreSQL)
//! - [`backlog`]: contracts consumed from the ticket system
//! - [`scheduler`]: the allocation engine and its pure planning helpers
//! - [`services`]: workload prediction
//! - [`events`]: schedule change notification

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod api;

pub mod backlog;
pub mod db;
pub mod events;
pub mod models;

pub mod scheduler;

pub mod services;
