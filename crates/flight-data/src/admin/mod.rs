//! Provider administration.
//!
//! Read-only metrics for every provider plus management commands (toggle,
//! primary selection, priority, health probe, circuit reset). Every
//! successful mutation is written to an [`AuditSink`].

mod audit;
mod service;

pub use audit::{AuditAction, AuditEntry, AuditSink, InMemoryAuditLog, NoOpAuditSink};
pub use service::{AdminCommand, AdminService, CommandResult};
