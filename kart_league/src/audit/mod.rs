//! Audit trail of administrative and participant actions.

pub mod logger;
pub mod models;

pub use logger::AuditLogger;
pub use models::{Actor, AuditEntry, AuditFilter, AuditLog, actions};
