//! Participant score reporting.

pub mod manager;
pub mod models;

pub use manager::{ReportError, ReportManager, ReportResult};
pub use models::{ReportOutcome, ScoreEntry, ScoreReport};
