//! Match records shared by every head-to-head mode.
//!
//! Score writes use optimistic locking: the client sends the version it
//! read and the write is rejected if the row moved on in the meantime.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{MatchError, MatchResult};
pub use manager::MatchManager;
pub use models::{Match, MatchFilter, MatchId, NewMatch, ScoreUpdate};
