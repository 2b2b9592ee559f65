//! Match errors.

use super::models::MatchId;
use crate::modes::ScoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Match not found: {0}")]
    NotFound(MatchId),

    #[error("Match was changed by someone else (expected version {expected}, current {current})")]
    VersionConflict { expected: i32, current: i32 },

    #[error("Invalid score: {0}")]
    InvalidScore(#[from] ScoreError),

    #[error("Match {0} does not have both players yet")]
    MissingPlayers(MatchId),

    #[error("Match {0} is a bracket match; record finals results through the bracket")]
    BracketMatch(MatchId),

    #[error("Corrupt match row: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl MatchError {
    pub fn client_message(&self) -> String {
        match self {
            MatchError::Database(_) | MatchError::Corrupt(_) | MatchError::Serialization(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

pub type MatchResult<T> = Result<T, MatchError>;
