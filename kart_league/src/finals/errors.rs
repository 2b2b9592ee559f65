//! Finals errors.

use crate::{
    bracket::BracketError,
    db::timeouts::TimeoutError,
    matches::MatchError,
    modes::{GameMode, ScoreError},
    qualification::QualificationError,
    tournament::TournamentError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinalsError {
    #[error("Mode {0} has no finals bracket")]
    NotBracketMode(GameMode),

    #[error("A {0} bracket already exists for this tournament")]
    BracketExists(GameMode),

    #[error("No {0} bracket exists for this tournament")]
    NoBracket(GameMode),

    #[error("Invalid score: {0}")]
    InvalidScore(#[from] ScoreError),

    #[error(transparent)]
    Tournament(#[from] TournamentError),

    #[error(transparent)]
    Bracket(#[from] BracketError),

    #[error(transparent)]
    Qualification(#[from] QualificationError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("Finals update timed out")]
    Timeout(#[from] TimeoutError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl FinalsError {
    pub fn client_message(&self) -> String {
        match self {
            FinalsError::Database(_) | FinalsError::Serialization(_) | FinalsError::Timeout(_) => {
                "Internal server error".to_string()
            }
            FinalsError::Bracket(BracketError::Corrupt(_)) => "Internal server error".to_string(),
            FinalsError::Tournament(e) => e.client_message(),
            FinalsError::Qualification(e) => e.client_message(),
            FinalsError::Match(e) => e.client_message(),
            _ => self.to_string(),
        }
    }
}

pub type FinalsResult<T> = Result<T, FinalsError>;
