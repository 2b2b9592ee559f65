//! Bracket error types.

use thiserror::Error;

/// Bracket engine errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BracketError {
    /// Bracket size is not supported by the format
    #[error("Unsupported bracket size {size}: {reason}")]
    UnsupportedSize { size: usize, reason: String },

    /// The same player was seeded twice
    #[error("Player {0} is seeded more than once")]
    DuplicateSeed(i64),

    /// No match with this number in the bracket
    #[error("Match {0} does not exist in this bracket")]
    UnknownMatch(u32),

    /// Both players must be known before a result can be recorded
    #[error("Match {0} does not have two players yet")]
    SlotsNotFilled(u32),

    /// Bracket matches cannot end in a draw
    #[error("Match {0} cannot end in a tie")]
    TiedScore(u32),

    /// The match fed a match that was already played
    #[error("Match {source_match} cannot be changed: match {downstream} is already completed")]
    DownstreamCompleted { source_match: u32, downstream: u32 },

    /// Persisted matches don't form a valid bracket
    #[error("Corrupt bracket: {0}")]
    Corrupt(String),
}

/// Result type for bracket operations
pub type BracketResult<T> = Result<T, BracketError>;
