//! Time Attack data models.

use crate::bracket::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Time Attack errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaError {
    #[error("An elimination phase needs at least 2 players, got {0}")]
    TooFewEntrants(usize),

    #[error("Player {0} is entered more than once")]
    DuplicateEntrant(PlayerId),

    #[error("At least one player must be eliminated per round")]
    InvalidEliminationCount,

    #[error("Player {0} is not part of this phase")]
    UnknownPlayer(PlayerId),

    #[error("Player {0} is already eliminated")]
    AlreadyEliminated(PlayerId),

    #[error("Player {0} has more than one time in this round")]
    DuplicateTime(PlayerId),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("The elimination phase is already finished")]
    PhaseFinished,
}

/// Result type for Time Attack operations
pub type TaResult<T> = Result<T, TaError>;

/// A seeded player entering the elimination phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaEntrant {
    pub player_id: PlayerId,
    /// Qualification rank, 1 is best
    pub seed: u32,
}

/// A time submitted for one round; `None` means did not finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTime {
    pub player_id: PlayerId,
    pub time_ms: Option<u32>,
}

/// A played elimination round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliminationRound {
    /// Round number (1-based)
    pub round: u32,
    pub course: String,
    /// Times in finishing order, DNFs last
    pub times: Vec<RoundTime>,
    /// Players knocked out this round, fastest first
    pub eliminated: Vec<PlayerId>,
}

/// Qualification times of one player, keyed by course
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaEntry {
    pub player_id: PlayerId,
    pub course_times: BTreeMap<String, u32>,
}

impl TaEntry {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            course_times: BTreeMap::new(),
        }
    }

    pub fn total_ms(&self) -> u64 {
        self.course_times.values().map(|&t| u64::from(t)).sum()
    }
}

/// Qualification ranking row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaStanding {
    pub rank: u32,
    pub player_id: PlayerId,
    pub courses_completed: usize,
    pub total_ms: u64,
}

/// Format milliseconds as `m:ss.mmm`
pub fn format_time(ms: u32) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{minutes}:{seconds:02}.{millis:03}")
}

/// Parse `m:ss.mmm` (or `ss.mmm`) into milliseconds
pub fn parse_time(input: &str) -> TaResult<u32> {
    let invalid = || TaError::InvalidTime(input.to_string());
    let trimmed = input.trim();

    let (minutes, rest) = match trimmed.split_once(':') {
        Some((m, rest)) => (m.parse::<u32>().map_err(|_| invalid())?, rest),
        None => (0, trimmed),
    };
    let (seconds, millis) = rest.split_once('.').ok_or_else(invalid)?;
    if seconds.is_empty() || millis.len() != 3 {
        return Err(invalid());
    }
    let seconds: u32 = seconds.parse().map_err(|_| invalid())?;
    let millis: u32 = millis.parse().map_err(|_| invalid())?;
    if seconds >= 60 && minutes > 0 {
        return Err(invalid());
    }

    let total = minutes
        .checked_mul(60_000)
        .and_then(|m| m.checked_add(seconds * 1000 + millis))
        .ok_or_else(invalid)?;
    if total == 0 {
        return Err(invalid());
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(83_456), "1:23.456");
        assert_eq!(format_time(5_007), "0:05.007");
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("1:23.456"), Ok(83_456));
        assert_eq!(parse_time(" 59.999 "), Ok(59_999));
        assert!(parse_time("1:23").is_err());
        assert!(parse_time("1:75.000").is_err());
        assert!(parse_time("0.000").is_err());
        assert!(parse_time("abc").is_err());
    }

    #[test]
    fn test_entry_total() {
        let mut entry = TaEntry::new(7);
        entry.course_times.insert("MC1".to_string(), 60_000);
        entry.course_times.insert("DP1".to_string(), 61_500);
        assert_eq!(entry.total_ms(), 121_500);
    }
}
