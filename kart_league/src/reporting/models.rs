//! Score report models.

use crate::{bracket::PlayerId, matches::Match, modes::RoundResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A participant's score report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub score1: u32,
    pub score2: u32,
    #[serde(default)]
    pub rounds: Vec<RoundResult>,
}

/// A stored score entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub id: i64,
    pub match_id: i64,
    pub player_id: PlayerId,
    pub score1: u32,
    pub score2: u32,
    pub rounds: Vec<RoundResult>,
    pub created_at: DateTime<Utc>,
}

impl ScoreEntry {
    /// Whether two entries report the same result
    pub fn agrees_with(&self, other: &ScoreEntry) -> bool {
        self.score1 == other.score1 && self.score2 == other.score2 && self.rounds == other.rounds
    }
}

/// What a report led to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    /// Waiting for the opponent's report
    Pending { entry: ScoreEntry },
    /// Both players agree; the match is completed
    Confirmed { entry: ScoreEntry, match_record: Match },
    /// The latest reports of the two players differ
    Disputed {
        entry: ScoreEntry,
        opponent: ScoreEntry,
    },
}

/// Decide the outcome from the latest report of each player
pub fn resolve(player1: PlayerId, player2: PlayerId, latest: &[ScoreEntry]) -> Resolution {
    let find = |player: PlayerId| latest.iter().find(|e| e.player_id == player);
    match (find(player1), find(player2)) {
        (Some(first), Some(second)) if first.agrees_with(second) => Resolution::Agreed,
        (Some(_), Some(_)) => Resolution::Disputed,
        _ => Resolution::Waiting,
    }
}

/// Agreement state of a match's reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Waiting,
    Agreed,
    Disputed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(player_id: PlayerId, score1: u32, score2: u32) -> ScoreEntry {
        ScoreEntry {
            id: player_id,
            match_id: 1,
            player_id,
            score1,
            score2,
            rounds: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolution() {
        assert_eq!(resolve(1, 2, &[]), Resolution::Waiting);
        assert_eq!(resolve(1, 2, &[entry(1, 3, 1)]), Resolution::Waiting);
        assert_eq!(
            resolve(1, 2, &[entry(1, 3, 1), entry(2, 3, 1)]),
            Resolution::Agreed
        );
        assert_eq!(
            resolve(1, 2, &[entry(1, 3, 1), entry(2, 1, 3)]),
            Resolution::Disputed
        );
    }

    #[test]
    fn test_reports_by_outsiders_are_ignored() {
        assert_eq!(
            resolve(1, 2, &[entry(1, 3, 1), entry(9, 3, 1)]),
            Resolution::Waiting
        );
    }
}
