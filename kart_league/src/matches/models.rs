//! Match records.
//!
//! One table holds the matches of every head-to-head mode and both stages.
//! Qualification matches carry a group label; finals matches carry their
//! bracket side and number inside the bracket.

use crate::{
    bracket::{BracketMatch, BracketSide, PlayerId, Slot},
    modes::{GameMode, RoundResult, Stage},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Match ID type
pub type MatchId = i64;

/// A stored match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: i64,
    pub mode: GameMode,
    pub stage: Stage,
    pub round_label: String,
    pub group_label: Option<String>,
    pub bracket: Option<BracketSide>,
    pub match_number: u32,
    pub player1_id: Option<PlayerId>,
    pub player2_id: Option<PlayerId>,
    pub score1: u32,
    pub score2: u32,
    pub rounds: Vec<RoundResult>,
    pub completed: bool,
    /// Optimistic lock version, bumped on every write
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    /// Whether the player takes part in this match
    pub fn involves(&self, player_id: PlayerId) -> bool {
        self.slot_of(player_id).is_some()
    }

    pub fn slot_of(&self, player_id: PlayerId) -> Option<Slot> {
        if self.player1_id == Some(player_id) {
            Some(Slot::One)
        } else if self.player2_id == Some(player_id) {
            Some(Slot::Two)
        } else {
            None
        }
    }

    /// Bracket engine view of a finals match
    pub fn to_bracket_match(&self) -> BracketMatch {
        BracketMatch {
            number: self.match_number,
            side: self.bracket.unwrap_or(BracketSide::Single),
            round: self.round_label.clone(),
            player1: self.player1_id,
            player2: self.player2_id,
            score1: self.score1,
            score2: self.score2,
            completed: self.completed,
        }
    }
}

/// A match to insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMatch {
    pub tournament_id: i64,
    pub mode: GameMode,
    pub stage: Stage,
    pub round_label: String,
    pub group_label: Option<String>,
    pub bracket: Option<BracketSide>,
    pub match_number: u32,
    pub player1_id: Option<PlayerId>,
    pub player2_id: Option<PlayerId>,
}

impl NewMatch {
    /// A finals match built from a generated bracket row
    pub fn from_bracket(tournament_id: i64, mode: GameMode, m: &BracketMatch) -> Self {
        Self {
            tournament_id,
            mode,
            stage: Stage::Finals,
            round_label: m.round.clone(),
            group_label: None,
            bracket: Some(m.side),
            match_number: m.number,
            player1_id: m.player1,
            player2_id: m.player2,
        }
    }
}

/// Score write guarded by the version the client last saw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub expected_version: i32,
    pub score1: u32,
    pub score2: u32,
    #[serde(default)]
    pub rounds: Vec<RoundResult>,
    #[serde(default = "default_completed")]
    pub completed: bool,
}

fn default_completed() -> bool {
    true
}

/// Listing filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFilter {
    pub tournament_id: Option<i64>,
    pub mode: Option<GameMode>,
    pub stage: Option<Stage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Match {
        Match {
            id: 1,
            tournament_id: 2,
            mode: GameMode::Mr,
            stage: Stage::Finals,
            round_label: "Winners Quarterfinal".to_string(),
            group_label: None,
            bracket: Some(BracketSide::Winners),
            match_number: 3,
            player1_id: Some(10),
            player2_id: Some(20),
            score1: 5,
            score2: 2,
            rounds: vec![],
            completed: true,
            version: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_slot_of() {
        let m = sample();
        assert_eq!(m.slot_of(10), Some(Slot::One));
        assert_eq!(m.slot_of(20), Some(Slot::Two));
        assert!(!m.involves(30));
    }

    #[test]
    fn test_bracket_round_trip() {
        let m = sample();
        let b = m.to_bracket_match();
        assert_eq!(b.number, 3);
        assert_eq!(b.winner(), Some(10));

        let new = NewMatch::from_bracket(2, GameMode::Mr, &b);
        assert_eq!(new.bracket, Some(BracketSide::Winners));
        assert_eq!(new.stage, Stage::Finals);
        assert_eq!(new.player2_id, Some(20));
    }

    #[test]
    fn test_score_update_defaults_to_completed() {
        let update: ScoreUpdate =
            serde_json::from_str(r#"{"expected_version": 1, "score1": 3, "score2": 1}"#).unwrap();
        assert!(update.completed);
        assert!(update.rounds.is_empty());
    }
}
