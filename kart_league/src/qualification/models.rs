//! Qualification models.

use crate::{bracket::PlayerId, modes::GameMode};
use serde::{Deserialize, Serialize};

/// Put a player into a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAssignment {
    pub player_id: PlayerId,
    pub group_label: String,
    /// Pre-tournament seeding (1 is best), used as a late tie-break
    #[serde(default)]
    pub seeding: Option<u32>,
}

/// Stored per-player qualification aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationRecord {
    pub id: i64,
    pub tournament_id: i64,
    pub player_id: PlayerId,
    pub mode: GameMode,
    pub group_label: String,
    pub seeding: Option<u32>,
    pub matches_played: u32,
    pub wins: u32,
    pub ties: u32,
    pub losses: u32,
    pub points: i32,
    pub score_for: u32,
    pub score_against: u32,
}

/// A completed qualification match reduced to what standings need
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub player1: PlayerId,
    pub player2: PlayerId,
    pub score1: u32,
    pub score2: u32,
}

/// One row of a group table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// Rank inside the group (1-based)
    pub rank: u32,
    pub player_id: PlayerId,
    pub group_label: String,
    pub seeding: Option<u32>,
    pub matches_played: u32,
    pub wins: u32,
    pub ties: u32,
    pub losses: u32,
    pub points: i32,
    pub score_for: u32,
    pub score_against: u32,
}

impl Standing {
    pub fn score_diff(&self) -> i64 {
        i64::from(self.score_for) - i64::from(self.score_against)
    }
}

/// Ranked table of one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStandings {
    pub group_label: String,
    pub standings: Vec<Standing>,
}
