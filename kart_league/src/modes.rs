//! Game modes and their scoring rules.
//!
//! The league runs four modes. Battle Mode, Match Race and Grand Prix are
//! head-to-head: qualification is a round robin inside groups and the finals
//! are a bracket. Time Attack is a solo time trial with its own elimination
//! phase (see [`crate::time_attack`]).

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Points for a won qualification match
pub const POINTS_WIN: i32 = 2;
/// Points for a drawn qualification match
pub const POINTS_TIE: i32 = 1;
/// Points for a lost qualification match
pub const POINTS_LOSS: i32 = 0;

/// Grand Prix driver points by finishing position (1st..4th, everyone else 0)
pub const GP_DRIVER_POINTS: [u32; 4] = [9, 6, 3, 1];

/// Highest finishing position in a Grand Prix race
pub const GP_MAX_POSITION: u8 = 8;

/// Game mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Battle Mode (balloon battles on arenas)
    Bm,
    /// Match Race (one-on-one races)
    Mr,
    /// Grand Prix (cups scored with driver points)
    Gp,
    /// Time Attack (solo time trials)
    Ta,
}

impl GameMode {
    pub const ALL: [GameMode; 4] = [GameMode::Bm, GameMode::Mr, GameMode::Gp, GameMode::Ta];

    /// Short code used in URLs and database rows
    pub fn code(self) -> &'static str {
        match self {
            GameMode::Bm => "bm",
            GameMode::Mr => "mr",
            GameMode::Gp => "gp",
            GameMode::Ta => "ta",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            GameMode::Bm => "Battle Mode",
            GameMode::Mr => "Match Race",
            GameMode::Gp => "Grand Prix",
            GameMode::Ta => "Time Attack",
        }
    }

    /// Whether the mode is played one-on-one
    pub fn is_head_to_head(self) -> bool {
        !matches!(self, GameMode::Ta)
    }

    /// Rounds (arenas, courses or races) in one qualification match
    pub fn rounds_per_match(self) -> u32 {
        match self {
            GameMode::Bm | GameMode::Mr => 4,
            GameMode::Gp => 5,
            GameMode::Ta => 0,
        }
    }

    /// Round wins needed to take a finals match, if the mode is a race-to format
    pub fn finals_race_to(self) -> Option<u32> {
        match self {
            GameMode::Bm | GameMode::Mr => Some(5),
            GameMode::Gp | GameMode::Ta => None,
        }
    }

    /// Validate a reported score.
    ///
    /// When round-level results are given the score must match what they
    /// add up to. Qualification scores in Battle Mode and Match Race cannot
    /// exceed the number of rounds in a match. Finals scores cannot be tied.
    pub fn validate_score(
        self,
        stage: Stage,
        score1: u32,
        score2: u32,
        rounds: &[RoundResult],
    ) -> Result<(), ScoreError> {
        if !self.is_head_to_head() {
            return Err(ScoreError::NotHeadToHead(self));
        }

        if !rounds.is_empty() {
            let derived = self.derive_score(rounds)?;
            if derived != (score1, score2) {
                return Err(ScoreError::RoundsMismatch {
                    reported: (score1, score2),
                    derived,
                });
            }
        }

        if stage == Stage::Qualification && matches!(self, GameMode::Bm | GameMode::Mr) {
            let max = self.rounds_per_match();
            if score1 + score2 > max {
                return Err(ScoreError::TooManyRounds { max });
            }
        }

        if stage == Stage::Finals && score1 == score2 {
            return Err(ScoreError::TiedFinal(score1));
        }

        if stage == Stage::Finals
            && let Some(race_to) = self.finals_race_to()
            && (score1 > race_to || score2 > race_to)
        {
            return Err(ScoreError::AboveRaceTo { race_to });
        }

        Ok(())
    }

    /// Add up round-level results into a match score
    pub fn derive_score(self, rounds: &[RoundResult]) -> Result<(u32, u32), ScoreError> {
        let mut score = (0, 0);
        for round in rounds {
            match (self, round) {
                (GameMode::Bm, RoundResult::Arena { winner, .. })
                | (GameMode::Mr, RoundResult::Course { winner, .. }) => match winner {
                    RoundWinner::Player1 => score.0 += 1,
                    RoundWinner::Player2 => score.1 += 1,
                    RoundWinner::Tie => {}
                },
                (
                    GameMode::Gp,
                    RoundResult::Race {
                        position1,
                        position2,
                        ..
                    },
                ) => {
                    if *position1 == *position2 {
                        return Err(ScoreError::SharedPosition(*position1));
                    }
                    score.0 += driver_points(*position1)?;
                    score.1 += driver_points(*position2)?;
                }
                _ => return Err(ScoreError::WrongRoundKind(self)),
            }
        }
        Ok(score)
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for GameMode {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bm" => Ok(GameMode::Bm),
            "mr" => Ok(GameMode::Mr),
            "gp" => Ok(GameMode::Gp),
            "ta" => Ok(GameMode::Ta),
            other => Err(ScoreError::UnknownMode(other.to_string())),
        }
    }
}

/// Tournament stage a match belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Qualification,
    Finals,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Qualification => "qualification",
            Stage::Finals => "finals",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "qualification" => Some(Stage::Qualification),
            "finals" => Some(Stage::Finals),
            _ => None,
        }
    }
}

/// Who took a single arena or course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundWinner {
    Player1,
    Player2,
    Tie,
}

/// Round-level sub-result stored with a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundResult {
    /// Battle Mode arena
    Arena { arena: String, winner: RoundWinner },
    /// Match Race course
    Course { course: String, winner: RoundWinner },
    /// Grand Prix race with both finishing positions
    Race {
        course: String,
        position1: u8,
        position2: u8,
    },
}

/// Driver points for a Grand Prix finishing position (1-based)
pub fn driver_points(position: u8) -> Result<u32, ScoreError> {
    if position == 0 || position > GP_MAX_POSITION {
        return Err(ScoreError::InvalidPosition(position));
    }
    Ok(GP_DRIVER_POINTS
        .get(usize::from(position) - 1)
        .copied()
        .unwrap_or(0))
}

/// Qualification points for one side of a finished match
pub fn match_points(own: u32, other: u32) -> i32 {
    match own.cmp(&other) {
        std::cmp::Ordering::Greater => POINTS_WIN,
        std::cmp::Ordering::Equal => POINTS_TIE,
        std::cmp::Ordering::Less => POINTS_LOSS,
    }
}

/// Score validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("Unknown game mode: {0}")]
    UnknownMode(String),

    #[error("Mode {0} has no head-to-head matches")]
    NotHeadToHead(GameMode),

    #[error("Round results do not belong to mode {0}")]
    WrongRoundKind(GameMode),

    #[error("Reported score {reported:?} does not match round results {derived:?}")]
    RoundsMismatch {
        reported: (u32, u32),
        derived: (u32, u32),
    },

    #[error("A qualification match has at most {max} rounds")]
    TooManyRounds { max: u32 },

    #[error("Finals matches are played to {race_to}")]
    AboveRaceTo { race_to: u32 },

    #[error("Invalid finishing position: {0}")]
    InvalidPosition(u8),

    #[error("Both players cannot finish in position {0}")]
    SharedPosition(u8),

    #[error("A finals match needs a winner, {0}-{0} is a tie")]
    TiedFinal(u32),
}
