//! Bracket engine for the finals stage.
//!
//! Brackets are plain data: a list of [`BracketMatch`] rows plus the fixed
//! routing rules of the format. Recording a result validates the score,
//! marks the match completed and writes the winner (and, in double
//! elimination, the loser) into the slots of the matches they feed. The
//! engine never touches the database; the finals service loads the rows,
//! runs the engine and persists whatever changed.
//!
//! ## Example
//!
//! ```
//! use kart_league::bracket::{Bracket, BracketSystem, DoubleElimination};
//!
//! let seeds: Vec<i64> = (1..=8).collect();
//! let mut bracket: Bracket = DoubleElimination::generate(&seeds).unwrap().into();
//!
//! // Seed 1 beats seed 8 and moves on to the winners semifinal
//! let updates = bracket.record_result(1, 5, 2).unwrap();
//! assert_eq!(updates.len(), 2);
//! assert!(!bracket.is_finished());
//! ```

pub mod double_elimination;
pub mod errors;
pub mod models;
pub mod seeding;
pub mod single_elimination;

pub use double_elimination::{DoubleElimination, GRAND_FINAL, GRAND_FINAL_RESET};
pub use errors::{BracketError, BracketResult};
pub use models::{
    BracketFormat, BracketMatch, BracketSide, Placement, PlayerId, Route, Slot, SlotUpdate,
};
pub use seeding::seed_order;
pub use single_elimination::SingleElimination;

use enum_dispatch::enum_dispatch;

/// Behaviour shared by every bracket format
#[enum_dispatch]
pub trait BracketSystem {
    /// All matches ordered by match number
    fn matches(&self) -> &[BracketMatch];

    /// Record a result and advance players.
    ///
    /// Returns the slots that were written in other matches.
    fn record_result(
        &mut self,
        number: u32,
        score1: u32,
        score2: u32,
    ) -> BracketResult<Vec<SlotUpdate>>;

    fn is_finished(&self) -> bool;

    fn champion(&self) -> Option<PlayerId>;

    /// Placements known so far (all of them once the bracket is finished)
    fn placements(&self) -> Vec<Placement>;
}

/// A bracket of any supported format
#[enum_dispatch(BracketSystem)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bracket {
    DoubleElimination,
    SingleElimination,
}

impl Bracket {
    /// Generate a bracket from players ordered by seed
    pub fn generate(format: BracketFormat, seeds: &[PlayerId]) -> BracketResult<Self> {
        match format {
            BracketFormat::DoubleElimination => Ok(DoubleElimination::generate(seeds)?.into()),
            BracketFormat::SingleElimination => {
                Ok(SingleElimination::generate(seeds, true)?.into())
            }
        }
    }

    /// Rebuild a bracket from persisted matches
    pub fn from_matches(format: BracketFormat, matches: Vec<BracketMatch>) -> BracketResult<Self> {
        match format {
            BracketFormat::DoubleElimination => {
                Ok(DoubleElimination::from_matches(matches)?.into())
            }
            BracketFormat::SingleElimination => {
                Ok(SingleElimination::from_matches(matches)?.into())
            }
        }
    }

    pub fn format(&self) -> BracketFormat {
        match self {
            Bracket::DoubleElimination(_) => BracketFormat::DoubleElimination,
            Bracket::SingleElimination(_) => BracketFormat::SingleElimination,
        }
    }

    /// Detect the format of persisted matches from their bracket sides
    pub fn detect_format(matches: &[BracketMatch]) -> BracketFormat {
        if matches.iter().any(|m| m.side != BracketSide::Single) {
            BracketFormat::DoubleElimination
        } else {
            BracketFormat::SingleElimination
        }
    }

    /// Number of players the format seeds
    pub fn size_for(format: BracketFormat) -> usize {
        match format {
            BracketFormat::DoubleElimination => double_elimination::DOUBLE_ELIMINATION_SIZE,
            BracketFormat::SingleElimination => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_through_enum() {
        let seeds: Vec<PlayerId> = (1..=8).collect();
        let mut double = Bracket::generate(BracketFormat::DoubleElimination, &seeds).unwrap();
        let mut single = Bracket::generate(BracketFormat::SingleElimination, &seeds).unwrap();

        assert_eq!(double.matches().len(), 15);
        assert_eq!(single.matches().len(), 8);
        assert_eq!(double.format(), BracketFormat::DoubleElimination);
        assert_eq!(single.format(), BracketFormat::SingleElimination);

        assert!(double.record_result(1, 5, 0).is_ok());
        assert!(single.record_result(1, 3, 0).is_ok());
    }

    #[test]
    fn test_detect_format() {
        let seeds: Vec<PlayerId> = (1..=8).collect();
        let double = Bracket::generate(BracketFormat::DoubleElimination, &seeds).unwrap();
        let single = Bracket::generate(BracketFormat::SingleElimination, &seeds).unwrap();
        assert_eq!(
            Bracket::detect_format(double.matches()),
            BracketFormat::DoubleElimination
        );
        assert_eq!(
            Bracket::detect_format(single.matches()),
            BracketFormat::SingleElimination
        );
    }

    #[test]
    fn test_from_matches_keeps_state() {
        let seeds: Vec<PlayerId> = (1..=8).collect();
        let mut bracket = Bracket::generate(BracketFormat::DoubleElimination, &seeds).unwrap();
        bracket.record_result(3, 1, 5).unwrap();

        let rebuilt =
            Bracket::from_matches(BracketFormat::DoubleElimination, bracket.matches().to_vec())
                .unwrap();
        assert_eq!(rebuilt, bracket);
    }
}
