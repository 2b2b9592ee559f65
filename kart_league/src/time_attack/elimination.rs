//! Time Attack elimination phase.
//!
//! Players enter in qualification order. Every round is one course; the
//! slowest `eliminate_per_round` players drop out until one is left. A
//! missing time counts as did-not-finish and ranks after every finisher.
//! Equal times and DNFs are ordered by seed, so the better seed survives a
//! tie at the cut.

use super::models::{EliminationRound, RoundTime, TaEntrant, TaError, TaResult};
use crate::bracket::{Placement, PlayerId};
use std::collections::HashSet;

/// Replayable elimination phase state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliminationPhase {
    entrants: Vec<TaEntrant>,
    eliminate_per_round: usize,
    remaining: Vec<PlayerId>,
    rounds: Vec<EliminationRound>,
}

impl EliminationPhase {
    /// Start a phase from seeded entrants
    pub fn new(mut entrants: Vec<TaEntrant>, eliminate_per_round: usize) -> TaResult<Self> {
        if entrants.len() < 2 {
            return Err(TaError::TooFewEntrants(entrants.len()));
        }
        if eliminate_per_round == 0 {
            return Err(TaError::InvalidEliminationCount);
        }
        let mut seen = HashSet::new();
        for entrant in &entrants {
            if !seen.insert(entrant.player_id) {
                return Err(TaError::DuplicateEntrant(entrant.player_id));
            }
        }

        entrants.sort_by_key(|e| (e.seed, e.player_id));
        let remaining = entrants.iter().map(|e| e.player_id).collect();
        Ok(Self {
            entrants,
            eliminate_per_round,
            remaining,
            rounds: Vec::new(),
        })
    }

    /// Rebuild a phase by replaying stored rounds
    pub fn replay(
        entrants: Vec<TaEntrant>,
        eliminate_per_round: usize,
        rounds: &[EliminationRound],
    ) -> TaResult<Self> {
        let mut phase = Self::new(entrants, eliminate_per_round)?;
        for round in rounds {
            let times: Vec<RoundTime> = round
                .times
                .iter()
                .copied()
                .filter(|t| t.time_ms.is_some())
                .collect();
            phase.submit_round(&round.course, &times)?;
        }
        Ok(phase)
    }

    pub fn entrants(&self) -> &[TaEntrant] {
        &self.entrants
    }

    pub fn eliminate_per_round(&self) -> usize {
        self.eliminate_per_round
    }

    /// Players still in, in seed order
    pub fn remaining(&self) -> &[PlayerId] {
        &self.remaining
    }

    pub fn rounds(&self) -> &[EliminationRound] {
        &self.rounds
    }

    pub fn is_finished(&self) -> bool {
        self.remaining.len() == 1
    }

    pub fn winner(&self) -> Option<PlayerId> {
        if self.is_finished() {
            self.remaining.first().copied()
        } else {
            None
        }
    }

    fn seed_of(&self, player_id: PlayerId) -> u32 {
        self.entrants
            .iter()
            .find(|e| e.player_id == player_id)
            .map(|e| e.seed)
            .unwrap_or(u32::MAX)
    }

    /// Play one round.
    ///
    /// `times` holds finished times; remaining players without an entry
    /// are recorded as DNF.
    pub fn submit_round(&mut self, course: &str, times: &[RoundTime]) -> TaResult<&EliminationRound> {
        if self.is_finished() {
            return Err(TaError::PhaseFinished);
        }

        let mut submitted: HashSet<PlayerId> = HashSet::new();
        for time in times {
            if !self.entrants.iter().any(|e| e.player_id == time.player_id) {
                return Err(TaError::UnknownPlayer(time.player_id));
            }
            if !self.remaining.contains(&time.player_id) {
                return Err(TaError::AlreadyEliminated(time.player_id));
            }
            if !submitted.insert(time.player_id) {
                return Err(TaError::DuplicateTime(time.player_id));
            }
            if time.time_ms == Some(0) {
                return Err(TaError::InvalidTime(format!(
                    "zero time for player {}",
                    time.player_id
                )));
            }
        }

        let mut ordered: Vec<RoundTime> = self
            .remaining
            .iter()
            .map(|&player_id| {
                times
                    .iter()
                    .find(|t| t.player_id == player_id)
                    .copied()
                    .unwrap_or(RoundTime {
                        player_id,
                        time_ms: None,
                    })
            })
            .collect();
        ordered.sort_by_key(|t| {
            (
                t.time_ms.is_none(),
                t.time_ms.unwrap_or(u32::MAX),
                self.seed_of(t.player_id),
            )
        });

        let cut = self.eliminate_per_round.min(ordered.len() - 1);
        let survivors = ordered.len() - cut;
        let eliminated: Vec<PlayerId> = ordered[survivors..].iter().map(|t| t.player_id).collect();

        self.remaining.retain(|p| !eliminated.contains(p));
        let round = EliminationRound {
            round: self.rounds.len() as u32 + 1,
            course: course.to_string(),
            times: ordered,
            eliminated,
        };
        log::info!(
            "TA round {} on {}: eliminated {:?}, {} remaining",
            round.round,
            round.course,
            round.eliminated,
            self.remaining.len()
        );
        self.rounds.push(round);

        self.rounds.last().ok_or(TaError::PhaseFinished)
    }

    /// Placements of eliminated players, plus the winner once finished.
    ///
    /// Later eliminations place better; inside a round the faster time
    /// places better.
    pub fn placements(&self) -> Vec<Placement> {
        let mut placements = Vec::new();
        let mut place = 1u32;
        if let Some(winner) = self.winner() {
            placements.push(Placement {
                player_id: winner,
                place,
            });
        }
        place += self.remaining.len() as u32;
        for round in self.rounds.iter().rev() {
            for &player_id in &round.eliminated {
                placements.push(Placement { player_id, place });
                place += 1;
            }
        }
        placements
    }

    /// Round in which a player was eliminated
    pub fn eliminated_in(&self, player_id: PlayerId) -> Option<u32> {
        self.rounds
            .iter()
            .find(|r| r.eliminated.contains(&player_id))
            .map(|r| r.round)
    }
}
