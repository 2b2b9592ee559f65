//! Eight-player double elimination.
//!
//! The match table is fixed:
//!
//! ```text
//! Winners QF   M1 (1v8)  M2 (4v5)  M3 (2v7)  M4 (3v6)
//! Winners SF   M5 (W1 v W2)        M6 (W3 v W4)
//! Winners F    M7 (W5 v W6)
//! Losers R1    M8 (L1 v L2)        M9 (L3 v L4)
//! Losers R2    M10 (W8 v L6)       M11 (W9 v L5)
//! Losers SF    M12 (W10 v W11)
//! Losers F     M13 (W12 v L7)
//! Grand Final  M14 (W7 v W13)
//! GF Reset     M15 (only if W13 wins M14)
//! ```

use super::{
    BracketSystem,
    errors::{BracketError, BracketResult},
    models::{
        BracketMatch, BracketSide, Placement, PlayerId, Route, Slot, SlotUpdate, check_playable,
        commit, find, plan_route,
    },
    seeding::first_round_pairs,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Number of players in a double elimination bracket
pub const DOUBLE_ELIMINATION_SIZE: usize = 8;

/// Grand final match number
pub const GRAND_FINAL: u32 = 14;

/// Grand final reset match number
pub const GRAND_FINAL_RESET: u32 = 15;

/// Total number of matches, reset included
pub const MATCH_COUNT: u32 = 15;

/// Winner and loser routing for every match except the grand final.
const fn routes(number: u32) -> Option<(Route, Route)> {
    use Route::{Out, To};
    use Slot::{One, Two};

    let table = match number {
        1 => (To { number: 5, slot: One }, To { number: 8, slot: One }),
        2 => (To { number: 5, slot: Two }, To { number: 8, slot: Two }),
        3 => (To { number: 6, slot: One }, To { number: 9, slot: One }),
        4 => (To { number: 6, slot: Two }, To { number: 9, slot: Two }),
        5 => (To { number: 7, slot: One }, To { number: 11, slot: Two }),
        6 => (To { number: 7, slot: Two }, To { number: 10, slot: Two }),
        7 => (To { number: 14, slot: One }, To { number: 13, slot: Two }),
        8 => (To { number: 10, slot: One }, Out { placement: 7 }),
        9 => (To { number: 11, slot: One }, Out { placement: 7 }),
        10 => (To { number: 12, slot: One }, Out { placement: 5 }),
        11 => (To { number: 12, slot: Two }, Out { placement: 5 }),
        12 => (To { number: 13, slot: One }, Out { placement: 4 }),
        13 => (To { number: 14, slot: Two }, Out { placement: 3 }),
        15 => (Out { placement: 1 }, Out { placement: 2 }),
        _ => return None,
    };
    Some(table)
}

fn round_label(number: u32) -> (BracketSide, &'static str) {
    match number {
        1..=4 => (BracketSide::Winners, "Winners Quarterfinal"),
        5 | 6 => (BracketSide::Winners, "Winners Semifinal"),
        7 => (BracketSide::Winners, "Winners Final"),
        8 | 9 => (BracketSide::Losers, "Losers Round 1"),
        10 | 11 => (BracketSide::Losers, "Losers Round 2"),
        12 => (BracketSide::Losers, "Losers Semifinal"),
        13 => (BracketSide::Losers, "Losers Final"),
        GRAND_FINAL => (BracketSide::GrandFinal, "Grand Final"),
        _ => (BracketSide::GrandFinal, "Grand Final Reset"),
    }
}

/// Eight-player double elimination bracket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleElimination {
    matches: Vec<BracketMatch>,
}

impl DoubleElimination {
    /// Build the bracket from players ordered by seed (best first)
    pub fn generate(seeds: &[PlayerId]) -> BracketResult<Self> {
        if seeds.len() != DOUBLE_ELIMINATION_SIZE {
            return Err(BracketError::UnsupportedSize {
                size: seeds.len(),
                reason: format!("double elimination needs exactly {DOUBLE_ELIMINATION_SIZE} players"),
            });
        }
        check_unique(seeds)?;

        let mut matches: Vec<BracketMatch> = (1..=MATCH_COUNT)
            .map(|number| {
                let (side, label) = round_label(number);
                BracketMatch::new(number, side, label)
            })
            .collect();

        for (index, (high, low)) in first_round_pairs(DOUBLE_ELIMINATION_SIZE)?
            .into_iter()
            .enumerate()
        {
            matches[index].player1 = Some(seeds[high - 1]);
            matches[index].player2 = Some(seeds[low - 1]);
        }

        Ok(Self { matches })
    }

    /// Rebuild a bracket from persisted matches
    pub fn from_matches(mut matches: Vec<BracketMatch>) -> BracketResult<Self> {
        matches.sort_by_key(|m| m.number);
        let numbers: Vec<u32> = matches.iter().map(|m| m.number).collect();
        if numbers != (1..=MATCH_COUNT).collect::<Vec<_>>() {
            return Err(BracketError::Corrupt(format!(
                "expected matches 1..={MATCH_COUNT}, found {numbers:?}"
            )));
        }
        Ok(Self { matches })
    }

    /// Whether the grand final reset has to be played
    pub fn reset_required(&self) -> bool {
        self.matches
            .iter()
            .find(|m| m.number == GRAND_FINAL)
            .and_then(BracketMatch::winner_slot)
            == Some(Slot::Two)
    }

    /// Grand final: a win by the losers-bracket finalist forces a reset
    fn plan_grand_final(
        &self,
        score1: u32,
        score2: u32,
        updates: &mut Vec<SlotUpdate>,
    ) -> BracketResult<()> {
        let grand_final = find(&self.matches, GRAND_FINAL)?;
        let reset = find(&self.matches, GRAND_FINAL_RESET)?;

        if score1 > score2 {
            if reset.player1.is_none() && reset.player2.is_none() {
                return Ok(());
            }
            if reset.completed {
                return Err(BracketError::DownstreamCompleted {
                    source_match: GRAND_FINAL,
                    downstream: GRAND_FINAL_RESET,
                });
            }
            for slot in [Slot::One, Slot::Two] {
                updates.push(SlotUpdate {
                    match_number: GRAND_FINAL_RESET,
                    slot,
                    player: None,
                });
            }
            return Ok(());
        }

        for slot in [Slot::One, Slot::Two] {
            if let Some(player) = grand_final.player(slot) {
                plan_route(
                    &self.matches,
                    GRAND_FINAL,
                    Route::To {
                        number: GRAND_FINAL_RESET,
                        slot,
                    },
                    player,
                    updates,
                )?;
            }
        }
        Ok(())
    }
}

impl BracketSystem for DoubleElimination {
    fn matches(&self) -> &[BracketMatch] {
        &self.matches
    }

    fn record_result(
        &mut self,
        number: u32,
        score1: u32,
        score2: u32,
    ) -> BracketResult<Vec<SlotUpdate>> {
        check_playable(&self.matches, number, score1, score2)?;

        let mut updates = Vec::new();
        if number == GRAND_FINAL {
            self.plan_grand_final(score1, score2, &mut updates)?;
        } else {
            let (win_route, lose_route) =
                routes(number).ok_or(BracketError::UnknownMatch(number))?;
            let m = find(&self.matches, number)?;
            let (winner_slot, loser_slot) = if score1 > score2 {
                (Slot::One, Slot::Two)
            } else {
                (Slot::Two, Slot::One)
            };
            let winner = m.player(winner_slot).ok_or(BracketError::SlotsNotFilled(number))?;
            let loser = m.player(loser_slot).ok_or(BracketError::SlotsNotFilled(number))?;
            plan_route(&self.matches, number, win_route, winner, &mut updates)?;
            plan_route(&self.matches, number, lose_route, loser, &mut updates)?;
        }

        commit(&mut self.matches, number, score1, score2, &updates)?;

        // Clearing the reset slots also wipes a stale reset score
        if updates
            .iter()
            .any(|u| u.match_number == GRAND_FINAL_RESET && u.player.is_none())
            && let Some(reset) = self
                .matches
                .iter_mut()
                .find(|m| m.number == GRAND_FINAL_RESET)
        {
            reset.clear();
        }

        Ok(updates)
    }

    fn is_finished(&self) -> bool {
        self.champion().is_some()
    }

    fn champion(&self) -> Option<PlayerId> {
        let grand_final = self.matches.iter().find(|m| m.number == GRAND_FINAL)?;
        match grand_final.winner_slot()? {
            Slot::One => grand_final.winner(),
            Slot::Two => self
                .matches
                .iter()
                .find(|m| m.number == GRAND_FINAL_RESET)
                .and_then(BracketMatch::winner),
        }
    }

    fn placements(&self) -> Vec<Placement> {
        let mut placements = Vec::new();

        for m in &self.matches {
            if let (Some(loser), Some((_, Route::Out { placement }))) = (m.loser(), routes(m.number))
                && m.number != GRAND_FINAL_RESET
            {
                placements.push(Placement {
                    player_id: loser,
                    place: placement,
                });
            }
        }

        if let Some(champion) = self.champion() {
            let grand_final = self.matches.iter().find(|m| m.number == GRAND_FINAL);
            if let Some(runner_up) = grand_final
                .and_then(|m| [m.player1, m.player2].into_iter().flatten().find(|p| *p != champion))
            {
                placements.push(Placement {
                    player_id: runner_up,
                    place: 2,
                });
            }
            placements.push(Placement {
                player_id: champion,
                place: 1,
            });
        }

        placements.sort_by_key(|p| (p.place, p.player_id));
        placements
    }
}

pub(crate) fn check_unique(seeds: &[PlayerId]) -> BracketResult<()> {
    let mut seen = HashSet::with_capacity(seeds.len());
    for &player in seeds {
        if !seen.insert(player) {
            return Err(BracketError::DuplicateSeed(player));
        }
    }
    Ok(())
}
