//! Bracket data models.

use super::errors::{BracketError, BracketResult};
use serde::{Deserialize, Serialize};

/// Player ID type
pub type PlayerId = i64;

/// Which part of a bracket a match belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketSide {
    Winners,
    Losers,
    GrandFinal,
    Single,
}

impl BracketSide {
    pub fn as_str(self) -> &'static str {
        match self {
            BracketSide::Winners => "winners",
            BracketSide::Losers => "losers",
            BracketSide::GrandFinal => "grand_final",
            BracketSide::Single => "single",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "winners" => Some(BracketSide::Winners),
            "losers" => Some(BracketSide::Losers),
            "grand_final" => Some(BracketSide::GrandFinal),
            "single" => Some(BracketSide::Single),
            _ => None,
        }
    }
}

/// Bracket format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketFormat {
    DoubleElimination,
    SingleElimination,
}

impl BracketFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            BracketFormat::DoubleElimination => "double_elimination",
            BracketFormat::SingleElimination => "single_elimination",
        }
    }
}

/// Player slot inside a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    One,
    Two,
}

/// Where a match's winner or loser goes next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Into a slot of a later match
    To { number: u32, slot: Slot },
    /// Out of the bracket with a final placement
    Out { placement: u32 },
}

/// A single bracket match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketMatch {
    /// Match number inside the bracket (1-based)
    pub number: u32,
    pub side: BracketSide,
    /// Human readable round label ("Winners Semifinal", ...)
    pub round: String,
    pub player1: Option<PlayerId>,
    pub player2: Option<PlayerId>,
    pub score1: u32,
    pub score2: u32,
    pub completed: bool,
}

impl BracketMatch {
    /// Create an empty match
    pub fn new(number: u32, side: BracketSide, round: impl Into<String>) -> Self {
        Self {
            number,
            side,
            round: round.into(),
            player1: None,
            player2: None,
            score1: 0,
            score2: 0,
            completed: false,
        }
    }

    /// Create a match with both players known
    pub fn with_players(mut self, player1: PlayerId, player2: PlayerId) -> Self {
        self.player1 = Some(player1);
        self.player2 = Some(player2);
        self
    }

    pub fn player(&self, slot: Slot) -> Option<PlayerId> {
        match slot {
            Slot::One => self.player1,
            Slot::Two => self.player2,
        }
    }

    pub(crate) fn set_player(&mut self, slot: Slot, player: Option<PlayerId>) {
        match slot {
            Slot::One => self.player1 = player,
            Slot::Two => self.player2 = player,
        }
    }

    /// Slot of the winner, if the match is completed
    pub fn winner_slot(&self) -> Option<Slot> {
        if !self.completed {
            return None;
        }
        match self.score1.cmp(&self.score2) {
            std::cmp::Ordering::Greater => Some(Slot::One),
            std::cmp::Ordering::Less => Some(Slot::Two),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner_slot().and_then(|slot| self.player(slot))
    }

    pub fn loser(&self) -> Option<PlayerId> {
        self.winner_slot().and_then(|slot| self.player(slot.other()))
    }

    /// Clear players, scores and completion
    pub(crate) fn clear(&mut self) {
        self.player1 = None;
        self.player2 = None;
        self.score1 = 0;
        self.score2 = 0;
        self.completed = false;
    }
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }
}

/// A slot written by the engine while advancing players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotUpdate {
    pub match_number: u32,
    pub slot: Slot,
    pub player: Option<PlayerId>,
}

/// Final placement of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub player_id: PlayerId,
    pub place: u32,
}

/// Look up a match by number
pub(crate) fn find(matches: &[BracketMatch], number: u32) -> BracketResult<&BracketMatch> {
    matches
        .iter()
        .find(|m| m.number == number)
        .ok_or(BracketError::UnknownMatch(number))
}

pub(crate) fn find_mut(
    matches: &mut [BracketMatch],
    number: u32,
) -> BracketResult<&mut BracketMatch> {
    matches
        .iter_mut()
        .find(|m| m.number == number)
        .ok_or(BracketError::UnknownMatch(number))
}

/// Check that a match can take a result
pub(crate) fn check_playable(
    matches: &[BracketMatch],
    number: u32,
    score1: u32,
    score2: u32,
) -> BracketResult<()> {
    let m = find(matches, number)?;
    if m.player1.is_none() || m.player2.is_none() {
        return Err(BracketError::SlotsNotFilled(number));
    }
    if score1 == score2 {
        return Err(BracketError::TiedScore(number));
    }
    Ok(())
}

/// Plan writing `player` into a routed slot.
///
/// A completed downstream match only accepts the player it already holds.
pub(crate) fn plan_route(
    matches: &[BracketMatch],
    source: u32,
    route: Route,
    player: PlayerId,
    updates: &mut Vec<SlotUpdate>,
) -> BracketResult<()> {
    if let Route::To { number, slot } = route {
        let target = find(matches, number)?;
        if target.player(slot) == Some(player) {
            return Ok(());
        }
        if target.completed {
            return Err(BracketError::DownstreamCompleted {
                source_match: source,
                downstream: number,
            });
        }
        updates.push(SlotUpdate {
            match_number: number,
            slot,
            player: Some(player),
        });
    }
    Ok(())
}

/// Store the score of a match and apply planned slot writes
pub(crate) fn commit(
    matches: &mut [BracketMatch],
    number: u32,
    score1: u32,
    score2: u32,
    updates: &[SlotUpdate],
) -> BracketResult<()> {
    {
        let m = find_mut(matches, number)?;
        m.score1 = score1;
        m.score2 = score2;
        m.completed = true;
    }
    for update in updates {
        find_mut(matches, update.match_number)?.set_player(update.slot, update.player);
    }
    Ok(())
}
