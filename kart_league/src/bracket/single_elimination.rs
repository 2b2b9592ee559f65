//! Single elimination for power-of-two fields.

use super::{
    BracketSystem,
    double_elimination::check_unique,
    errors::{BracketError, BracketResult},
    models::{
        BracketMatch, BracketSide, Placement, PlayerId, Route, Slot, SlotUpdate, check_playable,
        commit, find, plan_route,
    },
    seeding::first_round_pairs,
};
use serde::{Deserialize, Serialize};

/// Single elimination bracket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleElimination {
    size: usize,
    third_place_match: bool,
    matches: Vec<BracketMatch>,
}

fn round_label(matches_in_round: usize, round: usize) -> String {
    match matches_in_round {
        1 => "Final".to_string(),
        2 => "Semifinal".to_string(),
        4 => "Quarterfinal".to_string(),
        8 => "Round of 16".to_string(),
        _ => format!("Round {round}"),
    }
}

impl SingleElimination {
    /// Build the bracket from players ordered by seed (best first)
    pub fn generate(seeds: &[PlayerId], third_place_match: bool) -> BracketResult<Self> {
        let size = seeds.len();
        let pairs = first_round_pairs(size)?;
        check_unique(seeds)?;

        let mut matches = Vec::with_capacity(size);
        let mut number = 1;
        let mut round = 1;
        let mut in_round = size / 2;
        while in_round >= 1 {
            for _ in 0..in_round {
                matches.push(BracketMatch::new(
                    number,
                    BracketSide::Single,
                    round_label(in_round, round),
                ));
                number += 1;
            }
            in_round /= 2;
            round += 1;
        }
        if third_place_match && size >= 4 {
            matches.push(BracketMatch::new(number, BracketSide::Single, "Third Place"));
        }

        for (index, (high, low)) in pairs.into_iter().enumerate() {
            matches[index].player1 = Some(seeds[high - 1]);
            matches[index].player2 = Some(seeds[low - 1]);
        }

        Ok(Self {
            size,
            third_place_match: third_place_match && size >= 4,
            matches,
        })
    }

    /// Rebuild a bracket from persisted matches
    pub fn from_matches(mut matches: Vec<BracketMatch>) -> BracketResult<Self> {
        matches.sort_by_key(|m| m.number);
        let third_place_match = matches.iter().any(|m| m.round == "Third Place");
        let main_matches = matches.len() - usize::from(third_place_match);
        let size = main_matches + 1;
        if size < 2 || !size.is_power_of_two() {
            return Err(BracketError::Corrupt(format!(
                "{} matches do not form a single elimination bracket",
                matches.len()
            )));
        }
        if matches
            .iter()
            .enumerate()
            .any(|(index, m)| m.number as usize != index + 1)
        {
            return Err(BracketError::Corrupt("match numbers are not contiguous".to_string()));
        }
        Ok(Self {
            size,
            third_place_match,
            matches,
        })
    }

    /// Number of the final
    pub fn final_number(&self) -> u32 {
        (self.size - 1) as u32
    }

    fn third_place_number(&self) -> Option<u32> {
        self.third_place_match.then(|| self.size as u32)
    }

    /// 0-based round index and position of a main-bracket match
    fn locate(&self, number: u32) -> Option<(usize, usize)> {
        let mut first = 1usize;
        let mut in_round = self.size / 2;
        let mut round = 0;
        while in_round >= 1 {
            let n = number as usize;
            if n >= first && n < first + in_round {
                return Some((round, n - first));
            }
            first += in_round;
            in_round /= 2;
            round += 1;
        }
        None
    }

    fn routes(&self, number: u32) -> Option<(Route, Route)> {
        if Some(number) == self.third_place_number() {
            return Some((Route::Out { placement: 3 }, Route::Out { placement: 4 }));
        }
        let (round, position) = self.locate(number)?;
        let in_round = self.size >> (round + 1);
        if in_round == 1 {
            return Some((Route::Out { placement: 1 }, Route::Out { placement: 2 }));
        }

        let first_of_next: usize = (0..=round).map(|r| self.size >> (r + 1)).sum::<usize>() + 1;
        let slot = if position % 2 == 0 { Slot::One } else { Slot::Two };
        let winner = Route::To {
            number: (first_of_next + position / 2) as u32,
            slot,
        };

        let loser = match self.third_place_number() {
            Some(third) if in_round == 2 => Route::To {
                number: third,
                slot,
            },
            _ => Route::Out {
                placement: (in_round + 1) as u32,
            },
        };
        Some((winner, loser))
    }
}

impl BracketSystem for SingleElimination {
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
        let (win_route, lose_route) = self
            .routes(number)
            .ok_or(BracketError::UnknownMatch(number))?;

        let m = find(&self.matches, number)?;
        let (winner_slot, loser_slot) = if score1 > score2 {
            (Slot::One, Slot::Two)
        } else {
            (Slot::Two, Slot::One)
        };
        let winner = m.player(winner_slot).ok_or(BracketError::SlotsNotFilled(number))?;
        let loser = m.player(loser_slot).ok_or(BracketError::SlotsNotFilled(number))?;

        let mut updates = Vec::new();
        plan_route(&self.matches, number, win_route, winner, &mut updates)?;
        plan_route(&self.matches, number, lose_route, loser, &mut updates)?;
        commit(&mut self.matches, number, score1, score2, &updates)?;
        Ok(updates)
    }

    fn is_finished(&self) -> bool {
        let final_done = self
            .matches
            .iter()
            .any(|m| m.number == self.final_number() && m.completed);
        let third_done = match self.third_place_number() {
            Some(third) => self.matches.iter().any(|m| m.number == third && m.completed),
            None => true,
        };
        final_done && third_done
    }

    fn champion(&self) -> Option<PlayerId> {
        self.matches
            .iter()
            .find(|m| m.number == self.final_number())
            .and_then(BracketMatch::winner)
    }

    fn placements(&self) -> Vec<Placement> {
        let mut placements = Vec::new();
        for m in &self.matches {
            let Some((win_route, lose_route)) = self.routes(m.number) else {
                continue;
            };
            if let (Route::Out { placement }, Some(winner)) = (win_route, m.winner()) {
                placements.push(Placement {
                    player_id: winner,
                    place: placement,
                });
            }
            if let (Route::Out { placement }, Some(loser)) = (lose_route, m.loser()) {
                placements.push(Placement {
                    player_id: loser,
                    place: placement,
                });
            }
        }
        placements.sort_by_key(|p| (p.place, p.player_id));
        placements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(b: &SingleElimination, number: u32) -> (Option<PlayerId>, Option<PlayerId>) {
        let m = find(b.matches(), number).unwrap();
        (m.player1, m.player2)
    }

    #[test]
    fn test_generate_eight() {
        let b = SingleElimination::generate(&(1..=8).collect::<Vec<_>>(), false).unwrap();
        assert_eq!(b.matches().len(), 7);
        assert_eq!(players(&b, 1), (Some(1), Some(8)));
        assert_eq!(players(&b, 4), (Some(3), Some(6)));
        assert_eq!(b.matches()[4].round, "Semifinal");
        assert_eq!(b.matches()[6].round, "Final");
        assert_eq!(b.final_number(), 7);
    }

    #[test]
    fn test_generate_with_third_place() {
        let b = SingleElimination::generate(&(1..=4).collect::<Vec<_>>(), true).unwrap();
        assert_eq!(b.matches().len(), 4);
        assert_eq!(b.matches()[3].round, "Third Place");
    }

    #[test]
    fn test_generate_rejects_odd_field() {
        assert!(SingleElimination::generate(&[1, 2, 3], false).is_err());
    }

    #[test]
    fn test_advancement_to_final() {
        let mut b = SingleElimination::generate(&(1..=8).collect::<Vec<_>>(), false).unwrap();
        b.record_result(1, 3, 0).unwrap();
        b.record_result(2, 0, 3).unwrap();
        b.record_result(3, 3, 1).unwrap();
        b.record_result(4, 3, 2).unwrap();
        assert_eq!(players(&b, 5), (Some(1), Some(5)));
        assert_eq!(players(&b, 6), (Some(2), Some(3)));

        b.record_result(5, 3, 1).unwrap();
        b.record_result(6, 1, 3).unwrap();
        assert_eq!(players(&b, 7), (Some(1), Some(3)));
        assert!(!b.is_finished());

        b.record_result(7, 2, 3).unwrap();
        assert!(b.is_finished());
        assert_eq!(b.champion(), Some(3));

        let places: Vec<(PlayerId, u32)> =
            b.placements().iter().map(|p| (p.player_id, p.place)).collect();
        assert_eq!(places[0], (3, 1));
        assert_eq!(places[1], (1, 2));
        assert_eq!(places.len(), 8);
        assert_eq!(places.iter().filter(|(_, place)| *place == 3).count(), 2);
        assert_eq!(places.iter().filter(|(_, place)| *place == 5).count(), 4);
    }

    #[test]
    fn test_third_place_match_receives_semifinal_losers() {
        let mut b = SingleElimination::generate(&[10, 20, 30, 40], true).unwrap();
        // 10 v 40, 20 v 30
        b.record_result(1, 3, 0).unwrap();
        b.record_result(2, 0, 3).unwrap();
        assert_eq!(players(&b, 4), (Some(40), Some(20)));

        b.record_result(3, 3, 2).unwrap();
        assert!(!b.is_finished());
        b.record_result(4, 1, 3).unwrap();
        assert!(b.is_finished());

        let places: Vec<(PlayerId, u32)> =
            b.placements().iter().map(|p| (p.player_id, p.place)).collect();
        assert_eq!(places, vec![(10, 1), (30, 2), (20, 3), (40, 4)]);
    }

    #[test]
    fn test_sixteen_players_with_third_place() {
        let mut b = SingleElimination::generate(&(1..=16).collect::<Vec<_>>(), true).unwrap();
        assert_eq!(b.matches().len(), 16);
        assert_eq!(b.matches()[0].round, "Round of 16");
        assert_eq!(b.matches()[8].round, "Quarterfinal");
        assert_eq!(b.matches()[12].round, "Semifinal");
        assert_eq!(b.matches()[15].round, "Third Place");
        assert_eq!(b.final_number(), 15);
        assert_eq!(players(&b, 1), (Some(1), Some(16)));

        for number in 1..=16 {
            b.record_result(number, 3, 1).unwrap();
        }
        assert!(b.is_finished());
        assert_eq!(b.champion(), Some(1));

        let placements = b.placements();
        assert_eq!(placements.len(), 16);
        let count = |place: u32| placements.iter().filter(|p| p.place == place).count();
        assert_eq!([count(1), count(2), count(3), count(4)], [1, 1, 1, 1]);
        assert_eq!(count(5), 4);
        assert_eq!(count(9), 8);
    }

    #[test]
    fn test_correction_blocked_once_final_played() {
        let mut b = SingleElimination::generate(&(1..=8).collect::<Vec<_>>(), true).unwrap();
        for number in 1..=6 {
            b.record_result(number, 3, 1).unwrap();
        }
        assert_eq!(players(&b, 5), (Some(1), Some(4)));
        // Same winner with a new score moves nobody
        assert_eq!(b.record_result(5, 3, 2).unwrap(), Vec::new());

        b.record_result(7, 3, 0).unwrap();
        let before = b.clone();
        assert_eq!(
            b.record_result(5, 0, 3),
            Err(BracketError::DownstreamCompleted {
                source_match: 5,
                downstream: 7
            })
        );
        assert_eq!(b, before);

        // The final itself routes nowhere and can still be corrected
        b.record_result(7, 1, 3).unwrap();
        assert_eq!(b.champion(), Some(2));
    }

    #[test]
    fn test_correction_blocked_once_third_place_played() {
        let mut b = SingleElimination::generate(&(1..=8).collect::<Vec<_>>(), true).unwrap();
        for number in 1..=6 {
            b.record_result(number, 3, 1).unwrap();
        }
        assert_eq!(players(&b, 8), (Some(4), Some(3)));
        b.record_result(8, 3, 0).unwrap();

        let before = b.clone();
        assert_eq!(
            b.record_result(5, 0, 3),
            Err(BracketError::DownstreamCompleted {
                source_match: 5,
                downstream: 8
            })
        );
        assert_eq!(b, before);
        assert_eq!(players(&b, 7), (Some(1), Some(2)));
    }

    #[test]
    fn test_from_matches() {
        let mut b = SingleElimination::generate(&[10, 20, 30, 40], true).unwrap();
        b.record_result(1, 3, 0).unwrap();
        let rebuilt = SingleElimination::from_matches(b.matches().to_vec()).unwrap();
        assert_eq!(rebuilt, b);

        assert!(SingleElimination::from_matches(b.matches()[..2].to_vec()).is_err());
    }
}
