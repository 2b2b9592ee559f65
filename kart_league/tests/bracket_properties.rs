/// Property-based tests for the bracket engine, the Time Attack
/// elimination phase and qualification standings.
use kart_league::{
    bracket::{Bracket, BracketError, BracketFormat, BracketSystem, PlayerId},
    qualification::{MatchOutcome, compute_standings, round_robin, standings::GroupEntrant},
    time_attack::{EliminationPhase, RoundTime, TaEntrant},
};
use proptest::prelude::*;
use std::collections::HashSet;

// Play playable matches in number order, at most `limit` of them,
// picking winners from `coin_flips`.
fn play(bracket: &mut Bracket, coin_flips: &[bool], limit: usize) -> usize {
    let mut played = 0;
    while played < limit {
        let next = bracket
            .matches()
            .iter()
            .find(|m| !m.completed && m.player1.is_some() && m.player2.is_some())
            .map(|m| m.number);
        let Some(number) = next else {
            break;
        };
        let first_wins = coin_flips.get(played).copied().unwrap_or(true);
        let (score1, score2) = if first_wins { (5, 2) } else { (1, 5) };
        bracket.record_result(number, score1, score2).unwrap();
        played += 1;
    }
    played
}

fn play_out(bracket: &mut Bracket, coin_flips: &[bool]) -> usize {
    play(bracket, coin_flips, usize::MAX)
}

fn unique_seeds(ids: &[PlayerId]) -> bool {
    ids.iter().collect::<HashSet<_>>().len() == ids.len()
}

proptest! {
    #[test]
    fn double_elimination_always_finishes(
        seeds in prop::collection::vec(1i64..1000, 8).prop_filter("unique", |s| unique_seeds(s)),
        flips in prop::collection::vec(any::<bool>(), 15),
    ) {
        let mut bracket = Bracket::generate(BracketFormat::DoubleElimination, &seeds).unwrap();
        let played = play_out(&mut bracket, &flips);

        prop_assert!(bracket.is_finished());
        prop_assert!(played == 14 || played == 15);

        let placements = bracket.placements();
        prop_assert_eq!(placements.len(), 8);
        let placed: HashSet<PlayerId> = placements.iter().map(|p| p.player_id).collect();
        let seeded: HashSet<PlayerId> = seeds.iter().copied().collect();
        prop_assert_eq!(placed, seeded);
        prop_assert_eq!(placements[0].place, 1);
        prop_assert_eq!(Some(placements[0].player_id), bracket.champion());
    }

    #[test]
    fn single_elimination_places_everyone(
        flips in prop::collection::vec(any::<bool>(), 8),
    ) {
        let seeds: Vec<PlayerId> = (1..=8).collect();
        let mut bracket = Bracket::generate(BracketFormat::SingleElimination, &seeds).unwrap();
        let played = play_out(&mut bracket, &flips);

        prop_assert_eq!(played, 8);
        prop_assert!(bracket.is_finished());
        let places: Vec<u32> = bracket.placements().iter().map(|p| p.place).collect();
        prop_assert_eq!(places, vec![1, 2, 3, 4, 5, 5, 5, 5]);
    }

    #[test]
    fn corrections_keep_placements_complete(
        double in any::<bool>(),
        steps in prop::collection::vec((any::<bool>(), any::<u8>(), any::<bool>()), 1..40),
        flips in prop::collection::vec(any::<bool>(), 15),
    ) {
        let format = if double {
            BracketFormat::DoubleElimination
        } else {
            BracketFormat::SingleElimination
        };
        let seeds: Vec<PlayerId> = (1..=8).collect();
        let mut bracket = Bracket::generate(format, &seeds).unwrap();

        // Interleave new results with corrections of played matches
        for (correct, pick, first_wins) in steps {
            if !correct {
                play(&mut bracket, &[first_wins], 1);
                continue;
            }
            let completed: Vec<u32> = bracket
                .matches()
                .iter()
                .filter(|m| m.completed)
                .map(|m| m.number)
                .collect();
            if completed.is_empty() {
                continue;
            }
            let number = completed[pick as usize % completed.len()];
            let (score1, score2) = if first_wins { (5, 3) } else { (2, 5) };
            let before = bracket.clone();
            match bracket.record_result(number, score1, score2) {
                Ok(_) => {}
                Err(BracketError::DownstreamCompleted { source_match, .. }) => {
                    prop_assert_eq!(source_match, number);
                    prop_assert_eq!(&bracket, &before);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
        play_out(&mut bracket, &flips);

        prop_assert!(bracket.is_finished());
        let placements = bracket.placements();
        prop_assert_eq!(placements.len(), 8);
        let placed: HashSet<PlayerId> = placements.iter().map(|p| p.player_id).collect();
        let seeded: HashSet<PlayerId> = seeds.iter().copied().collect();
        prop_assert_eq!(placed, seeded);
        prop_assert_eq!(Some(placements[0].player_id), bracket.champion());
    }

    #[test]
    fn persisted_bracket_rebuilds_identically(
        flips in prop::collection::vec(any::<bool>(), 15),
        stop_after in 0usize..15,
    ) {
        let seeds: Vec<PlayerId> = (11..=18).collect();
        let mut bracket = Bracket::generate(BracketFormat::DoubleElimination, &seeds).unwrap();
        play(&mut bracket, &flips, stop_after);

        let rows = bracket.matches().to_vec();
        let format = Bracket::detect_format(&rows);
        let rebuilt = Bracket::from_matches(format, rows).unwrap();
        prop_assert_eq!(rebuilt, bracket);
    }

    #[test]
    fn elimination_phase_ends_with_one_winner(
        n in 2i64..16,
        per_round in 1usize..4,
        times in prop::collection::vec(prop::option::weighted(0.9, 30_000u32..90_000), 16),
    ) {
        let entrants: Vec<TaEntrant> = (1..=n)
            .map(|id| TaEntrant { player_id: id, seed: id as u32 })
            .collect();
        let mut phase = EliminationPhase::new(entrants, per_round).unwrap();

        let mut rounds = 0;
        while !phase.is_finished() {
            let submitted: Vec<RoundTime> = phase
                .remaining()
                .iter()
                .filter_map(|&player_id| {
                    times[player_id as usize - 1].map(|ms| RoundTime {
                        player_id,
                        time_ms: Some(ms + rounds),
                    })
                })
                .collect();
            let before = phase.remaining().len();
            phase.submit_round("Course", &submitted).unwrap();
            prop_assert!(phase.remaining().len() < before);
            prop_assert!(!phase.remaining().is_empty());
            rounds += 1;
        }

        let expected_rounds = (n as usize - 1).div_ceil(per_round);
        prop_assert_eq!(phase.rounds().len(), expected_rounds);

        let placements = phase.placements();
        prop_assert_eq!(placements.len(), n as usize);
        let places: Vec<u32> = placements.iter().map(|p| p.place).collect();
        prop_assert_eq!(places, (1..=n as u32).collect::<Vec<_>>());
        prop_assert_eq!(Some(placements[0].player_id), phase.winner());
    }

    #[test]
    fn standings_points_add_up(
        size in 2usize..8,
        scores in prop::collection::vec((0u32..=4, 0u32..=4), 28),
    ) {
        let players: Vec<PlayerId> = (1..=size as i64).collect();
        let entrants: Vec<GroupEntrant> = players
            .iter()
            .map(|&player_id| GroupEntrant {
                player_id,
                group_label: "A".to_string(),
                seeding: None,
            })
            .collect();
        let outcomes: Vec<MatchOutcome> = round_robin(&players)
            .iter()
            .zip(&scores)
            .map(|(p, &(score1, score2))| MatchOutcome {
                player1: p.player1,
                player2: p.player2,
                score1,
                score2,
            })
            .collect();

        let groups = compute_standings(&entrants, &outcomes);
        prop_assert_eq!(groups.len(), 1);
        let table = &groups[0].standings;
        prop_assert_eq!(table.len(), size);

        // Every match hands out two points in total
        let points: i32 = table.iter().map(|s| s.points).sum();
        prop_assert_eq!(points, 2 * outcomes.len() as i32);

        let diff: i64 = table.iter().map(|s| s.score_diff()).sum();
        prop_assert_eq!(diff, 0);

        let ranks: Vec<u32> = table.iter().map(|s| s.rank).collect();
        prop_assert_eq!(ranks, (1..=size as u32).collect::<Vec<_>>());
        prop_assert!(table.windows(2).all(|w| w[0].points >= w[1].points));
    }
}
