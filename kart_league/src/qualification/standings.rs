//! Standings computation.
//!
//! Group tables are rebuilt from completed matches. Players are ordered by
//! points, then score difference, then score for. Players still level are
//! split by the points they took off each other, then by seeding (unseeded
//! last), then by player id.

use super::models::{GroupStandings, MatchOutcome, Standing};
use crate::{
    bracket::PlayerId,
    modes::{POINTS_LOSS, POINTS_TIE, POINTS_WIN, match_points},
    time_attack::models::{TaEntry, TaStanding},
};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Entrant of a group: player, group and seeding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntrant {
    pub player_id: PlayerId,
    pub group_label: String,
    pub seeding: Option<u32>,
}

fn empty_standing(entrant: &GroupEntrant) -> Standing {
    Standing {
        rank: 0,
        player_id: entrant.player_id,
        group_label: entrant.group_label.clone(),
        seeding: entrant.seeding,
        matches_played: 0,
        wins: 0,
        ties: 0,
        losses: 0,
        points: 0,
        score_for: 0,
        score_against: 0,
    }
}

fn apply(standing: &mut Standing, own: u32, other: u32) {
    standing.matches_played += 1;
    standing.score_for += own;
    standing.score_against += other;
    let points = match_points(own, other);
    standing.points += points;
    match points {
        POINTS_WIN => standing.wins += 1,
        POINTS_TIE => standing.ties += 1,
        POINTS_LOSS => standing.losses += 1,
        _ => {}
    }
}

/// Points each player of `tied` took in matches among `tied`
fn head_to_head(tied: &HashSet<PlayerId>, outcomes: &[MatchOutcome]) -> HashMap<PlayerId, i32> {
    let mut points = HashMap::new();
    for o in outcomes {
        if tied.contains(&o.player1) && tied.contains(&o.player2) {
            *points.entry(o.player1).or_insert(0) += match_points(o.score1, o.score2);
            *points.entry(o.player2).or_insert(0) += match_points(o.score2, o.score1);
        }
    }
    points
}

fn primary_key(s: &Standing) -> (i32, i64, u32) {
    (s.points, s.score_diff(), s.score_for)
}

/// Rank one group's standings in place
fn rank_group(standings: &mut [Standing], outcomes: &[MatchOutcome]) {
    standings.sort_by(|a, b| primary_key(b).cmp(&primary_key(a)));

    let mut start = 0;
    while start < standings.len() {
        let key = primary_key(&standings[start]);
        let end = standings[start..]
            .iter()
            .position(|s| primary_key(s) != key)
            .map_or(standings.len(), |offset| start + offset);

        if end - start > 1 {
            let tied: HashSet<PlayerId> = standings[start..end].iter().map(|s| s.player_id).collect();
            let h2h = head_to_head(&tied, outcomes);
            standings[start..end].sort_by_key(|s| {
                (
                    std::cmp::Reverse(h2h.get(&s.player_id).copied().unwrap_or(0)),
                    s.seeding.unwrap_or(u32::MAX),
                    s.player_id,
                )
            });
        }
        start = end;
    }

    for (index, standing) in standings.iter_mut().enumerate() {
        standing.rank = index as u32 + 1;
    }
}

/// Build ranked group tables from entrants and completed matches.
///
/// Matches involving a player who is not an entrant, or two players of
/// different groups, are ignored.
pub fn compute_standings(entrants: &[GroupEntrant], outcomes: &[MatchOutcome]) -> Vec<GroupStandings> {
    let mut by_player: HashMap<PlayerId, Standing> = entrants
        .iter()
        .map(|e| (e.player_id, empty_standing(e)))
        .collect();

    let mut counted = Vec::with_capacity(outcomes.len());
    for o in outcomes {
        let same_group = match (by_player.get(&o.player1), by_player.get(&o.player2)) {
            (Some(a), Some(b)) => a.group_label == b.group_label,
            _ => false,
        };
        if !same_group || o.player1 == o.player2 {
            continue;
        }
        if let Some(s) = by_player.get_mut(&o.player1) {
            apply(s, o.score1, o.score2);
        }
        if let Some(s) = by_player.get_mut(&o.player2) {
            apply(s, o.score2, o.score1);
        }
        counted.push(*o);
    }

    let mut groups: BTreeMap<String, Vec<Standing>> = BTreeMap::new();
    for (_, standing) in by_player {
        groups
            .entry(standing.group_label.clone())
            .or_default()
            .push(standing);
    }

    groups
        .into_iter()
        .map(|(group_label, mut standings)| {
            rank_group(&mut standings, &counted);
            GroupStandings {
                group_label,
                standings,
            }
        })
        .collect()
}

/// Seed a bracket from group tables, interleaving groups.
///
/// Group winners come first, then runners-up and so on, with groups in the
/// same order at every level (A1, B1, A2, B2, ...). With the standard seed
/// order this keeps players from one group apart in the first round.
pub fn cross_group_seeds(groups: &[GroupStandings], size: usize) -> Option<Vec<PlayerId>> {
    let depth = groups.iter().map(|g| g.standings.len()).max().unwrap_or(0);
    let mut seeds = Vec::with_capacity(size);
    for level in 0..depth {
        for group in groups {
            if let Some(standing) = group.standings.get(level) {
                seeds.push(standing.player_id);
                if seeds.len() == size {
                    return Some(seeds);
                }
            }
        }
    }
    None
}

/// Rank Time Attack qualification entries.
///
/// Entries with every course recorded come first, by total time. Entries
/// missing courses follow, by number of courses then total.
pub fn rank_time_trials(entries: &[TaEntry]) -> Vec<TaStanding> {
    let mut ranked: Vec<TaStanding> = entries
        .iter()
        .map(|e| TaStanding {
            rank: 0,
            player_id: e.player_id,
            courses_completed: e.course_times.len(),
            total_ms: e.total_ms(),
        })
        .collect();
    ranked.sort_by_key(|s| {
        (
            std::cmp::Reverse(s.courses_completed),
            s.total_ms,
            s.player_id,
        )
    });
    for (index, standing) in ranked.iter_mut().enumerate() {
        standing.rank = index as u32 + 1;
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::seeding::first_round_pairs;

    fn entrant(player_id: PlayerId, group: &str, seeding: Option<u32>) -> GroupEntrant {
        GroupEntrant {
            player_id,
            group_label: group.to_string(),
            seeding,
        }
    }

    fn outcome(player1: PlayerId, player2: PlayerId, score1: u32, score2: u32) -> MatchOutcome {
        MatchOutcome {
            player1,
            player2,
            score1,
            score2,
        }
    }

    fn order(group: &GroupStandings) -> Vec<PlayerId> {
        group.standings.iter().map(|s| s.player_id).collect()
    }

    #[test]
    fn test_points_then_difference() {
        let entrants = vec![entrant(1, "A", None), entrant(2, "A", None), entrant(3, "A", None)];
        let outcomes = vec![outcome(1, 2, 3, 1), outcome(2, 3, 4, 0), outcome(1, 3, 2, 2)];
        let groups = compute_standings(&entrants, &outcomes);
        assert_eq!(groups.len(), 1);

        let a = &groups[0];
        assert_eq!(order(a), vec![1, 2, 3]);
        let first = &a.standings[0];
        assert_eq!((first.wins, first.ties, first.losses, first.points), (1, 1, 0, 3));
        assert_eq!(first.score_diff(), 2);
        assert_eq!(a.standings[2].rank, 3);
    }

    #[test]
    fn test_head_to_head_breaks_tie() {
        // 1 and 2 finish level on points, difference and score for; 2 won the meeting
        let entrants = vec![
            entrant(1, "A", Some(1)),
            entrant(2, "A", Some(2)),
            entrant(3, "A", None),
            entrant(4, "A", None),
        ];
        let outcomes = vec![
            outcome(1, 2, 1, 3),
            outcome(1, 3, 3, 1),
            outcome(2, 4, 1, 3),
            outcome(1, 4, 3, 1),
            outcome(2, 3, 3, 1),
        ];
        let groups = compute_standings(&entrants, &outcomes);
        let a = &groups[0];
        let one = a.standings.iter().find(|s| s.player_id == 1).unwrap();
        let two = a.standings.iter().find(|s| s.player_id == 2).unwrap();
        assert_eq!(primary_key(one), primary_key(two));
        assert_eq!(order(a)[..2], [2, 1]);
    }

    #[test]
    fn test_seeding_then_id_break_remaining_ties() {
        let entrants = vec![entrant(5, "A", None), entrant(6, "A", Some(2)), entrant(7, "A", Some(1))];
        let groups = compute_standings(&entrants, &[]);
        assert_eq!(order(&groups[0]), vec![7, 6, 5]);

        let unseeded = vec![entrant(9, "B", None), entrant(8, "B", None)];
        let groups = compute_standings(&unseeded, &[]);
        assert_eq!(order(&groups[0]), vec![8, 9]);
    }

    #[test]
    fn test_cross_group_and_unknown_matches_ignored() {
        let entrants = vec![entrant(1, "A", None), entrant(2, "B", None)];
        let outcomes = vec![outcome(1, 2, 4, 0), outcome(1, 99, 4, 0)];
        let groups = compute_standings(&entrants, &outcomes);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.standings[0].matches_played == 0));
    }

    #[test]
    fn test_cross_group_seeds() {
        let entrants: Vec<GroupEntrant> = (1..=4)
            .map(|p| entrant(p, "A", Some(p as u32)))
            .chain((11..=14).map(|p| entrant(p, "B", Some((p - 10) as u32))))
            .collect();
        let groups = compute_standings(&entrants, &[]);
        assert_eq!(
            cross_group_seeds(&groups, 8),
            Some(vec![1, 11, 2, 12, 3, 13, 4, 14])
        );
        assert_eq!(cross_group_seeds(&groups, 3), Some(vec![1, 11, 2]));
        assert_eq!(cross_group_seeds(&groups, 9), None);
    }

    #[test]
    fn test_first_round_has_no_group_rematch() {
        let group_of = |p: PlayerId| if p > 10 { "B" } else { "A" };
        let entrants: Vec<GroupEntrant> = (1..=4)
            .chain(11..=14)
            .map(|p| entrant(p, group_of(p), None))
            .collect();
        let groups = compute_standings(&entrants, &[]);
        let seeds = cross_group_seeds(&groups, 8).unwrap();

        for (high, low) in first_round_pairs(8).unwrap() {
            assert_ne!(
                group_of(seeds[high - 1]),
                group_of(seeds[low - 1]),
                "seeds {high} and {low} share a group"
            );
        }
    }

    #[test]
    fn test_rank_time_trials() {
        let mut fast_partial = TaEntry::new(1);
        fast_partial.course_times.insert("MC1".to_string(), 50_000);

        let mut complete_slow = TaEntry::new(2);
        complete_slow.course_times.insert("MC1".to_string(), 70_000);
        complete_slow.course_times.insert("DP1".to_string(), 70_000);

        let mut complete_fast = TaEntry::new(3);
        complete_fast.course_times.insert("MC1".to_string(), 60_000);
        complete_fast.course_times.insert("DP1".to_string(), 60_000);

        let ranked = rank_time_trials(&[fast_partial, complete_slow, complete_fast]);
        let order: Vec<(u32, PlayerId)> = ranked.iter().map(|s| (s.rank, s.player_id)).collect();
        assert_eq!(order, vec![(1, 3), (2, 2), (3, 1)]);
        assert_eq!(ranked[0].total_ms, 120_000);
    }
}
