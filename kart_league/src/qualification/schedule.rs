//! Round-robin scheduling (circle method).
//!
//! The first player stays fixed while the others rotate one place per
//! round. Odd groups get a bye slot; whoever meets the bye sits the round
//! out.

use crate::bracket::PlayerId;

/// One scheduled pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    /// 1-based round
    pub round: u32,
    pub player1: PlayerId,
    pub player2: PlayerId,
}

/// Every pairing of a group, round by round
pub fn round_robin(players: &[PlayerId]) -> Vec<Pairing> {
    if players.len() < 2 {
        return Vec::new();
    }

    let mut slots: Vec<Option<PlayerId>> = players.iter().copied().map(Some).collect();
    if slots.len() % 2 == 1 {
        slots.push(None);
    }
    let n = slots.len();

    let mut pairings = Vec::with_capacity(players.len() * (players.len() - 1) / 2);
    for round in 0..n - 1 {
        for i in 0..n / 2 {
            if let (Some(a), Some(b)) = (slots[i], slots[n - 1 - i]) {
                // Alternate sides so the fixed player is not always player 1
                let (player1, player2) = if i == 0 && round % 2 == 1 { (b, a) } else { (a, b) };
                pairings.push(Pairing {
                    round: round as u32 + 1,
                    player1,
                    player2,
                });
            }
        }
        slots[1..].rotate_right(1);
    }
    pairings
}

/// Number of rounds needed for a group
pub fn rounds_for(group_size: usize) -> usize {
    match group_size {
        0 | 1 => 0,
        n if n % 2 == 0 => n - 1,
        n => n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_complete(players: &[PlayerId]) {
        let pairings = round_robin(players);
        let n = players.len();
        assert_eq!(pairings.len(), n * (n - 1) / 2);

        let mut seen = HashSet::new();
        for p in &pairings {
            assert_ne!(p.player1, p.player2);
            let key = (p.player1.min(p.player2), p.player1.max(p.player2));
            assert!(seen.insert(key), "duplicate pairing {key:?}");
        }

        // Nobody plays twice in a round
        for round in 1..=rounds_for(n) as u32 {
            let mut busy = HashSet::new();
            for p in pairings.iter().filter(|p| p.round == round) {
                assert!(busy.insert(p.player1));
                assert!(busy.insert(p.player2));
            }
        }
    }

    #[test]
    fn test_even_group() {
        assert_complete(&[1, 2, 3, 4]);
        assert_complete(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(rounds_for(4), 3);
    }

    #[test]
    fn test_odd_group_has_byes() {
        assert_complete(&[1, 2, 3]);
        assert_complete(&[1, 2, 3, 4, 5]);
        let pairings = round_robin(&[1, 2, 3, 4, 5]);
        assert_eq!(pairings.iter().map(|p| p.round).max(), Some(5));
        for round in 1..=5 {
            assert_eq!(pairings.iter().filter(|p| p.round == round).count(), 2);
        }
    }

    #[test]
    fn test_tiny_groups() {
        assert!(round_robin(&[]).is_empty());
        assert!(round_robin(&[7]).is_empty());
        assert_eq!(
            round_robin(&[7, 8]),
            vec![Pairing {
                round: 1,
                player1: 7,
                player2: 8
            }]
        );
    }
}
