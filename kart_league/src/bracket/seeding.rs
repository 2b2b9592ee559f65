//! Standard bracket seed order.

use super::errors::{BracketError, BracketResult};

/// Seed order for a bracket of `size` players.
///
/// Adjacent pairs of the returned list meet in the first round, and the
/// top two seeds can only meet in the final. For 8 players this is
/// `[1, 8, 4, 5, 2, 7, 3, 6]`.
pub fn seed_order(size: usize) -> BracketResult<Vec<usize>> {
    if size < 2 || !size.is_power_of_two() {
        return Err(BracketError::UnsupportedSize {
            size,
            reason: "size must be a power of two and at least 2".to_string(),
        });
    }

    let mut order = vec![1, 2];
    while order.len() < size {
        let next_size = order.len() * 2;
        order = order
            .iter()
            .flat_map(|&seed| [seed, next_size + 1 - seed])
            .collect();
    }
    Ok(order)
}

/// First round pairings as seed numbers
pub fn first_round_pairs(size: usize) -> BracketResult<Vec<(usize, usize)>> {
    let order = seed_order(size)?;
    Ok(order.chunks(2).map(|pair| (pair[0], pair[1])).collect())
}
