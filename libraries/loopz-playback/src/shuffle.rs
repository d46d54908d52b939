//! Shuffle orderings
//!
//! A shuffled queue is stored as a permutation of positions into the original
//! queue, so the track behind any shuffled slot is always known exactly.

use rand::seq::SliceRandom;
use rand::Rng;

/// Random permutation of `0..len` (Fisher-Yates)
pub fn shuffled_positions<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    order.shuffle(rng);
    order
}

/// Random permutation of `0..len` with `pinned` forced into the first slot
///
/// Used when the listener clicked one track: that track must play first no
/// matter what the shuffle says.
pub fn shuffled_with_pinned<R: Rng + ?Sized>(len: usize, pinned: usize, rng: &mut R) -> Vec<usize> {
    if pinned >= len {
        return shuffled_positions(len, rng);
    }

    let mut rest: Vec<usize> = (0..len).filter(|&i| i != pinned).collect();
    rest.shuffle(rng);

    let mut order = Vec::with_capacity(len);
    order.push(pinned);
    order.extend(rest);
    order
}

/// Append `extra` positions to `order` and reshuffle everything after `keep`
///
/// Slots `0..keep` (history and the current track) are left untouched.
pub fn reshuffle_tail<R, I>(order: &mut Vec<usize>, keep: usize, extra: I, rng: &mut R)
where
    R: Rng + ?Sized,
    I: IntoIterator<Item = usize>,
{
    order.extend(extra);
    let keep = keep.min(order.len());
    order[keep..].shuffle(rng);
}
