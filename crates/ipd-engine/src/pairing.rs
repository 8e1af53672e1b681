//! Round-robin pairing generation
//!
//! Pairs are unordered, never self-play, and enumerated in lexicographic
//! order of roster indices: (0,1), (0,2), ..., (0,n-1), (1,2), ...
//! That order is the match order within every repeat.

/// Number of distinct pairs among `n` players: n(n-1)/2
pub fn pair_count(n: u32) -> u32 {
    if n < 2 {
        return 0;
    }
    n * (n - 1) / 2
}

/// All pairs of a round-robin among `n` players, index_a < index_b
pub fn round_robin_pairs(n: u32) -> Vec<(u32, u32)> {
    (0..n)
        .flat_map(|a| (a + 1..n).map(move |b| (a, b)))
        .collect()
}

/// The pair played at position `index` of [`round_robin_pairs`], without
/// building the whole list
pub fn pair_at(n: u32, index: u32) -> Option<(u32, u32)> {
    if index >= pair_count(n) {
        return None;
    }
    // Row `a` holds the n - 1 - a pairs that start with `a`
    let mut rest = index;
    for a in 0..n {
        let row = n - 1 - a;
        if rest < row {
            return Some((a, a + 1 + rest));
        }
        rest -= row;
    }
    None
}
