//! Deterministic block partitioning of work items onto workers.
//!
//! Item `k` of `n` belongs to worker `floor(k * p / n)`. Every worker can
//! evaluate this on its own, so ownership never needs to be communicated.

use std::ops::Range;

/// Contiguous range of items owned by `rank`.
///
/// Closed form of the floor rule: worker `r` owns `[ceil(r*n/p), ceil((r+1)*n/p))`.
pub fn owned_range(n: usize, size: usize, rank: usize) -> Range<usize> {
    if n == 0 || size == 0 || rank >= size {
        return 0..0;
    }
    let bound = |r: usize| -> usize {
        let num = r as u128 * n as u128;
        let den = size as u128;
        ((num + den - 1) / den) as usize
    };
    bound(rank)..bound(rank + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner_of(k: usize, n: usize, size: usize) -> usize {
        ((k as u128 * size as u128) / n as u128) as usize
    }

    #[test]
    fn union_over_ranks_covers_every_item_once() {
        for n in 1..=40 {
            for p in 1..=12 {
                let mut seen = vec![0usize; n];
                for rank in 0..p {
                    for k in owned_range(n, p, rank) {
                        seen[k] += 1;
                    }
                }
                assert!(seen.iter().all(|&c| c == 1), "n={n} p={p}: {seen:?}");
            }
        }
    }

    #[test]
    fn closed_form_matches_floor_rule() {
        for n in 1..=30 {
            for p in 1..=9 {
                for k in 0..n {
                    let rank = owner_of(k, n, p);
                    assert!(owned_range(n, p, rank).contains(&k), "n={n} p={p} k={k}");
                }
            }
        }
    }

    #[test]
    fn blocks_are_balanced_and_monotonic() {
        let n = 17;
        let p = 5;
        let sizes: Vec<usize> = (0..p).map(|r| owned_range(n, p, r).len()).collect();
        let max = *sizes.iter().max().unwrap();
        let min = *sizes.iter().min().unwrap();
        assert!(max - min <= 1, "{sizes:?}");

        let owners: Vec<usize> = (0..n).map(|k| owner_of(k, n, p)).collect();
        assert!(owners.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn more_workers_than_items_leaves_some_idle() {
        let n = 3;
        let p = 8;
        let busy = (0..p).filter(|&r| !owned_range(n, p, r).is_empty()).count();
        assert_eq!(busy, 3);
    }

    #[test]
    fn empty_item_set_owns_nothing() {
        assert_eq!(owned_range(0, 4, 0), 0..0);
        assert_eq!(owned_range(0, 4, 2), 0..0);
        assert_eq!(owned_range(5, 4, 4), 0..0);
    }

    #[test]
    fn large_counts_do_not_overflow() {
        let n = usize::MAX / 2;
        let p = 1024;
        assert_eq!(owner_of(n - 1, n, p), p - 1);
        assert_eq!(owned_range(n, p, p - 1).end, n);
    }
}
