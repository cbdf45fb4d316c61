//! Proportional partitioning of a continuous interval across weighted slots.
//!
//! Factored out of the inline bookkeeping in `examples/original_source/src/manager.c`'s
//! `run_manager` (the `prefix_cores`/`total_cores`/`assigned_n` loop that split `[a,
//! b]` and `n` sub-intervals across workers in proportion to `cores`). The core stays
//! agnostic to what "weight" means for a given application (`build_task` is the
//! application's business), but this cumulative-proportional-split algorithm is useful
//! to any adapter partitioning a continuous resource by slot weight, so it is exposed
//! as a reusable helper rather than re-derived by every `ManagerOps` implementor.

/// One slot's share of a partitioned `[a, b]` interval, split into `n` sub-units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Share {
    pub left: f64,
    pub right: f64,
    pub units: u64,
}

/// Split `[a, b]` (and a count of `n` discrete sub-units) across `weights.len()` slots
/// proportionally to each slot's weight. The last slot absorbs whatever remainder is
/// left over from truncation, exactly as the original C manager does, so the shares
/// always sum to exactly `n` units and exactly cover `[a, b]`.
///
/// Panics if `weights` is empty or any weight is zero (a slot with zero weight cannot
/// receive a well-defined non-empty share under this algorithm).
pub fn split_by_weight(a: f64, b: f64, n: u64, weights: &[u32]) -> Vec<Share> {
    assert!(!weights.is_empty(), "split_by_weight: no slots");
    assert!(weights.iter().all(|&w| w > 0), "split_by_weight: zero weight");

    let total_weight: u64 = weights.iter().map(|&w| w as u64).sum();
    let mut shares = Vec::with_capacity(weights.len());
    let mut left = a;
    let mut prefix_weight: u64 = 0;
    let mut assigned: u64 = 0;

    for (i, &w) in weights.iter().enumerate() {
        prefix_weight += w as u64;
        let last = i == weights.len() - 1;
        let (right, units) = if last {
            (b, n - assigned)
        } else {
            let right = a + (b - a) * (prefix_weight as f64 / total_weight as f64);
            let mut units = ((n as f64) * (w as f64 / total_weight as f64)) as u64;
            units = units.max(1);
            if assigned + units > n {
                units = n - assigned;
            }
            (right, units)
        };
        assigned += units;
        shares.push(Share { left, right, units });
        left = right;
    }
    shares
}
