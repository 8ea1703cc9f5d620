//! Contiguous, near-equal partitioning of a sorted symbol list.
//!
//! Batch `i` (1-based) of `n` gets `len / n` symbols, plus one more when
//! `i - 1 < len % n`, so the remainder goes to the earliest batches.

use std::ops::Range;

/// Index range of batch `number` (1-based) out of `total` over `len` items.
///
/// Returns `None` when `total == 0` or `number` is outside `1..=total`.
pub fn batch_range(len: usize, number: usize, total: usize) -> Option<Range<usize>> {
    if total == 0 || number == 0 || number > total {
        return None;
    }
    let base = len / total;
    let extra = len % total;
    let idx = number - 1;
    let start = idx * base + idx.min(extra);
    let size = base + usize::from(idx < extra);
    Some(start..start + size)
}

/// The slice of `items` belonging to batch `number` of `total`.
pub fn select_batch<T>(items: &[T], number: usize, total: usize) -> Option<&[T]> {
    batch_range(items.len(), number, total).map(|r| &items[r])
}

/// All `total` batches in order.
pub fn partition<T>(items: &[T], total: usize) -> Vec<&[T]> {
    (1..=total)
        .filter_map(|n| select_batch(items, n, total))
        .collect()
}
