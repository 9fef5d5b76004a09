//! Specialised binary searches shared by [`NCList`](crate::NCList) and
//! [`FlatNestStore`](crate::FlatNestStore).
//!
//! `first_end_not_before` and `last_begin_not_after` are generic over the element type and take
//! an accessor closure rather than requiring `T: Interval` directly, since the two engines hand
//! them different shapes of slice: [`NCList`](crate::NCList) searches its own `&[Node<V>]`
//! sibling list, [`FlatNestStore`](crate::FlatNestStore) searches a `&[u32]` permutation of
//! indices into its packed interval array. Both rely on the same invariant: a sibling/bucket
//! list sorted ascending by `begin`, with none properly containing another, is also sorted
//! ascending by `end`, so both the lower and upper bound of an overlap query can be found by
//! binary search rather than a scan-with-break.
//!
//! `identity_search` is `Interval`-specific (it needs `equals_interval`) and must operate
//! correctly on runs of equal `begin` (and potentially equal `end`): after a binary search lands
//! inside such a run, it widens linearly in both directions until either a match is found or the
//! run ends, rather than assuming the first hit is the only one.

use fixedbitset::FixedBitSet;

use crate::interval::Interval;

/// Within `items` (sorted ascending by whatever `end_of` extracts), find the lowest index whose
/// element has `end_of(item) >= from`. Returns `items.len()` when no such index exists.
pub fn first_end_not_before<T>(items: &[T], from: i32, end_of: impl Fn(&T) -> i32) -> usize {
    items.partition_point(|item| end_of(item) < from)
}

/// Within `items` (sorted ascending by whatever `begin_of` extracts), find the highest index
/// whose element has `begin_of(item) <= to`. Returns `None` when every element's begin exceeds
/// `to`.
pub fn last_begin_not_after<T>(
    items: &[T],
    to: i32,
    begin_of: impl Fn(&T) -> i32,
) -> Option<usize> {
    let idx = items.partition_point(|item| begin_of(item) <= to);
    idx.checked_sub(1)
}

/// Outcome of [`identity_search`]: either the index of a matching element, or the index at
/// which `target` would need to be inserted to keep `intervals` sorted by `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    Found(usize),
    InsertAt(usize),
}

/// Locate an element of `intervals` satisfying `target.equals_interval(&intervals[i])`,
/// skipping any index flagged in `ignore` (used to mask pending deletions). `intervals` must
/// be sorted ascending by `begin`.
///
/// When no match exists, returns the insertion point so callers performing an `add` can reuse
/// the same binary search for ordered insertion instead of paying for it twice.
pub fn identity_search<V: Interval>(
    intervals: &[V],
    target: &V,
    ignore: Option<&FixedBitSet>,
) -> SearchResult {
    let begin = target.begin();
    let insertion_point = intervals.partition_point(|v| v.begin() < begin);

    let is_ignored = |i: usize| ignore.map(|bs| bs.contains(i)).unwrap_or(false);

    // widen left from the insertion point
    let mut lo = insertion_point;
    while lo > 0 && intervals[lo - 1].begin() == begin {
        lo -= 1;
    }
    // widen right to the end of the equal-begin run
    let mut hi = insertion_point;
    while hi < intervals.len() && intervals[hi].begin() == begin {
        hi += 1;
    }

    for i in lo..hi {
        if !is_ignored(i) && intervals[i].equals_interval(target) {
            return SearchResult::Found(i);
        }
    }
    SearchResult::InsertAt(insertion_point)
}
