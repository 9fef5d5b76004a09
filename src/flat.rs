//! The flat-nest engine: a packed-array equivalent of [`NCList`](crate::NCList), trading
//! conceptual clarity for cache locality and fewer allocations.
//!
//! Builds on the same `(Vec<T>, contained-range)` representation as [`NCList`](crate::NCList)'s
//! build sweep, but packs it into a single `Vec<T>` of intervals plus a parallel array recording,
//! for every interval, the contiguous `(start, len)` range of its children — generalised here
//! with two distinguished top-level buckets (`ROOT`, the top-level intervals that head a nested
//! subtree, and `UNNESTED`, the top-level intervals with none) so the common shallow-overlap
//! case can skip straight to a single binary search.
//!
//! Mutation is lazy (§4.6). `add` appends straight onto the tail of `intervals` rather than
//! rebuilding the packed layout on every call, and records the interval's target position
//! (computed once, by binary search, against the finalised sorted prefix) in a singly-linked
//! chain keyed by that position — several adds that land on the same target slot just extend
//! the same chain. `revalidate` walks every target position once, draining each chain (and the
//! pending-delete bitmap) into place in a single merge pass, so the packed layout never gets
//! rebuilt from an unsorted array: the expensive `sort_by` + two-phase nest rebuild of
//! [`build`](Self::build) only ever runs over already-sorted data.

use std::cmp::Ordering;

use fixedbitset::FixedBitSet;

use crate::interval::{Endian, Interval, CONTAINMENT_UNKNOWN, NOT_CONTAINED};
use crate::search::{self, identity_search, SearchResult};

/// Bucket id for the top-level nested set (top-level intervals that have children).
const ROOT: usize = 0;
/// Bucket id for the top-level intervals with no children.
const UNNESTED: usize = 1;
/// First bucket id used for a real interval's own children range.
const FIRST_INTERVAL_BUCKET: usize = 2;

#[inline]
fn bucket_of_interval(i: usize) -> usize {
    FIRST_INTERVAL_BUCKET + i
}

/// `child ⊂ parent` iff `p.begin <= c.begin && p.end > c.end`, or
/// `p.begin < c.begin && p.end == c.end`. This strict form prevents degenerate chains of
/// equal-range intervals (exact duplicates) from stacking arbitrarily deep.
#[inline]
fn strictly_contains<V: Interval>(parent: &V, child: &V) -> bool {
    (parent.begin() <= child.begin() && parent.end() > child.end())
        || (parent.begin() < child.begin() && parent.end() == child.end())
}

/// A flat-array nested containment index.
///
/// `intervals[..sorted_len]` is the finalised, sorted prefix the `nests`/`nest_offsets`/
/// `nest_lengths` index describes. `intervals[sorted_len..]` holds intervals added since the
/// last finalisation, in arbitrary append order — the fast-add buffer described in the module
/// docs. `deleted` flags logically-removed members of the sorted prefix without shifting the
/// array; `remove` of a still-pending addition instead finalises immediately (see
/// [`remove`](Self::remove)).
#[derive(Debug, Clone)]
pub struct FlatNestStore<V: Interval> {
    intervals: Vec<V>,
    /// Length of the finalised, sorted prefix of `intervals`. Everything from this index
    /// onward is an unmerged pending add.
    sorted_len: usize,
    /// Permutation of `0..sorted_len`: children of any bucket occupy a contiguous range.
    nests: Vec<u32>,
    /// `nest_offsets[bucket]` is the start index into `nests` for that bucket.
    nest_offsets: Vec<u32>,
    /// `nest_lengths[bucket]` is the element count of that bucket.
    nest_lengths: Vec<u32>,
    endian: Endian,
    /// `chain_next[i]` is the previous pending index (absolute, into `intervals`) targeting the
    /// same insertion slot as pending index `sorted_len + i`, or `None` if it is the oldest
    /// pending add for that slot. Indexed relative to `sorted_len`, growing in lockstep with
    /// the pending region of `intervals`.
    chain_next: Vec<Option<u32>>,
    /// `chain_head[pos]` is the most recently added pending interval (absolute index) whose
    /// target insertion position is `pos`, for `pos` in `0..=sorted_len`. Empty when nothing is
    /// pending (reinitialised lazily by the first `add` after a finalisation).
    chain_head: Vec<Option<u32>>,
    /// Bit `i` set means `intervals[i]` (within the sorted prefix) is logically removed but
    /// not yet compacted out.
    deleted: FixedBitSet,
    deleted_count: usize,
    is_tainted: bool,
}

impl<V: Interval> FlatNestStore<V> {
    /// Build a fresh store from an unordered vector of intervals.
    pub fn build(mut intervals: Vec<V>, endian: Endian) -> Self {
        intervals.sort_by(|a, b| endian.compare(a, b));
        Self::build_sorted(intervals, endian)
    }

    /// Like [`build`](Self::build), but assumes `intervals` is already sorted under `endian` and
    /// skips the re-sort. Used by [`revalidate`](Self::revalidate), whose merge pass hands back
    /// data it has already produced in sorted order — paying for a second `O(N log N)` sort
    /// there would defeat the point of the fast-add buffer.
    fn build_sorted(intervals: Vec<V>, endian: Endian) -> Self {
        let n = intervals.len();

        // Phase 1: assign containers via a monotonic stack of currently-open ancestors.
        // Because `intervals` is sorted ascending by begin, and every stack entry strictly
        // contains the one above it, the stack's `end` values are non-increasing from bottom
        // to top; popping while the top fails to contain `i` always finds the nearest live
        // ancestor (or empties the stack) in amortised O(1) per element.
        //
        // Each interval's container is recorded as a signed offset `i - parent_index` rather
        // than a plain index, per the design note on carrying the tree shape in an auxiliary
        // integer vector instead of embedding parent pointers in the payload.
        // `CONTAINMENT_UNKNOWN` seeds every slot before the sweep classifies it;
        // `NOT_CONTAINED` is the final answer for a slot with no container. Neither can
        // collide with a real offset, since a parent index is always strictly less than its
        // child's, so real offsets are always `>= 1`.
        let mut parent_offset: Vec<i32> = vec![CONTAINMENT_UNKNOWN; n];
        let mut stack: Vec<usize> = Vec::new();
        for i in 0..n {
            while let Some(&top) = stack.last() {
                if strictly_contains(&intervals[top], &intervals[i]) {
                    break;
                }
                stack.pop();
            }
            parent_offset[i] = match stack.last() {
                Some(&top) => (i - top) as i32,
                None => NOT_CONTAINED,
            };
            stack.push(i);
        }
        debug_assert!(
            parent_offset.iter().all(|&o| o != CONTAINMENT_UNKNOWN),
            "every interval must be classified by the end of the sweep"
        );

        let mut has_children = vec![false; n];
        for (i, &offset) in parent_offset.iter().enumerate() {
            if offset != NOT_CONTAINED {
                has_children[i - offset as usize] = true;
            }
        }

        let bucket_of = |i: usize| -> usize {
            match parent_offset[i] {
                NOT_CONTAINED if has_children[i] => ROOT,
                NOT_CONTAINED => UNNESTED,
                offset => bucket_of_interval(i - offset as usize),
            }
        };

        // Phase 2: lay out nests. Count per bucket, prefix-sum into offsets, then write each
        // interval into its bucket's current slot (in global sorted order, so each bucket's
        // range stays sorted internally).
        let num_buckets = FIRST_INTERVAL_BUCKET + n;
        let mut nest_lengths = vec![0u32; num_buckets];
        for i in 0..n {
            nest_lengths[bucket_of(i)] += 1;
        }
        let mut nest_offsets = vec![0u32; num_buckets];
        let mut running = 0u32;
        for b in 0..num_buckets {
            nest_offsets[b] = running;
            running += nest_lengths[b];
        }

        let mut cursor = nest_offsets.clone();
        let mut nests = vec![0u32; n];
        for i in 0..n {
            let b = bucket_of(i);
            nests[cursor[b] as usize] = i as u32;
            cursor[b] += 1;
        }

        FlatNestStore {
            intervals,
            sorted_len: n,
            nests,
            nest_offsets,
            nest_lengths,
            endian,
            chain_next: Vec::new(),
            chain_head: Vec::new(),
            deleted: FixedBitSet::new(),
            deleted_count: 0,
            is_tainted: false,
        }
    }

    pub fn empty(endian: Endian) -> Self {
        FlatNestStore {
            intervals: Vec::new(),
            sorted_len: 0,
            nests: Vec::new(),
            nest_offsets: vec![0; FIRST_INTERVAL_BUCKET],
            nest_lengths: vec![0; FIRST_INTERVAL_BUCKET],
            endian,
            chain_next: Vec::new(),
            chain_head: Vec::new(),
            deleted: FixedBitSet::new(),
            deleted_count: 0,
            is_tainted: false,
        }
    }

    /// Binary search the target insertion index for `interval` within the finalised sorted
    /// prefix. Computed once per `add`, in O(log N); this is what keeps `add` itself cheap
    /// regardless of how much is already pending.
    fn insertion_pos(&self, interval: &V) -> usize {
        self.intervals[..self.sorted_len]
            .partition_point(|v| self.endian.compare(v, interval) != Ordering::Greater)
    }

    /// Append `interval` to the fast-add buffer. Marks the store tainted; the next read that
    /// depends on the secondary index merges it in via [`revalidate`](Self::revalidate). When
    /// `allow_duplicates` is false, fails (returning `false`) if an equal interval is already
    /// present among either the finalised array or the pending buffer.
    pub fn add(&mut self, interval: V, allow_duplicates: bool) -> bool {
        if interval.begin() > interval.end() {
            log::debug!(
                "rejecting interval [{}, {}]: begin > end",
                interval.begin(),
                interval.end()
            );
            return false;
        }
        if !allow_duplicates && self.contains(&interval) {
            return false;
        }
        if self.chain_head.len() != self.sorted_len + 1 {
            self.chain_head = vec![None; self.sorted_len + 1];
        }
        let pos = self.insertion_pos(&interval);
        let abs_idx = self.intervals.len() as u32;
        self.chain_next.push(self.chain_head[pos]);
        self.chain_head[pos] = Some(abs_idx);
        self.intervals.push(interval);
        self.is_tainted = true;
        true
    }

    /// Flag the first interval equal to `target` (by [`Interval::equals_interval`]) for
    /// removal. If the match is still sitting in the unmerged fast-add buffer, this finalises
    /// the store first (there is no cheap way to unlink a single entry out of the chain without
    /// breaking the links behind it) so the removal can fall through to the ordinary
    /// pending-delete bitmap path. Otherwise a bit is flipped in `deleted` and the array isn't
    /// shifted until the next index-dependent read compacts it out.
    pub fn remove(&mut self, target: &V) -> bool {
        if self.intervals[self.sorted_len..]
            .iter()
            .any(|v| v.equals_interval(target))
        {
            self.revalidate();
        }
        match identity_search(&self.intervals[..self.sorted_len], target, Some(&self.deleted)) {
            SearchResult::Found(idx) => {
                self.deleted.grow(self.sorted_len);
                self.deleted.insert(idx);
                self.deleted_count += 1;
                self.is_tainted = true;
                true
            }
            SearchResult::InsertAt(_) => false,
        }
    }

    /// Drain the fast-add chain and the pending-delete bitmap, rebuilding the packed layout.
    /// A no-op when the store isn't tainted. Idempotent.
    ///
    /// This is the `finalize_addition` sweep from §4.6: walk every target position once, in
    /// ascending order, flushing (a) the chain of pending adds targeting that position — sorted
    /// among themselves, since the chain only records the shared target bucket, not relative
    /// order within it — then (b) the finalised-prefix interval at that position, if it survived
    /// deletion. The result is produced in a single O(N) pass with no intermediate re-sort;
    /// [`build_sorted`](Self::build_sorted) only has to redo the nest layout, not the ordering.
    pub fn revalidate(&mut self) {
        if !self.is_tainted {
            return;
        }
        log::trace!(
            "finalizing flat-nest store: {} pending adds (chained), {} pending deletes",
            self.intervals.len() - self.sorted_len,
            self.deleted_count
        );

        let endian = self.endian;
        let sorted_len = self.sorted_len;
        let final_len =
            sorted_len - self.deleted_count + (self.intervals.len() - sorted_len);

        let deleted = std::mem::replace(&mut self.deleted, FixedBitSet::new());
        let chain_head = std::mem::take(&mut self.chain_head);
        let chain_next = std::mem::take(&mut self.chain_next);
        let mut pool: Vec<Option<V>> = std::mem::take(&mut self.intervals)
            .into_iter()
            .map(Some)
            .collect();

        let mut merged = Vec::with_capacity(final_len);
        for pos in 0..=sorted_len {
            let mut group: Vec<V> = Vec::new();
            let mut cursor = chain_head.get(pos).copied().flatten();
            while let Some(abs) = cursor {
                let idx = abs as usize;
                group.push(pool[idx].take().expect("pending interval consumed twice"));
                cursor = chain_next[idx - sorted_len];
            }
            group.sort_by(|a, b| endian.compare(a, b));
            merged.extend(group);

            if pos < sorted_len && !deleted.contains(pos) {
                merged.push(pool[pos].take().expect("prefix interval consumed twice"));
            }
        }
        debug_assert_eq!(merged.len(), final_len);

        *self = FlatNestStore::build_sorted(merged, endian);
    }

    /// Cardinality, counting pending adds and subtracting pending deletes.
    pub fn size(&self) -> usize {
        self.intervals.len() - self.deleted_count
    }

    pub fn find_overlaps<'a>(&'a mut self, from: i32, to: i32, result: &mut Vec<&'a V>) {
        self.revalidate();
        self.scan_bucket(ROOT, from, to, result);
        self.scan_bucket(UNNESTED, from, to, result);
    }

    fn scan_bucket<'a>(&'a self, bucket: usize, from: i32, to: i32, result: &mut Vec<&'a V>) {
        let start = self.nest_offsets[bucket] as usize;
        let len = self.nest_lengths[bucket] as usize;
        if len == 0 {
            return;
        }
        let slice = &self.nests[start..start + len];
        // Both bounds of the overlap range come from the shared indexed-search primitives: the
        // bucket is sorted ascending by begin, and since none of its members properly contains
        // another, that implies ascending by end too (the same invariant the NCList sibling
        // scan relies on), so everything in [lo, hi] overlaps [from, to] with no need to check
        // each element individually.
        let lo = search::first_end_not_before(slice, from, |&i| self.intervals[i as usize].end());
        let hi = match search::last_begin_not_after(slice, to, |&i| self.intervals[i as usize].begin())
        {
            Some(hi) => hi,
            None => return,
        };
        if lo > hi {
            return;
        }
        for &i in &slice[lo..=hi] {
            let iv = &self.intervals[i as usize];
            result.push(iv);
            let child_bucket = bucket_of_interval(i as usize);
            if self.nest_lengths[child_bucket] > 0 {
                self.scan_bucket(child_bucket, from, to, result);
            }
        }
    }

    /// Maximum containment chain length. 0 for an empty store.
    pub fn depth(&mut self) -> usize {
        self.revalidate();
        if self.intervals.is_empty() {
            return 0;
        }
        self.bucket_depth(ROOT).max(self.bucket_depth(UNNESTED))
    }

    fn bucket_depth(&self, bucket: usize) -> usize {
        let start = self.nest_offsets[bucket] as usize;
        let len = self.nest_lengths[bucket] as usize;
        if len == 0 {
            return 0;
        }
        self.nests[start..start + len]
            .iter()
            .map(|&i| 1 + self.bucket_depth(bucket_of_interval(i as usize)))
            .max()
            .unwrap_or(0)
    }

    /// Number of top-level (uncontained) intervals.
    pub fn width(&mut self) -> usize {
        self.revalidate();
        self.nest_lengths[ROOT] as usize + self.nest_lengths[UNNESTED] as usize
    }

    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn contains(&self, target: &V) -> bool {
        self.intervals[self.sorted_len..]
            .iter()
            .any(|v| v.equals_interval(target))
            || self.intervals[..self.sorted_len]
                .iter()
                .enumerate()
                .any(|(i, v)| !self.deleted.contains(i) && v.equals_interval(target))
    }

    pub fn iter(&mut self) -> impl Iterator<Item = &V> {
        self.revalidate();
        self.intervals.iter()
    }

    /// Structural self-check: every bucket is ordered ascending by begin, and every child's
    /// range lies within its container's range.
    pub fn is_valid(&mut self) -> bool {
        self.revalidate();
        for w in self.intervals.windows(2) {
            if w[0].begin() > w[1].begin() {
                return false;
            }
        }
        for i in 0..self.intervals.len() {
            let b = bucket_of_interval(i);
            let start = self.nest_offsets[b] as usize;
            let len = self.nest_lengths[b] as usize;
            for &c in &self.nests[start..start + len] {
                if !self.intervals[i].contains(&self.intervals[c as usize]) {
                    return false;
                }
            }
        }
        true
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::RangeInterval;
    use pretty_assertions::assert_eq;

    fn iv(begin: i32, end: i32) -> RangeInterval<i32> {
        RangeInterval::new(begin, end, 0)
    }

    #[test]
    fn build_and_query_matches_nesting() {
        let data = vec![iv(10, 20), iv(15, 25), iv(30, 40), iv(32, 38), iv(33, 35)];
        let mut flat = FlatNestStore::build(data, Endian::BigEndian);
        assert!(flat.is_valid());
        assert_eq!(flat.len(), 5);
        assert_eq!(flat.depth(), 3);

        let mut r = Vec::new();
        flat.find_overlaps(34, 34, &mut r);
        assert_eq!(r.len(), 3); // 30-40, 32-38, 33-35
    }

    #[test]
    fn unnested_fast_path() {
        let data = vec![iv(0, 5), iv(10, 15), iv(20, 25)];
        let mut flat = FlatNestStore::build(data, Endian::BigEndian);
        assert_eq!(flat.width(), 3);
        assert_eq!(flat.nest_lengths[ROOT], 0);
        assert_eq!(flat.nest_lengths[UNNESTED], 3);

        let mut r = Vec::new();
        flat.find_overlaps(12, 12, &mut r);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn duplicate_ranges_stay_siblings() {
        let data = vec![iv(10, 20), iv(10, 20), iv(10, 20)];
        let mut flat = FlatNestStore::build(data, Endian::BigEndian);
        assert_eq!(flat.depth(), 1);
        assert_eq!(flat.width(), 3);
    }

    #[test]
    fn empty_store() {
        let mut flat: FlatNestStore<RangeInterval<i32>> =
            FlatNestStore::build(vec![], Endian::BigEndian);
        assert_eq!(flat.depth(), 0);
        assert_eq!(flat.width(), 0);
        let mut r = Vec::new();
        flat.find_overlaps(0, 100, &mut r);
        assert!(r.is_empty());
    }

    #[test]
    fn add_is_buffered_until_revalidate() {
        let mut flat = FlatNestStore::build(vec![iv(10, 20)], Endian::BigEndian);
        assert!(flat.add(iv(15, 18), true));
        assert_eq!(flat.size(), 2);
        assert!(flat.contains(&iv(15, 18)));

        let mut r = Vec::new();
        flat.find_overlaps(16, 16, &mut r);
        assert_eq!(r.len(), 2);
        assert!(flat.is_valid());
    }

    #[test]
    fn several_adds_chain_onto_the_same_target_slot() {
        let mut flat = FlatNestStore::build(vec![iv(0, 5), iv(100, 105)], Endian::BigEndian);
        // All three land between the two finalised entries, so they share one insertion slot
        // and must come out of `revalidate` sorted among themselves.
        assert!(flat.add(iv(50, 60), true));
        assert!(flat.add(iv(40, 45), true));
        assert!(flat.add(iv(45, 70), true));
        assert_eq!(flat.size(), 5);
        assert!(flat.is_valid());

        let mut r: Vec<&RangeInterval<i32>> = Vec::new();
        flat.find_overlaps(0, 200, &mut r);
        let mut begins: Vec<i32> = r.iter().map(|v| v.begin).collect();
        begins.sort_unstable();
        assert_eq!(begins, vec![0, 40, 45, 50, 100]);
    }

    #[test]
    fn remove_flags_bit_and_is_observed_immediately() {
        let mut flat = FlatNestStore::build(vec![iv(10, 20), iv(12, 14)], Endian::BigEndian);
        assert!(flat.remove(&iv(10, 20)));
        assert!(!flat.contains(&iv(10, 20)));
        assert!(flat.contains(&iv(12, 14)));
        assert_eq!(flat.size(), 1);

        let mut r = Vec::new();
        flat.find_overlaps(0, 100, &mut r);
        assert_eq!(r.len(), 1);
        assert!(flat.is_valid());
    }

    #[test]
    fn remove_of_still_pending_add_finalises_first() {
        let mut flat = FlatNestStore::build(vec![iv(10, 20)], Endian::BigEndian);
        assert!(flat.add(iv(12, 14), true));
        assert!(flat.remove(&iv(12, 14)));
        assert!(!flat.contains(&iv(12, 14)));
        assert_eq!(flat.size(), 1);
        assert!(flat.is_valid());
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut flat = FlatNestStore::build(vec![iv(10, 20)], Endian::BigEndian);
        assert!(!flat.remove(&iv(100, 200)));
        assert_eq!(flat.size(), 1);
    }

    #[test]
    fn add_reject_duplicate() {
        let mut flat = FlatNestStore::build(vec![iv(10, 20)], Endian::BigEndian);
        assert!(!flat.add(iv(10, 20), false));
        assert_eq!(flat.size(), 1);
        assert!(flat.add(iv(10, 20), true));
        assert_eq!(flat.size(), 2);
    }
}
