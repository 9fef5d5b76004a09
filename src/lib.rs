//! An interval index: an in-memory container that stores a collection of closed integer
//! intervals, each carrying a user payload, and answers overlap queries — "return every stored
//! interval that intersects the query range `[from, to]`" — in logarithmic or near-logarithmic
//! time with respect to the number of stored intervals.
//!
//! This is a Nested Containment List (NCList), invented and published by Alexander V.
//! Alekseyenko and Christopher J. Lee in Bioinformatics in 2007
//! (doi: [10.1093/bioinformatics/btl647](https://doi.org/10.1093/bioinformatics/btl647)).
//! The core observation: if the top-level (non-nested) intervals of a set are sorted by start
//! coordinate, they are also sorted by end coordinate, so overlaps can be found with a binary
//! search on the query start followed by a forward scan until the query end is passed — O(log N
//! + M) where N is the store size and M is the number of overlaps. Intervals properly contained
//! by another are pulled out into that container's sub-list and searched recursively.
//!
//! Two engines implement this idea, reachable behind one [`IntervalStore`] facade:
//!
//! - [`NCList`] — the reference tree-of-nodes implementation. Supports genuinely incremental
//!   `add`/`remove` in O(log N) without any buffering.
//! - [`FlatNestStore`] — the same answers, stored in packed integer arrays for cache locality.
//!   Mutation is buffered (see the module docs on [`FlatNestStore`]) since rebuilding the packed
//!   layout on every call would cost O(N).
//!
//! # Example
//! ```
//! use interval_index::{IntervalStore, StoreKind, RangeInterval};
//!
//! let mut store = IntervalStore::from_iter_with(
//!     StoreKind::NCList,
//!     Default::default(),
//!     vec![
//!         RangeInterval::new(10, 20, "a"),
//!         RangeInterval::new(15, 25, "b"),
//!         RangeInterval::new(1, 8, "c"),
//!     ],
//! );
//! assert_eq!(store.find_overlaps(10, 16).len(), 2); // "a" and "b" overlap [10,16]; "c" ends at 8
//! assert_eq!(store.find_overlaps(100, 200).len(), 0);
//! ```
//!
//! # Concurrency
//! Engines are single-threaded, exclusive-access data structures: `find_overlaps` and every
//! other read that may trigger deferred finalisation take `&mut self`, so the borrow checker
//! statically prevents a query from overlapping a mutation on the same store. There is no
//! internal locking and no support for concurrent writers; callers sharing a store across
//! threads must serialise access externally.

pub mod error;
pub mod flat;
pub mod interval;
pub mod nclist;
mod search;

pub use error::IntervalStoreError;
pub use flat::FlatNestStore;
pub use interval::{
    cmp_big_endian, cmp_little_endian, Endian, Interval, RangeInterval, CONTAINMENT_UNKNOWN,
    NOT_CONTAINED,
};
pub use nclist::NCList;

/// Which engine an [`IntervalStore`] dispatches to. See the crate documentation for the
/// tradeoff between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// The reference tree-of-nodes engine; genuinely incremental `add`/`remove`.
    NCList,
    /// The packed-array engine; buffers mutations and finalises lazily.
    FlatNest,
}

/// The primary store facade (§4.2 of the design doc). Unifies the mutation API over both
/// engines and dispatches to whichever was selected at construction.
///
/// `find_overlaps`, `get_depth`, `get_width`, `is_valid` and `iter` all take `&mut self`: for
/// [`FlatNestStore`] they may need to drain the pending-add buffer and pending-delete bitmap
/// first (a deferred finalisation pass, observationally invisible except for the time it
/// costs). [`NCList`] never defers work, so its side of the dispatch is a plain call-through.
#[derive(Debug, Clone)]
pub enum IntervalStore<V: Interval> {
    Nested(NCList<V>),
    Flat(FlatNestStore<V>),
}

impl<V: Interval> IntervalStore<V> {
    /// Construct an empty store of the given kind, using the default (big-endian) comparator.
    pub fn new(kind: StoreKind) -> Self {
        Self::with_endian(kind, Endian::default())
    }

    /// Construct an empty store of the given kind and comparator.
    pub fn with_endian(kind: StoreKind, endian: Endian) -> Self {
        match kind {
            StoreKind::NCList => IntervalStore::Nested(NCList::empty(endian)),
            StoreKind::FlatNest => IntervalStore::Flat(FlatNestStore::empty(endian)),
        }
    }

    /// Bulk-construct a store from an iterator of intervals. Elements with `begin() > end()`
    /// are skipped (logged at `debug`), matching the rejection policy of [`add`](Self::add).
    pub fn from_iter_with<I>(kind: StoreKind, endian: Endian, iter: I) -> Self
    where
        I: IntoIterator<Item = V>,
    {
        let valid: Vec<V> = iter
            .into_iter()
            .filter(|v| {
                let ok = v.begin() <= v.end();
                if !ok {
                    log::debug!(
                        "skipping interval [{}, {}] in bulk constructor: begin > end",
                        v.begin(),
                        v.end()
                    );
                }
                ok
            })
            .collect();
        match kind {
            StoreKind::NCList => IntervalStore::Nested(NCList::build(valid, endian)),
            StoreKind::FlatNest => IntervalStore::Flat(FlatNestStore::build(valid, endian)),
        }
    }

    /// Insert `interval`, allowing duplicates (coordinate- and value-equal entries may both be
    /// stored). Returns `false` only when `interval.begin() > interval.end()`.
    pub fn add(&mut self, interval: V) -> bool {
        self.add_with(interval, true)
    }

    /// Insert `interval`. When `allow_duplicates` is `false`, fails (returning `false`, leaving
    /// the store unchanged) if an existing interval is already equal to it under
    /// [`Interval::equals_interval`].
    pub fn add_with(&mut self, interval: V, allow_duplicates: bool) -> bool {
        match self {
            IntervalStore::Nested(nc) => nc.add_with(interval, allow_duplicates),
            IntervalStore::Flat(flat) => flat.add(interval, allow_duplicates),
        }
    }

    /// Remove the first interval equal to `target` under [`Interval::equals_interval`].
    /// Returns whether anything was removed.
    pub fn remove(&mut self, target: &V) -> bool {
        match self {
            IntervalStore::Nested(nc) => nc.remove(target),
            IntervalStore::Flat(flat) => flat.remove(target),
        }
    }

    /// True iff some stored interval equals `target` under [`Interval::equals_interval`].
    pub fn contains(&self, target: &V) -> bool {
        match self {
            IntervalStore::Nested(nc) => nc.contains(target),
            IntervalStore::Flat(flat) => flat.contains(target),
        }
    }

    /// Cardinality: stored intervals net of any pending additions/deletions.
    pub fn size(&self) -> usize {
        match self {
            IntervalStore::Nested(nc) => nc.len(),
            IntervalStore::Flat(flat) => flat.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Every stored interval `i` with `begin(i) <= to && end(i) >= from`, freshly allocated.
    pub fn find_overlaps(&mut self, from: i32, to: i32) -> Vec<&V> {
        let mut result = Vec::new();
        self.find_overlaps_into(from, to, &mut result);
        result
    }

    /// Like [`find_overlaps`](Self::find_overlaps), appending into a caller-provided buffer
    /// instead of allocating a fresh one.
    pub fn find_overlaps_into<'a>(&'a mut self, from: i32, to: i32, result: &mut Vec<&'a V>) {
        match self {
            IntervalStore::Nested(nc) => nc.find_overlaps(from, to, result),
            IntervalStore::Flat(flat) => flat.find_overlaps(from, to, result),
        }
    }

    /// Maximum containment chain length. `0` for an empty store, `1` when no stored interval
    /// properly contains another.
    pub fn get_depth(&mut self) -> usize {
        match self {
            IntervalStore::Nested(nc) => nc.depth(),
            IntervalStore::Flat(flat) => flat.depth(),
        }
    }

    /// Number of top-level (uncontained) intervals.
    pub fn get_width(&mut self) -> usize {
        match self {
            IntervalStore::Nested(nc) => nc.width(),
            IntervalStore::Flat(flat) => flat.width(),
        }
    }

    /// Structural self-check. A `false` result indicates a bug in this crate, not caller
    /// misuse — see the error taxonomy in the design doc.
    pub fn is_valid(&mut self) -> bool {
        match self {
            IntervalStore::Nested(nc) => nc.is_valid(),
            IntervalStore::Flat(flat) => flat.is_valid(),
        }
    }

    /// Force any deferred finalisation (draining [`FlatNestStore`]'s pending-add buffer and
    /// pending-delete bitmap) to run now. A no-op for [`NCList`], which never defers work.
    /// Idempotent: calling it twice in a row has no additional effect.
    pub fn revalidate(&mut self) {
        if let IntervalStore::Flat(flat) = self {
            flat.revalidate();
        }
    }

    /// Enumerate every stored interval, in engine-internal order. Not a mutating cursor: the
    /// returned iterator borrows the store and does not support removal.
    pub fn iter(&mut self) -> Box<dyn Iterator<Item = &V> + '_> {
        match self {
            IntervalStore::Nested(nc) => Box::new(nc.iter()),
            IntervalStore::Flat(flat) => Box::new(flat.iter()),
        }
    }

    /// The comparator this store was constructed with.
    pub fn endian(&self) -> Endian {
        match self {
            IntervalStore::Nested(nc) => nc.endian(),
            IntervalStore::Flat(flat) => flat.endian(),
        }
    }
}
