//! Error taxonomy for the core.
//!
//! The core never returns [`Result`] for ordinary control flow: `add`, `remove`, `contains`
//! and friends all signal success/failure with a `bool`. [`IntervalStoreError`] exists for
//! exactly one purpose — reporting the single fatal condition described in the design, an
//! internal precondition failure during [`NCList`](crate::NCList) construction or mutation,
//! where a node is asked to nest an interval it does not actually contain. That is a bug in
//! this crate, not a caller mistake, so it is surfaced as a panic carrying this error's
//! `Display` message rather than threaded through as a `Result`.
use thiserror::Error;

/// Fatal, engine-internal errors. See the module documentation for why these are only ever
/// used to construct a panic message, never propagated as a `Result`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IntervalStoreError {
    /// A node was asked to nest an interval `[begin, end]` that it does not actually contain.
    #[error(
        "invalid containment: node was asked to nest [{begin}, {end}] which it does not contain"
    )]
    InvalidContainment { begin: i32, end: i32 },
}
