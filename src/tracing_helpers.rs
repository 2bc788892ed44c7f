//! Zero-cost tracing facade.
//!
//! The list is a library and stays silent by default: without the `tracing`
//! cargo feature every macro below compiles to nothing, so the hot CAS loops
//! carry no logging overhead. With the feature enabled the macros forward to
//! the `tracing` crate under the `slablist` target. Call sites tag each
//! event with the slot links involved (`link = ...`, `anchor = ...`) so a
//! trace can be read back against a slab snapshot.
//!
//! ```bash
//! RUST_LOG=slablist=trace cargo test --features tracing
//! ```

/// Traversal-level events: cursor re-anchoring, stepping through unlinks.
#[cfg(feature = "tracing")]
macro_rules! trace_log {
    ($($event:tt)+) => {
        tracing::trace!(target: "slablist", $($event)+)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_log {
    ($($event:tt)+) => {};
}

/// Mutator bookkeeping: rollbacks, abandoned stitches, kept half-links.
#[cfg(feature = "tracing")]
macro_rules! debug_log {
    ($($event:tt)+) => {
        tracing::debug!(target: "slablist", $($event)+)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_log {
    ($($event:tt)+) => {};
}

/// Mutator failures handed back to the caller: retry budgets running dry.
#[cfg(feature = "tracing")]
macro_rules! warn_log {
    ($($event:tt)+) => {
        tracing::warn!(target: "slablist", $($event)+)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn_log {
    ($($event:tt)+) => {};
}

pub(crate) use debug_log;
pub(crate) use trace_log;
pub(crate) use warn_log;
