//! Standard memory orderings for link word and head/tail access.
//!
//! These constants ensure consistent ordering usage across the codebase
//! and make the intent clear at each access point.

use std::sync::atomic::Ordering;

/// Ordering for loads that feed a structural decision (link words, head,
/// tail). Pairs with the writers' Release stores.
pub const READ_ORD: Ordering = Ordering::Acquire;

/// Ordering for stores that publish a structural change (neighbor repair,
/// head/tail installation, finalize). Pairs with readers' Acquire loads.
pub const WRITE_ORD: Ordering = Ordering::Release;

/// Ordering for CAS success (commit CAS, head/tail CAS, repair CAS).
pub const CAS_SUCCESS: Ordering = Ordering::AcqRel;

/// Ordering for CAS failure. Only need to see the current value.
pub const CAS_FAILURE: Ordering = Ordering::Acquire;

/// Ordering for the element counter and for initializing a node's own links
/// before the commit CAS publishes them. The counter is an observable value,
/// not a synchronization channel.
pub const RELAXED: Ordering = Ordering::Relaxed;
