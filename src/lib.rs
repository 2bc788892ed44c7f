//! # Slablist
//!
//! A lock-free intrusive doubly-linked list threaded through a caller-owned
//! contiguous array of item slots.
//!
//! Threads may concurrently insert at either end, insert adjacent to a known
//! item, remove a known item, search by predicate, and traverse in either
//! direction, without any lock. The list's entire state is two boundary
//! index atomics plus one 64-bit atomic word embedded in each item.
//!
//! ## Design
//!
//! - Both neighbor links of a node, with a small wrapping version counter
//!   per side, pack into a single `AtomicU64`. Every structural edit to a
//!   node is therefore one compare-and-swap: the cleanest linearization
//!   point obtainable without hardware double-word CAS.
//! - Removal is multi-phase: a node passes through an explicit deleting
//!   state before it reads as fully removed, so concurrent observers can
//!   distinguish "being unlinked" from "never existed" and from "safely
//!   gone".
//! - Traversal is self-healing: iterators validate the back edge of each
//!   node they step onto and re-anchor when concurrent edits shift the
//!   structure, surfacing an explicit [`IteratorInvalidated`] only after a
//!   bounded retry budget.
//!
//! The protocol is lock-free with bounded retry, not wait-free. Storage is
//! entirely the caller's: the list borrows the slot array, never allocates,
//! and never frees; removal unlinks a slot, nothing more.
//!
//! ## Example
//!
//! ```rust
//! use slablist::{List, ListItem, Node};
//!
//! struct Entry {
//!     value: u64,
//!     node: Node,
//! }
//!
//! impl ListItem for Entry {
//!     fn node(&self) -> &Node {
//!         &self.node
//!     }
//! }
//!
//! let slots: Vec<Entry> = (0..8)
//!     .map(|value| Entry { value, node: Node::new() })
//!     .collect();
//! let list = List::new(&slots);
//!
//! list.push_back(&slots[0]);
//! list.push_back(&slots[1]);
//! list.push_front(&slots[2]);
//!
//! let values: Vec<u64> = list
//!     .iter()
//!     .map(|item| item.expect("no concurrent edits").value)
//!     .collect();
//! assert_eq!(values, [2, 0, 1]);
//! ```

pub mod links;
pub mod list;
pub mod node;
pub mod ordering;

pub(crate) mod tracing_helpers;

pub use links::{Link, Links, MAX_CAPACITY};
pub use list::List;
pub use list::cursor::{Cursor, Iter, IteratorInvalidated, RevIter};
pub use node::{ListItem, Node};
