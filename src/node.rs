//! The per-item atomic link cell.
//!
//! Every item that participates in a list embeds exactly one [`Node`]: a
//! single `AtomicU64` holding the packed link word (see [`crate::links`]).
//! All list state about an item lives in this one word, so every structural
//! edit to the item commits with a single compare-and-swap.
//!
//! # Lifecycle
//!
//! ```text
//! fresh (NULL_LINK) → linked → deleting → NULL_LINK
//!        ^                                   |
//!        └──────── may be reused ────────────┘
//! ```
//!
//! A fresh node reads as [`NULL_LINK`]; linking gives it a live word;
//! removal moves it through the deleting state back to [`NULL_LINK`], after
//! which the caller may insert it again.

use std::fmt as StdFmt;
use std::sync::atomic::AtomicU64;

use crate::links::{Links, NULL_LINK, is_deleting};
use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD, RELAXED, WRITE_ORD};

// ============================================================================
//  ListItem
// ============================================================================

/// Types that embed a [`Node`] and can therefore be linked into a
/// [`List`](crate::List).
///
/// The accessor must always return the same embedded cell for the same item;
/// handing out a different `Node` on different calls corrupts the list.
pub trait ListItem {
    /// Borrow the embedded link cell.
    fn node(&self) -> &Node;
}

// ============================================================================
//  Node
// ============================================================================

/// A single atomic link word embedded in each item.
pub struct Node {
    word: AtomicU64,
}

impl Node {
    /// Create a fresh, unlinked node.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            word: AtomicU64::new(NULL_LINK),
        }
    }

    /// Load the raw link word (acquire).
    #[inline]
    #[must_use]
    pub fn load(&self) -> u64 {
        self.word.load(READ_ORD)
    }

    /// Publish a new link word (release).
    #[inline]
    pub(crate) fn store(&self, word: u64) {
        self.word.store(word, WRITE_ORD);
    }

    /// Store without ordering. Used to initialize a node's own links before
    /// the commit CAS that makes it reachable; the commit's release ordering
    /// publishes this store transitively.
    #[inline]
    pub(crate) fn store_relaxed(&self, word: u64) {
        self.word.store(word, RELAXED);
    }

    /// Single-word compare-and-swap on the link word.
    ///
    /// Returns `Err` with the observed word when the expectation failed.
    #[inline]
    pub(crate) fn cas(&self, expected: u64, desired: u64) -> Result<u64, u64> {
        self.word
            .compare_exchange(expected, desired, CAS_SUCCESS, CAS_FAILURE)
    }

    /// Whether the node is fully removed (or never inserted).
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.load() == NULL_LINK
    }

    /// Whether the node is unusable as an anchor: mid-removal or already
    /// fully removed.
    #[inline]
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        let word: u64 = self.load();
        word == NULL_LINK || is_deleting(word)
    }

    /// Reset the node to the fresh state.
    ///
    /// Relaxed: only legal when the caller knows no other thread can be
    /// observing this node (it was never published, or its unlink already
    /// finalized).
    #[inline]
    pub fn invalidate(&self) {
        self.word.store(NULL_LINK, RELAXED);
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        Self {
            word: AtomicU64::new(self.word.load(RELAXED)),
        }
    }
}

impl StdFmt::Debug for Node {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        let word: u64 = self.word.load(RELAXED);

        if word == NULL_LINK {
            f.write_str("Node(null)")
        } else {
            let links: Links = Links::unpack(word);
            f.debug_struct("Node")
                .field("next", &links.next)
                .field("prev", &links.prev)
                .field("vnext", &links.vnext)
                .field("vprev", &links.vprev)
                .finish()
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::{NULL_PTR, pack};

    #[test]
    fn fresh_node_is_null() {
        let node = Node::new();

        assert!(node.is_null());
        assert!(node.is_deleting(), "a null node is not a usable anchor");
    }

    #[test]
    fn default_matches_new() {
        assert!(Node::default().is_null());
    }

    #[test]
    fn linked_node_is_live() {
        let node = Node::new();
        node.store(pack(NULL_PTR, NULL_PTR, 0, 0));

        assert!(!node.is_null());
        assert!(!node.is_deleting());
    }

    #[test]
    fn deleting_node_is_not_null() {
        let node = Node::new();
        let word: u64 = Links::unpack(pack(3, 7, 0, 0)).deleting().pack();
        node.store(word);

        assert!(!node.is_null());
        assert!(node.is_deleting());
    }

    #[test]
    fn cas_succeeds_on_match() {
        let node = Node::new();
        let fresh: u64 = pack(1, 2, 0, 0);

        assert!(node.cas(NULL_LINK, fresh).is_ok());
        assert_eq!(node.load(), fresh);
    }

    #[test]
    fn cas_reports_observed_word() {
        let node = Node::new();

        let observed: Result<u64, u64> = node.cas(pack(1, 2, 0, 0), pack(3, 4, 0, 0));
        assert_eq!(observed, Err(NULL_LINK));
        assert!(node.is_null(), "failed CAS leaves the word untouched");
    }

    #[test]
    fn invalidate_resets() {
        let node = Node::new();
        node.store(pack(1, 2, 0, 0));
        node.invalidate();

        assert!(node.is_null());
    }

    #[test]
    fn clone_copies_current_word() {
        let node = Node::new();
        node.store(pack(5, 6, 1, 2));

        let copy: Node = node.clone();
        assert_eq!(copy.load(), node.load());
    }

    #[test]
    fn debug_formats_both_states() {
        let node = Node::new();
        assert_eq!(format!("{node:?}"), "Node(null)");

        node.store(pack(1, 2, 0, 0));
        let rendered: String = format!("{node:?}");
        assert!(rendered.contains("next: 1"));
        assert!(rendered.contains("prev: 2"));
    }
}
