//! Filepath: src/list.rs
//! `List` - a lock-free intrusive doubly-linked list over a caller-owned
//! slot array.
//!
//! The list never allocates: the caller supplies a contiguous slice of items,
//! each embedding a [`Node`] link cell, and the list links slots together by
//! index. All shared state is three atomics on the container (`head`, `tail`,
//! `len`) plus the one link word inside each node.
//!
//! # Concurrency Model
//!
//! Every mutator follows the same shape:
//!
//! 1. Read the target word(s) and validate the neighborhood is live.
//! 2. Commit with a single CAS on one word. This is the operation's
//!    linearization point.
//! 3. Repair the neighbors (and head/tail) with bounded follow-up CASes.
//!
//! Between steps 2 and 3 the back edges may briefly disagree with the forward
//! edges; traversals detect and heal this (see [`cursor`]). Each repair CAS
//! first re-checks that the neighbor is live and still points where the
//! repairing thread expects; a neighbor that moved on is someone else's
//! responsibility.
//!
//! All loops are bounded by `MAX_RETRIES`; a mutator that exhausts its
//! budget undoes its commit where possible and reports failure.

use std::fmt as StdFmt;
use std::hint as StdHint;
use std::sync::atomic::{AtomicU32, AtomicUsize};

use crate::links::{
    DELETING_MARK, Link, Links, MAX_CAPACITY, NULL_LINK, NULL_PTR, is_deleting, pack,
};
use crate::node::{ListItem, Node};
use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD, RELAXED};
use crate::tracing_helpers::{debug_log, warn_log};

mod insert;
mod remove;

pub mod cursor;

#[cfg(all(test, loom))]
mod loom_tests;

use cursor::{Cursor, Iter, RevIter};

/// Retry budget for every mutator loop and every repair loop.
pub(crate) const MAX_RETRIES: usize = 100;

// ============================================================================
//  List
// ============================================================================

/// A lock-free doubly-linked list threaded through a borrowed slot array.
///
/// The list borrows the array for its lifetime and never constructs,
/// destroys, or copies items; "removal" unlinks a slot but does not free
/// anything. Slots move through the lifecycle
/// `fresh → linked → deleting → fresh` and may be reinserted once they read
/// as null again.
///
/// All operations take `&self`; the list is `Send + Sync` whenever `T` is
/// `Sync`.
pub struct List<'s, T: ListItem> {
    /// The caller-owned backing array.
    slots: &'s [T],

    /// Index of the first element, or [`NULL_PTR`].
    head: AtomicU32,

    /// Index of the last element, or [`NULL_PTR`].
    tail: AtomicU32,

    /// Element count. Updated in its own atomic step after each commit, so it
    /// may momentarily lag the linked structure; it is eventually consistent
    /// with the linearized order.
    len: AtomicUsize,
}

impl<'s, T: ListItem> List<'s, T> {
    /// Create an empty list over `slots`.
    ///
    /// # Panics
    ///
    /// Panics if the array has more than [`MAX_CAPACITY`] slots (two link
    /// values are reserved).
    #[must_use]
    pub fn new(slots: &'s [T]) -> Self {
        assert!(size_of::<T>() > 0, "list items must have a size");
        assert!(
            slots.len() <= MAX_CAPACITY,
            "slot array exceeds the addressable link space"
        );

        Self {
            slots,
            head: AtomicU32::new(NULL_PTR),
            tail: AtomicU32::new(NULL_PTR),
            len: AtomicUsize::new(0),
        }
    }

    // ========================================================================
    //  Address Translation
    // ========================================================================

    /// Link (slot index) of an item.
    ///
    /// # Panics
    ///
    /// Panics if `item` is not an element of the backing array.
    #[expect(clippy::cast_possible_truncation, reason = "index < MAX_CAPACITY")]
    pub(crate) fn to_link(&self, item: &T) -> Link {
        let base: usize = self.slots.as_ptr() as usize;
        let addr: usize = std::ptr::from_ref(item) as usize;

        assert!(
            addr >= base && (addr - base) / size_of::<T>() < self.slots.len(),
            "item is outside the backing array"
        );
        debug_assert_eq!((addr - base) % size_of::<T>(), 0);

        ((addr - base) / size_of::<T>()) as Link
    }

    /// Item stored in a slot.
    #[inline]
    pub(crate) fn to_item(&self, link: Link) -> &'s T {
        &self.slots[link as usize]
    }

    /// Link cell of a slot.
    #[inline]
    pub(crate) fn node_at(&self, link: Link) -> &'s Node {
        self.slots[link as usize].node()
    }

    // ========================================================================
    //  Observers
    // ========================================================================

    /// Current element count.
    ///
    /// The counter is maintained in a separate atomic step from the commit
    /// CAS, so under concurrent mutation it may briefly differ from what a
    /// traversal would enumerate.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(RELAXED)
    }

    /// Whether the list holds no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots in the backing array.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// First element, if any.
    ///
    /// The reference is only guaranteed live at the moment of the load; a
    /// concurrent removal may unlink it immediately after.
    #[must_use]
    pub fn front(&self) -> Option<&'s T> {
        let head: Link = self.head.load(READ_ORD);
        (head != NULL_PTR).then(|| self.to_item(head))
    }

    /// Last element, if any. Same liveness caveat as [`front`](Self::front).
    #[must_use]
    pub fn back(&self) -> Option<&'s T> {
        let tail: Link = self.tail.load(READ_ORD);
        (tail != NULL_PTR).then(|| self.to_item(tail))
    }

    // ========================================================================
    //  Traversal Constructors
    // ========================================================================

    /// Cursor positioned on the first element (or at the end if empty).
    #[must_use]
    pub fn cursor_front(&self) -> Cursor<'_, 's, T> {
        Cursor::new(self, self.head.load(READ_ORD), NULL_PTR)
    }

    /// Cursor positioned past the last element, carrying the tail so that
    /// backward stepping can start from it.
    #[must_use]
    pub fn cursor_back(&self) -> Cursor<'_, 's, T> {
        Cursor::new(self, NULL_PTR, self.tail.load(READ_ORD))
    }

    /// Self-healing forward iterator.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, 's, T> {
        Iter::new(self.cursor_front())
    }

    /// Self-healing reverse iterator.
    #[must_use]
    pub fn iter_rev(&self) -> RevIter<'_, 's, T> {
        RevIter::new(self.cursor_back())
    }

    // ========================================================================
    //  push_front / push_back
    // ========================================================================

    /// Insert `item` at the front.
    ///
    /// `item` must be a slot of the backing array in the null (unlinked)
    /// state. Returns `false` if the retry budget was exhausted or the old
    /// head vanished mid-operation; the item is left unlinked and the caller
    /// may retry.
    pub fn push_front(&self, item: &T) -> bool {
        let new_link: Link = self.to_link(item);
        let node: &Node = item.node();
        debug_assert!(node.is_null(), "pushed item must be unlinked");

        for _ in 0..MAX_RETRIES {
            let old_head: Link = self.head.load(READ_ORD);

            if old_head == NULL_PTR {
                node.store_relaxed(pack(NULL_PTR, NULL_PTR, 0, 0));
                if self
                    .head
                    .compare_exchange(NULL_PTR, new_link, CAS_SUCCESS, CAS_FAILURE)
                    .is_err()
                {
                    continue;
                }
                let _ = self
                    .tail
                    .compare_exchange(NULL_PTR, new_link, CAS_SUCCESS, CAS_FAILURE);
                self.len.fetch_add(1, RELAXED);
                return true;
            }

            // The current head must be live before we hang ourselves in
            // front of it; a head mid-removal is its deleter's to replace.
            let head_node: &Node = self.node_at(old_head);
            let observed: u64 = head_node.load();
            if observed == NULL_LINK || is_deleting(observed) {
                StdHint::spin_loop();
                continue;
            }

            // Publish the new node's own links first; the head CAS's release
            // ordering carries this store to any acquirer of head.
            node.store_relaxed(pack(old_head, NULL_PTR, 0, 0));
            if self
                .head
                .compare_exchange(old_head, new_link, CAS_SUCCESS, CAS_FAILURE)
                .is_err()
            {
                continue;
            }

            // Commit point: the list starts at `new_link` now. Take the old
            // head's back edge.
            let mut seen: u64 = observed;
            let mut last_live: u64 = observed;
            let mut repaired: bool = false;
            let mut target: Link = old_head;
            for _ in 0..MAX_RETRIES {
                let links: Links = Links::unpack(seen);
                if seen == NULL_LINK || links.is_deleting() {
                    // Deleter's successor, as of the last live word we saw.
                    target = Links::unpack(last_live).next;
                    break;
                }
                if links.prev != NULL_PTR {
                    // An insert in front of the old head committed first;
                    // its node is the head candidate now.
                    target = links.prev;
                    break;
                }
                last_live = seen;
                match head_node.cas(seen, links.with_prev(new_link).pack()) {
                    Ok(_) => {
                        repaired = true;
                        break;
                    }
                    Err(actual) => seen = actual,
                }
            }

            if repaired {
                if self.tail.load(READ_ORD) == NULL_PTR {
                    let _ = self
                        .tail
                        .compare_exchange(NULL_PTR, new_link, CAS_SUCCESS, CAS_FAILURE);
                }
                self.len.fetch_add(1, RELAXED);
                return true;
            }

            // The old head was unlinked (or claimed by an insertion) before
            // we could take its back edge. Hand the head slot to its
            // rightful owner and report failure.

            if self
                .head
                .compare_exchange(new_link, target, CAS_SUCCESS, CAS_FAILURE)
                .is_ok()
            {
                node.invalidate();
                warn_log!(link = new_link, "push_front: old head vanished, rolled back");
                return false;
            }

            // Newer pushes already stacked on top of us; we cannot
            // unpublish. Splice our own forward edge past the dead head and
            // stay linked instead.
            let mut word: u64 = node.load();
            for _ in 0..MAX_RETRIES {
                let links: Links = Links::unpack(word);
                match node.cas(word, links.with_next(target).pack()) {
                    Ok(_) => break,
                    Err(actual) => word = actual,
                }
            }
            self.len.fetch_add(1, RELAXED);
            debug_log!(link = new_link, "push_front: spliced past removed head");
            return true;
        }

        node.invalidate();
        warn_log!(link = new_link, "push_front: retry budget exhausted");
        false
    }

    /// Insert `item` at the back. Mirror of [`push_front`](Self::push_front).
    pub fn push_back(&self, item: &T) -> bool {
        let new_link: Link = self.to_link(item);
        let node: &Node = item.node();
        debug_assert!(node.is_null(), "pushed item must be unlinked");

        for _ in 0..MAX_RETRIES {
            let old_tail: Link = self.tail.load(READ_ORD);

            if old_tail == NULL_PTR {
                node.store_relaxed(pack(NULL_PTR, NULL_PTR, 0, 0));
                if self
                    .tail
                    .compare_exchange(NULL_PTR, new_link, CAS_SUCCESS, CAS_FAILURE)
                    .is_err()
                {
                    continue;
                }
                let _ = self
                    .head
                    .compare_exchange(NULL_PTR, new_link, CAS_SUCCESS, CAS_FAILURE);
                self.len.fetch_add(1, RELAXED);
                return true;
            }

            let tail_node: &Node = self.node_at(old_tail);
            let observed: u64 = tail_node.load();
            if observed == NULL_LINK || is_deleting(observed) {
                StdHint::spin_loop();
                continue;
            }

            node.store_relaxed(pack(NULL_PTR, old_tail, 0, 0));
            if self
                .tail
                .compare_exchange(old_tail, new_link, CAS_SUCCESS, CAS_FAILURE)
                .is_err()
            {
                continue;
            }

            // Commit point. Take the old tail's forward edge.
            let mut seen: u64 = observed;
            let mut last_live: u64 = observed;
            let mut repaired: bool = false;
            let mut target: Link = old_tail;
            for _ in 0..MAX_RETRIES {
                let links: Links = Links::unpack(seen);
                if seen == NULL_LINK || links.is_deleting() {
                    target = Links::unpack(last_live).prev;
                    break;
                }
                if links.next != NULL_PTR {
                    target = links.next;
                    break;
                }
                last_live = seen;
                match tail_node.cas(seen, links.with_next(new_link).pack()) {
                    Ok(_) => {
                        repaired = true;
                        break;
                    }
                    Err(actual) => seen = actual,
                }
            }

            if repaired {
                if self.head.load(READ_ORD) == NULL_PTR {
                    let _ = self
                        .head
                        .compare_exchange(NULL_PTR, new_link, CAS_SUCCESS, CAS_FAILURE);
                }
                self.len.fetch_add(1, RELAXED);
                return true;
            }

            if self
                .tail
                .compare_exchange(new_link, target, CAS_SUCCESS, CAS_FAILURE)
                .is_ok()
            {
                node.invalidate();
                warn_log!(link = new_link, "push_back: old tail vanished, rolled back");
                return false;
            }

            let mut word: u64 = node.load();
            for _ in 0..MAX_RETRIES {
                let links: Links = Links::unpack(word);
                match node.cas(word, links.with_prev(target).pack()) {
                    Ok(_) => break,
                    Err(actual) => word = actual,
                }
            }
            self.len.fetch_add(1, RELAXED);
            debug_log!(link = new_link, "push_back: spliced past removed tail");
            return true;
        }

        node.invalidate();
        warn_log!(link = new_link, "push_back: retry budget exhausted");
        false
    }

    // ========================================================================
    //  pop_front / pop_back
    // ========================================================================

    /// Remove and return the first element, or `None` if the list is empty
    /// or the budget was exhausted under contention.
    pub fn pop_front(&self) -> Option<&'s T> {
        for _ in 0..MAX_RETRIES {
            let head: Link = self.head.load(READ_ORD);
            if head == NULL_PTR {
                return None;
            }
            if let Some(item) = self.remove(self.to_item(head)) {
                return Some(item);
            }
            // Someone else removed the head first; reread.
        }
        None
    }

    /// Remove and return the last element. Mirror of
    /// [`pop_front`](Self::pop_front).
    pub fn pop_back(&self) -> Option<&'s T> {
        for _ in 0..MAX_RETRIES {
            let tail: Link = self.tail.load(READ_ORD);
            if tail == NULL_PTR {
                return None;
            }
            if let Some(item) = self.remove(self.to_item(tail)) {
                return Some(item);
            }
        }
        None
    }

    // ========================================================================
    //  find
    // ========================================================================

    /// First element matching `predicate`, scanning forward from the head.
    ///
    /// The returned reference is only guaranteed live at the moment the
    /// predicate matched; a concurrent removal (and subsequent reuse of the
    /// slot) may rewrite its contents afterwards. Use
    /// [`find_live`](Self::find_live) to re-validate the match.
    pub fn find<P>(&self, mut predicate: P) -> Option<&'s T>
    where
        P: FnMut(&T) -> bool,
    {
        let mut restarts: usize = 0;
        let mut cur: Link = self.head.load(READ_ORD);

        loop {
            if cur == NULL_PTR || cur == DELETING_MARK {
                return None;
            }

            let word: u64 = self.node_at(cur).load();
            if word == NULL_LINK || is_deleting(word) {
                // The node vanished underneath the scan; start over.
                restarts += 1;
                if restarts > MAX_RETRIES {
                    return None;
                }
                cur = self.head.load(READ_ORD);
                continue;
            }

            let item: &'s T = self.to_item(cur);
            if predicate(item) {
                return Some(item);
            }

            cur = Links::unpack(word).next;
        }
    }

    /// Like [`find`](Self::find), but re-checks that the matched node is
    /// still linked after the predicate accepted it. A match torn down
    /// concurrently is skipped and the scan restarts.
    pub fn find_live<P>(&self, mut predicate: P) -> Option<&'s T>
    where
        P: FnMut(&T) -> bool,
    {
        let mut restarts: usize = 0;
        let mut cur: Link = self.head.load(READ_ORD);

        loop {
            if cur == NULL_PTR || cur == DELETING_MARK {
                return None;
            }

            let word: u64 = self.node_at(cur).load();
            if word == NULL_LINK || is_deleting(word) {
                restarts += 1;
                if restarts > MAX_RETRIES {
                    return None;
                }
                cur = self.head.load(READ_ORD);
                continue;
            }

            let item: &'s T = self.to_item(cur);
            if predicate(item) {
                let recheck: u64 = self.node_at(cur).load();
                if recheck != NULL_LINK && !is_deleting(recheck) {
                    return Some(item);
                }
                restarts += 1;
                if restarts > MAX_RETRIES {
                    return None;
                }
                cur = self.head.load(READ_ORD);
                continue;
            }

            cur = Links::unpack(word).next;
        }
    }

    // ========================================================================
    //  Neighbor Repair
    // ========================================================================

    /// Swing `target`'s back edge from `expected_prev` to `new_prev`.
    ///
    /// Succeeds only while `target` is live and still points at
    /// `expected_prev`; a target that was unlinked or re-pointed in the
    /// meantime belongs to another mutator and is left alone.
    pub(crate) fn repair_prev_of(&self, target: Link, expected_prev: Link, new_prev: Link) -> bool {
        let node: &Node = self.node_at(target);

        for _ in 0..MAX_RETRIES {
            let word: u64 = node.load();
            if word == NULL_LINK {
                return false;
            }
            let links: Links = Links::unpack(word);
            if links.is_deleting() || links.prev != expected_prev {
                return false;
            }
            if node.cas(word, links.with_prev(new_prev).pack()).is_ok() {
                return true;
            }
        }

        debug_log!(node = target, "repair_prev_of: budget exhausted");
        false
    }

    /// Swing `target`'s forward edge from `expected_next` to `new_next`.
    /// Mirror of [`repair_prev_of`](Self::repair_prev_of).
    pub(crate) fn repair_next_of(&self, target: Link, expected_next: Link, new_next: Link) -> bool {
        let node: &Node = self.node_at(target);

        for _ in 0..MAX_RETRIES {
            let word: u64 = node.load();
            if word == NULL_LINK {
                return false;
            }
            let links: Links = Links::unpack(word);
            if links.is_deleting() || links.next != expected_next {
                return false;
            }
            if node.cas(word, links.with_next(new_next).pack()).is_ok() {
                return true;
            }
        }

        debug_log!(node = target, "repair_next_of: budget exhausted");
        false
    }
}

impl<T: ListItem> StdFmt::Debug for List<'_, T> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("List")
            .field("head", &self.head.load(RELAXED))
            .field("tail", &self.tail.load(RELAXED))
            .field("len", &self.len.load(RELAXED))
            .field("capacity", &self.slots.len())
            .finish()
    }
}

impl<'l, 's, T: ListItem> IntoIterator for &'l List<'s, T> {
    type Item = Result<&'s T, cursor::IteratorInvalidated>;
    type IntoIter = Iter<'l, 's, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
//  Tests
// ============================================================================
