//! Anchored insertion.
//!
//! `insert_after` commits on the anchor's forward edge, `insert_before` on
//! its backward edge; the opposite edge of the affected neighbor is repaired
//! after the commit. When the neighbor turns out to be mid-removal, the
//! rollback does not blindly reinstate the old link (that could resurrect an
//! edge into a finalized slot): it adopts the deleter's target instead, which
//! is exactly the repair the deleter skipped when it saw our half-linked
//! node.

use crate::links::{Link, Links, NULL_LINK, NULL_PTR, is_deleting, pack};
use crate::node::{ListItem, Node};
use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD, RELAXED};
use crate::tracing_helpers::{debug_log, warn_log};

use super::{List, MAX_RETRIES};

impl<'s, T: ListItem> List<'s, T> {
    /// Link `item` immediately after `anchor`.
    ///
    /// `anchor` must currently be in this list and `item` must be an
    /// unlinked slot of the backing array. Returns `false` when the anchor
    /// is removed or mid-removal, or when the retry budget ran out; `item`
    /// is left unlinked either way.
    pub fn insert_after(&self, anchor: &T, item: &T) -> bool {
        let anchor_link: Link = self.to_link(anchor);
        let new_link: Link = self.to_link(item);
        let anchor_node: &Node = anchor.node();
        let new_node: &Node = item.node();
        debug_assert!(new_node.is_null(), "inserted item must be unlinked");

        for _ in 0..MAX_RETRIES {
            let word: u64 = anchor_node.load();
            if word == NULL_LINK {
                break;
            }
            let links: Links = Links::unpack(word);
            if links.is_deleting() {
                break;
            }

            // Wait out a successor that is mid-removal: its deleter is about
            // to relink the anchor's forward edge anyway.
            if links.next != NULL_PTR {
                let successor: u64 = self.node_at(links.next).load();
                if successor == NULL_LINK || is_deleting(successor) {
                    std::hint::spin_loop();
                    continue;
                }
            }

            // Publish the new node's own links, then commit on the anchor.
            new_node.store_relaxed(pack(links.next, anchor_link, 0, 0));
            let desired: u64 = links.with_next(new_link).pack();
            if anchor_node.cas(word, desired).is_err() {
                continue;
            }

            // Commit point: the anchor's forward edge now reaches the new
            // node. Take the successor's back edge (or the tail slot).
            if links.next == NULL_PTR {
                let _ = self
                    .tail
                    .compare_exchange(anchor_link, new_link, CAS_SUCCESS, CAS_FAILURE);
                self.len.fetch_add(1, RELAXED);
                return true;
            }
            if self.repair_prev_of(links.next, anchor_link, new_link) {
                self.len.fetch_add(1, RELAXED);
                return true;
            }

            // The successor was unlinked (or re-pointed) after our commit.
            // Undo the commit, steering the anchor's forward edge to the
            // successor's replacement when one is known.
            let restore_next: Link = self.successor_fallback(anchor_link, links.next, new_link);
            let restore: u64 = Links::unpack(desired).with_next(restore_next).pack();
            if anchor_node.cas(desired, restore).is_err() {
                // The anchor moved on with our half-link woven in (its
                // deleter recorded the new node as successor, or another
                // insert chained onto it). The insertion stands; converge
                // the new node's stale forward edge ourselves.
                self.adopt_forward_edge(new_link);
                self.len.fetch_add(1, RELAXED);
                debug_log!(anchor = anchor_link, "insert_after: kept through anchor turnover");
                return true;
            }
            debug_log!(
                anchor = anchor_link,
                "insert_after: successor vanished, rolled back"
            );
        }

        new_node.invalidate();
        warn_log!(anchor = anchor_link, link = new_link, "insert_after failed");
        false
    }

    /// Link `item` immediately before `anchor`. Mirror of
    /// [`insert_after`](Self::insert_after).
    pub fn insert_before(&self, anchor: &T, item: &T) -> bool {
        let anchor_link: Link = self.to_link(anchor);
        let new_link: Link = self.to_link(item);
        let anchor_node: &Node = anchor.node();
        let new_node: &Node = item.node();
        debug_assert!(new_node.is_null(), "inserted item must be unlinked");

        for _ in 0..MAX_RETRIES {
            let word: u64 = anchor_node.load();
            if word == NULL_LINK {
                break;
            }
            let links: Links = Links::unpack(word);
            if links.is_deleting() {
                break;
            }

            // Wait out a predecessor that is mid-removal.
            if links.prev != NULL_PTR {
                let predecessor: u64 = self.node_at(links.prev).load();
                if predecessor == NULL_LINK || is_deleting(predecessor) {
                    std::hint::spin_loop();
                    continue;
                }
            }

            new_node.store_relaxed(pack(anchor_link, links.prev, 0, 0));
            let desired: u64 = links.with_prev(new_link).pack();
            if anchor_node.cas(word, desired).is_err() {
                continue;
            }

            // Commit point. Take the predecessor's forward edge (or the
            // head slot).
            if links.prev == NULL_PTR {
                let _ = self
                    .head
                    .compare_exchange(anchor_link, new_link, CAS_SUCCESS, CAS_FAILURE);
                self.len.fetch_add(1, RELAXED);
                return true;
            }
            if self.repair_next_of(links.prev, anchor_link, new_link) {
                self.len.fetch_add(1, RELAXED);
                return true;
            }

            let restore_prev: Link = self.predecessor_fallback(anchor_link, links.prev, new_link);
            let restore: u64 = Links::unpack(desired).with_prev(restore_prev).pack();
            if anchor_node.cas(desired, restore).is_err() {
                // The anchor moved on with our half-link woven in; the
                // insertion stands. Converge the new node's stale back edge.
                self.adopt_back_edge(new_link);
                self.len.fetch_add(1, RELAXED);
                debug_log!(anchor = anchor_link, "insert_before: kept through anchor turnover");
                return true;
            }
            debug_log!(
                anchor = anchor_link,
                "insert_before: predecessor vanished, rolled back"
            );
        }

        new_node.invalidate();
        warn_log!(anchor = anchor_link, link = new_link, "insert_before failed");
        false
    }

    // ========================================================================
    //  Rollback Targets
    // ========================================================================

    /// Replacement for a vanished predecessor of `anchor`.
    ///
    /// A deleting predecessor still carries its own back edge, which is the
    /// link its deleter meant to hand to the anchor. Once it has finalized
    /// that information is gone and we fall back to scanning the slab for the
    /// live node whose forward edge reaches the anchor.
    fn predecessor_fallback(&self, anchor: Link, stale: Link, skip: Link) -> Link {
        let word: u64 = self.node_at(stale).load();
        if is_deleting(word) {
            return Links::unpack(word).prev;
        }
        if word != NULL_LINK {
            // Still live: it was merely re-pointed; reinstate and retry.
            return stale;
        }
        if self.head.load(READ_ORD) == anchor {
            return NULL_PTR;
        }
        self.scan_for(skip, |links| links.next == anchor)
            .unwrap_or(stale)
    }

    /// Replacement for a vanished successor of `anchor`. The deleting state
    /// destroys the forward edge, so this always resolves through the slab:
    /// the successor's own successor has either already been re-pointed at
    /// the anchor or still points at the dead slot.
    fn successor_fallback(&self, anchor: Link, stale: Link, skip: Link) -> Link {
        let word: u64 = self.node_at(stale).load();
        if word != NULL_LINK && !is_deleting(word) {
            return stale;
        }
        if self.tail.load(READ_ORD) == anchor {
            return NULL_PTR;
        }
        self.scan_for(skip, |links| links.prev == anchor || links.prev == stale)
            .unwrap_or(stale)
    }

    /// Converge a kept node's back side: its recorded predecessor may be
    /// mid-removal, and that predecessor's deleter does not know about this
    /// node. Adopt the deleter's replacement and make sure the replacement's
    /// forward edge reaches us.
    fn adopt_back_edge(&self, link: Link) {
        let node: &Node = self.node_at(link);

        for _ in 0..MAX_RETRIES {
            let word: u64 = node.load();
            if word == NULL_LINK || is_deleting(word) {
                return;
            }
            let links: Links = Links::unpack(word);
            if links.prev == NULL_PTR {
                return;
            }

            let prev_word: u64 = self.node_at(links.prev).load();
            if prev_word != NULL_LINK && !is_deleting(prev_word) {
                let prev_links: Links = Links::unpack(prev_word);
                if prev_links.next == link {
                    return;
                }
                if self.is_gap(prev_links.next) {
                    let _ = self
                        .node_at(links.prev)
                        .cas(prev_word, prev_links.with_next(link).pack());
                }
                continue;
            }

            let replacement: Link = self.predecessor_fallback(link, links.prev, link);
            if replacement == links.prev {
                std::hint::spin_loop();
                continue;
            }
            let _ = node.cas(word, links.with_prev(replacement).pack());
        }

        debug_log!(link, "adopt_back_edge: budget exhausted");
    }

    /// Mirror of [`adopt_back_edge`](Self::adopt_back_edge) for a kept
    /// node's forward side.
    fn adopt_forward_edge(&self, link: Link) {
        let node: &Node = self.node_at(link);

        for _ in 0..MAX_RETRIES {
            let word: u64 = node.load();
            if word == NULL_LINK || is_deleting(word) {
                return;
            }
            let links: Links = Links::unpack(word);
            if links.next == NULL_PTR {
                return;
            }

            let next_word: u64 = self.node_at(links.next).load();
            if next_word != NULL_LINK && !is_deleting(next_word) {
                let next_links: Links = Links::unpack(next_word);
                if next_links.prev == link {
                    return;
                }
                if self.is_gap(next_links.prev) {
                    let _ = self
                        .node_at(links.next)
                        .cas(next_word, next_links.with_prev(link).pack());
                }
                continue;
            }

            let replacement: Link = self.successor_fallback(link, links.next, link);
            if replacement == links.next {
                std::hint::spin_loop();
                continue;
            }
            let _ = node.cas(word, links.with_next(replacement).pack());
        }

        debug_log!(link, "adopt_forward_edge: budget exhausted");
    }

    /// Linear slab scan for a not-yet-finalized node matching `matches`,
    /// skipping the half-linked candidate slot.
    #[expect(clippy::cast_possible_truncation, reason = "index < MAX_CAPACITY")]
    fn scan_for<F>(&self, skip: Link, matches: F) -> Option<Link>
    where
        F: Fn(Links) -> bool,
    {
        for (index, slot) in self.slots.iter().enumerate() {
            if index as Link == skip {
                continue;
            }
            let word: u64 = slot.node().load();
            if word == NULL_LINK {
                continue;
            }
            if matches(Links::unpack(word)) {
                return Some(index as Link);
            }
        }
        None
    }
}
