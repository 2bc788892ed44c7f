//! Filepath: src/list/remove.rs
//! Multi-phase unlink.
//!
//! Removal owns a distinguished in-progress state so that any observer
//! reading the word between phases can still make progress and cannot be
//! misled into updating a half-deleted neighbor:
//!
//! ```text
//! 1. Commit CAS: next field -> DELETING_MARK (prev stays readable).
//!    This is the linearization point; the element count drops here.
//! 2. Stitch the surrounding edges (and head/tail) over the gap.
//! 3. Finalize: store NULL_LINK (release). The slot is reusable.
//! ```
//!
//! Going straight to `NULL_LINK` would race with neighbors that have already
//! read the old link and are about to CAS; the deleting state gives them
//! something to classify.
//!
//! Adjacent removals form a *run* of deleting nodes. The mark destroys the
//! forward edge of each node in the run, but every back edge stays frozen in
//! its word, so a deleter can usually walk backward to the first live
//! predecessor. A deleter that finalized early tears that chain for the ones
//! still stitching; they recover by locating the surviving forward edge
//! aimed into the gap (each finalized deleter has already re-aimed it one
//! hop further). Each deleter stitches its own gap; late stitches observe an
//! already-healed edge and stand down, so the run converges regardless of
//! completion order.

use crate::links::{Link, Links, NULL_LINK, NULL_PTR, is_deleting};
use crate::node::{ListItem, Node};
use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD, RELAXED};
use crate::tracing_helpers::debug_log;

use super::{List, MAX_RETRIES};

impl<'s, T: ListItem> List<'s, T> {
    /// Unlink `item` from the list.
    ///
    /// Returns the item on success; `None` if the slot was already removed,
    /// another thread owns its deletion, or the retry budget ran out before
    /// the commit CAS landed. After a successful return the slot reads as
    /// null and may be reinserted.
    ///
    /// Edge stitching may be abandoned under extreme contention; the
    /// deletion itself is still committed, and the surviving deleters'
    /// stitches converge the structure.
    pub fn remove(&self, item: &T) -> Option<&'s T> {
        let link: Link = self.to_link(item);
        let node: &Node = item.node();

        for _ in 0..MAX_RETRIES {
            let word: u64 = node.load();
            if word == NULL_LINK {
                return None;
            }
            let links: Links = Links::unpack(word);
            if links.is_deleting() {
                // Another thread owns this deletion.
                return None;
            }

            // Commit CAS: from here on this thread owns the unlink.
            if node.cas(word, links.deleting().pack()).is_err() {
                continue;
            }
            self.len.fetch_sub(1, RELAXED);

            self.stitch_forward(link, links.prev, links.next);
            self.stitch_backward(link, links.prev, links.next);

            // Finalize: the slot is fully removed and reusable.
            node.store(NULL_LINK);
            return Some(self.to_item(link));
        }

        None
    }

    // ========================================================================
    //  Gap Stitching
    // ========================================================================

    /// Aim the forward edge of the gap's live predecessor past this node.
    ///
    /// When the gap reaches the front of the list, the edge to fix is the
    /// head slot instead.
    fn stitch_forward(&self, link: Link, orig_prev: Link, orig_next: Link) {
        for _ in 0..MAX_RETRIES {
            let Some(live_prev) = self.resolve_live_predecessor(link, orig_prev, orig_next) else {
                std::hint::spin_loop();
                continue;
            };

            if live_prev == NULL_PTR {
                self.hand_off_head(link, orig_next);
                return;
            }

            let prev_node: &Node = self.node_at(live_prev);
            let word: u64 = prev_node.load();
            if word == NULL_LINK || is_deleting(word) {
                // The predecessor joined the run; re-resolve.
                continue;
            }
            let links: Links = Links::unpack(word);
            if links.next != link && !self.is_gap(links.next) {
                // Someone already aimed this edge at a live node.
                return;
            }
            if prev_node
                .cas(word, links.with_next(orig_next).pack())
                .is_ok()
            {
                return;
            }
        }

        debug_log!(link, "stitch_forward: budget exhausted");
    }

    /// Aim the back edge of this node's recorded successor past the gap.
    ///
    /// If that successor is itself deleting, its deleter's own stitches walk
    /// back through this node's frozen chain and cover the edge, so there is
    /// nothing to do here.
    fn stitch_backward(&self, link: Link, orig_prev: Link, orig_next: Link) {
        if orig_next == NULL_PTR {
            self.hand_off_tail(link, orig_prev);
            return;
        }

        let succ_node: &Node = self.node_at(orig_next);
        for _ in 0..MAX_RETRIES {
            let word: u64 = succ_node.load();
            if word == NULL_LINK || is_deleting(word) {
                return;
            }
            let links: Links = Links::unpack(word);
            if links.prev != link && !self.is_gap(links.prev) {
                return;
            }
            let Some(live_prev) = self.resolve_live_predecessor(link, orig_prev, orig_next) else {
                std::hint::spin_loop();
                continue;
            };
            if succ_node
                .cas(word, links.with_prev(live_prev).pack())
                .is_ok()
            {
                return;
            }
        }

        debug_log!(link, "stitch_backward: budget exhausted");
    }

    /// Live node on the near side of the gap containing `link`, or
    /// [`NULL_PTR`] when the gap reaches the front of the list.
    ///
    /// Resolution order:
    /// 1. Walk the frozen back-edge chain from this node's recorded `prev`.
    /// 2. If a finalized slot tore the chain, its deleter has already aimed
    ///    the surviving forward edge deeper into the gap; scan the slab for
    ///    the live node whose `next` reaches this node, or that already reaches
    ///    the gap's successor, when the forward side has fully healed.
    /// 3. Failing both, the head may carry the edge: it either still names
    ///    this node or was already handed past the whole gap to its
    ///    successor.
    ///
    /// `None` means the picture is mid-change; the caller retries.
    fn resolve_live_predecessor(&self, link: Link, orig_prev: Link, orig_next: Link) -> Option<Link> {
        let mut candidate: Link = orig_prev;
        let mut torn: bool = false;

        for _ in 0..=MAX_RETRIES {
            if candidate == NULL_PTR {
                return Some(NULL_PTR);
            }
            let word: u64 = self.node_at(candidate).load();
            if word == NULL_LINK {
                torn = true;
                break;
            }
            let links: Links = Links::unpack(word);
            if !links.is_deleting() {
                return Some(candidate);
            }
            candidate = links.prev;
        }

        if !torn {
            return None;
        }

        #[expect(clippy::cast_possible_truncation, reason = "index < MAX_CAPACITY")]
        let scanned: Option<Link> = self.slots.iter().enumerate().find_map(|(index, slot)| {
            if index as Link == link {
                return None;
            }
            let word: u64 = slot.node().load();
            if word == NULL_LINK {
                return None;
            }
            let links: Links = Links::unpack(word);
            let reaches_gap: bool =
                links.next == link || (orig_next != NULL_PTR && links.next == orig_next);
            (!links.is_deleting() && reaches_gap).then_some(index as Link)
        });
        if scanned.is_some() {
            return scanned;
        }

        let head: Link = self.head.load(READ_ORD);
        (head == link || (orig_next != NULL_PTR && head == orig_next)).then_some(NULL_PTR)
    }

    /// Whether a link points into a removed or deleting slot.
    pub(super) fn is_gap(&self, link: Link) -> bool {
        if link == NULL_PTR {
            return false;
        }
        let word: u64 = self.node_at(link).load();
        word == NULL_LINK || is_deleting(word)
    }

    /// Swing the head slot past this node once it reaches it. Another
    /// deleter may still be handing the head along the run; wait our turn
    /// within the budget.
    fn hand_off_head(&self, link: Link, orig_next: Link) {
        for _ in 0..MAX_RETRIES {
            let head: Link = self.head.load(READ_ORD);
            if head == link {
                if self
                    .head
                    .compare_exchange(link, orig_next, CAS_SUCCESS, CAS_FAILURE)
                    .is_ok()
                {
                    return;
                }
                continue;
            }
            if !self.is_gap(head) {
                // A live head is installed; nothing left to hand off.
                return;
            }
            std::hint::spin_loop();
        }

        debug_log!(link, "hand_off_head: budget exhausted");
    }

    /// Swing the tail slot backward past this node once it reaches it.
    fn hand_off_tail(&self, link: Link, orig_prev: Link) {
        for _ in 0..MAX_RETRIES {
            let tail: Link = self.tail.load(READ_ORD);
            if tail == link {
                let Some(target) = self.resolve_live_predecessor(link, orig_prev, NULL_PTR) else {
                    std::hint::spin_loop();
                    continue;
                };
                if self
                    .tail
                    .compare_exchange(link, target, CAS_SUCCESS, CAS_FAILURE)
                    .is_ok()
                {
                    return;
                }
                continue;
            }
            if !self.is_gap(tail) {
                return;
            }
            std::hint::spin_loop();
        }

        debug_log!(link, "hand_off_tail: budget exhausted");
    }
}
