//! Loom tests for the link word protocol.
//!
//! Loom provides deterministic concurrency testing by exploring all possible
//! thread interleavings. This catches subtle ordering bugs that random
//! testing might miss.
//!
//! Run with: `RUSTFLAGS="--cfg loom" cargo test --lib list::loom_tests`
//!
//! NOTE: Loom tests must use loom's own atomic types, so this module models
//! the core protocol (commit CAS, deleting state, back-edge stitch, head
//! handoff) on a small in-file replica built from loom atomics and the pure
//! codec in [`crate::links`]. The replica mirrors the real mutators
//! step-for-step with the boundary-validation paths trimmed to keep the
//! state space tractable.

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

use loom::sync::Arc;
use loom::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use loom::thread;

use crate::links::{Link, Links, NULL_LINK, NULL_PTR, is_deleting, pack};

const SLOTS: usize = 4;

/// Minimal replica: a head index plus one link word per slot.
struct MiniList {
    head: AtomicU32,
    words: [AtomicU64; SLOTS],
}

impl MiniList {
    fn new() -> Self {
        Self {
            head: AtomicU32::new(NULL_PTR),
            words: [
                AtomicU64::new(NULL_LINK),
                AtomicU64::new(NULL_LINK),
                AtomicU64::new(NULL_LINK),
                AtomicU64::new(NULL_LINK),
            ],
        }
    }

    /// Pre-link `chain` as the list contents, front to back.
    fn preload(&self, chain: &[Link]) {
        for (pos, &link) in chain.iter().enumerate() {
            let prev: Link = if pos == 0 { NULL_PTR } else { chain[pos - 1] };
            let next: Link = if pos + 1 == chain.len() {
                NULL_PTR
            } else {
                chain[pos + 1]
            };
            self.words[link as usize].store(pack(next, prev, 0, 0), Ordering::Relaxed);
        }
        self.head
            .store(chain.first().copied().unwrap_or(NULL_PTR), Ordering::Relaxed);
    }

    fn word(&self, link: Link) -> &AtomicU64 {
        &self.words[link as usize]
    }

    /// push_front: publish own links, commit on head, take the old head's
    /// back edge.
    fn push_front(&self, link: Link) -> bool {
        loop {
            let old_head: Link = self.head.load(Ordering::Acquire);
            if old_head != NULL_PTR {
                let observed: u64 = self.word(old_head).load(Ordering::Acquire);
                if observed == NULL_LINK || is_deleting(observed) {
                    thread::yield_now();
                    continue;
                }
            }

            self.word(link)
                .store(pack(old_head, NULL_PTR, 0, 0), Ordering::Relaxed);
            if self
                .head
                .compare_exchange(old_head, link, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }

            if old_head == NULL_PTR {
                return true;
            }

            // Back edge of the old head.
            loop {
                let word: u64 = self.word(old_head).load(Ordering::Acquire);
                if word == NULL_LINK || is_deleting(word) {
                    return false;
                }
                let links: Links = Links::unpack(word);
                if links.prev != NULL_PTR {
                    return false;
                }
                if self
                    .word(old_head)
                    .compare_exchange(
                        word,
                        links.with_prev(link).pack(),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    return true;
                }
            }
        }
    }

    /// remove: commit to the deleting state, stitch both edges, finalize.
    fn remove(&self, link: Link) -> bool {
        let (orig_next, orig_prev) = loop {
            let word: u64 = self.word(link).load(Ordering::Acquire);
            if word == NULL_LINK {
                return false;
            }
            let links: Links = Links::unpack(word);
            if links.is_deleting() {
                return false;
            }
            if self
                .word(link)
                .compare_exchange(
                    word,
                    links.deleting().pack(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                break (links.next, links.prev);
            }
        };

        // Forward stitch (or head handoff).
        loop {
            let Some(live) = self.resolve_live_predecessor(link, orig_prev, orig_next) else {
                thread::yield_now();
                continue;
            };
            if live == NULL_PTR {
                loop {
                    let head: Link = self.head.load(Ordering::Acquire);
                    if head == link {
                        if self
                            .head
                            .compare_exchange(link, orig_next, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                        {
                            break;
                        }
                        continue;
                    }
                    if head == NULL_PTR || !self.is_gap(head) {
                        break;
                    }
                    thread::yield_now();
                }
                break;
            }
            let word: u64 = self.word(live).load(Ordering::Acquire);
            if word == NULL_LINK || is_deleting(word) {
                continue;
            }
            let links: Links = Links::unpack(word);
            if links.next != link && !self.is_gap(links.next) {
                break;
            }
            if self
                .word(live)
                .compare_exchange(
                    word,
                    links.with_next(orig_next).pack(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                break;
            }
        }

        // Backward stitch.
        if orig_next != NULL_PTR {
            loop {
                let word: u64 = self.word(orig_next).load(Ordering::Acquire);
                if word == NULL_LINK || is_deleting(word) {
                    break;
                }
                let links: Links = Links::unpack(word);
                if links.prev != link && !self.is_gap(links.prev) {
                    break;
                }
                let Some(live) = self.resolve_live_predecessor(link, orig_prev, orig_next) else {
                    thread::yield_now();
                    continue;
                };
                if self
                    .word(orig_next)
                    .compare_exchange(
                        word,
                        links.with_prev(live).pack(),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    break;
                }
            }
        }

        self.word(link).store(NULL_LINK, Ordering::Release);
        true
    }

    /// Frozen back-edge walk, then the torn-chain fallbacks: scan for the
    /// surviving forward edge into the gap, then the head implication.
    fn resolve_live_predecessor(&self, link: Link, orig_prev: Link, orig_next: Link) -> Option<Link> {
        let mut candidate: Link = orig_prev;
        let mut torn: bool = false;

        for _ in 0..=SLOTS {
            if candidate == NULL_PTR {
                return Some(NULL_PTR);
            }
            let word: u64 = self.word(candidate).load(Ordering::Acquire);
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

        for index in 0..SLOTS as Link {
            if index == link {
                continue;
            }
            let word: u64 = self.words[index as usize].load(Ordering::Acquire);
            if word == NULL_LINK {
                continue;
            }
            let links: Links = Links::unpack(word);
            let reaches_gap: bool =
                links.next == link || (orig_next != NULL_PTR && links.next == orig_next);
            if !links.is_deleting() && reaches_gap {
                return Some(index);
            }
        }

        let head: Link = self.head.load(Ordering::Acquire);
        (head == link || (orig_next != NULL_PTR && head == orig_next)).then_some(NULL_PTR)
    }

    fn is_gap(&self, link: Link) -> bool {
        if link == NULL_PTR {
            return false;
        }
        let word: u64 = self.word(link).load(Ordering::Acquire);
        word == NULL_LINK || is_deleting(word)
    }

    /// Forward collection; only meaningful once all mutators joined.
    fn forward(&self) -> Vec<Link> {
        let mut out: Vec<Link> = Vec::new();
        let mut cur: Link = self.head.load(Ordering::Acquire);
        while cur != NULL_PTR {
            let word: u64 = self.word(cur).load(Ordering::Acquire);
            assert_ne!(word, NULL_LINK, "traversal hit a finalized slot");
            out.push(cur);
            cur = Links::unpack(word).next;
        }
        out
    }

    /// Check prev edges mirror the forward chain.
    fn assert_symmetric(&self, chain: &[Link]) {
        for (pos, &link) in chain.iter().enumerate() {
            let links: Links = Links::unpack(self.word(link).load(Ordering::Acquire));
            let expected_prev: Link = if pos == 0 { NULL_PTR } else { chain[pos - 1] };
            assert_eq!(links.prev, expected_prev, "asymmetric back edge at {link}");
        }
    }
}

#[test]
fn loom_push_front_both_threads_visible() {
    loom::model(|| {
        let list = Arc::new(MiniList::new());

        let l1 = Arc::clone(&list);
        let t1 = thread::spawn(move || l1.push_front(0));
        let l2 = Arc::clone(&list);
        let t2 = thread::spawn(move || l2.push_front(1));

        let ok1: bool = t1.join().unwrap();
        let ok2: bool = t2.join().unwrap();
        assert!(ok1 && ok2, "pushes onto a quiet list cannot fail");

        let chain: Vec<Link> = list.forward();
        let mut sorted: Vec<Link> = chain.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1]);
        list.assert_symmetric(&chain);
    });
}

#[test]
fn loom_remove_same_slot_exactly_once() {
    loom::model(|| {
        let list = Arc::new(MiniList::new());
        list.preload(&[0, 1, 2]);

        let l1 = Arc::clone(&list);
        let t1 = thread::spawn(move || l1.remove(1));
        let l2 = Arc::clone(&list);
        let t2 = thread::spawn(move || l2.remove(1));

        let first: bool = t1.join().unwrap();
        let second: bool = t2.join().unwrap();
        assert!(first ^ second, "the commit CAS admits exactly one owner");

        let chain: Vec<Link> = list.forward();
        assert_eq!(chain, vec![0, 2]);
        list.assert_symmetric(&chain);
    });
}

#[test]
fn loom_remove_adjacent_converges() {
    loom::model(|| {
        let list = Arc::new(MiniList::new());
        list.preload(&[0, 1, 2, 3]);

        let l1 = Arc::clone(&list);
        let t1 = thread::spawn(move || l1.remove(1));
        let l2 = Arc::clone(&list);
        let t2 = thread::spawn(move || l2.remove(2));

        assert!(t1.join().unwrap());
        assert!(t2.join().unwrap());

        let chain: Vec<Link> = list.forward();
        assert_eq!(chain, vec![0, 3]);
        list.assert_symmetric(&chain);
    });
}

#[test]
fn loom_remove_head_run_hands_off() {
    loom::model(|| {
        let list = Arc::new(MiniList::new());
        list.preload(&[0, 1, 2]);

        let l1 = Arc::clone(&list);
        let t1 = thread::spawn(move || l1.remove(0));
        let l2 = Arc::clone(&list);
        let t2 = thread::spawn(move || l2.remove(1));

        assert!(t1.join().unwrap());
        assert!(t2.join().unwrap());

        let chain: Vec<Link> = list.forward();
        assert_eq!(chain, vec![2]);
        list.assert_symmetric(&chain);
    });
}
