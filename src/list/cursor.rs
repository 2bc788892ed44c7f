//! Self-healing bidirectional traversal.
//!
//! A [`Cursor`] carries two slot links: the node it currently references
//! (`cur`) and the node it believes precedes it (`prev`). Traversal never
//! takes a CAS; it only loads link words and re-anchors itself when the
//! structure shifts underneath:
//!
//! - A forward step validates that `cur`'s own back edge still names `prev`.
//!   A mismatch means an insertion or removal landed between them; the cursor
//!   adopts the node's own view of its predecessor and re-validates, inside
//!   the shared retry budget.
//! - A backward step walks through predecessors that are mid-removal (their
//!   back edge stays readable in the deleting state), with cycle detection.
//!
//! When the budget runs out the step reports [`IteratorInvalidated`], an
//! explicit value, because confusing an invalidated traversal with a
//! completed one would silently truncate a scan.

use std::error::Error as StdError;
use std::fmt as StdFmt;
use std::hint as StdHint;

use crate::links::{Link, Links, NULL_LINK, NULL_PTR};
use crate::node::ListItem;
use crate::ordering::READ_ORD;
use crate::tracing_helpers::trace_log;

use super::{List, MAX_RETRIES};

// ============================================================================
//  IteratorInvalidated
// ============================================================================

/// A traversal step could not re-anchor within its retry budget.
///
/// Distinct from reaching the end of the list: the elements between the
/// cursor and the end have *not* been enumerated. Callers typically restart
/// the scan from [`List::iter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IteratorInvalidated;

impl StdFmt::Display for IteratorInvalidated {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.write_str("iterator invalidated by concurrent list restructuring")
    }
}

impl StdError for IteratorInvalidated {}

// ============================================================================
//  Cursor
// ============================================================================

/// A bidirectional position in a [`List`].
///
/// Equality compares only the referenced node, so a cursor that walked to the
/// end compares equal to [`List::cursor_back`] regardless of the path taken.
pub struct Cursor<'l, 's, T: ListItem> {
    list: &'l List<'s, T>,
    /// Referenced node, or [`NULL_PTR`] past the end.
    cur: Link,
    /// Believed predecessor of `cur`, or [`NULL_PTR`] at the front.
    prev: Link,
}

impl<'l, 's, T: ListItem> Cursor<'l, 's, T> {
    pub(crate) fn new(list: &'l List<'s, T>, cur: Link, prev: Link) -> Self {
        Self { list, cur, prev }
    }

    /// The item under the cursor, or `None` past the end.
    ///
    /// The reference is only guaranteed live at the moment the cursor
    /// stepped onto it.
    #[must_use]
    pub fn current(&self) -> Option<&'s T> {
        (self.cur != NULL_PTR).then(|| self.list.to_item(self.cur))
    }

    /// Whether the cursor is past the end.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.cur == NULL_PTR
    }

    /// Step forward. A no-op past the end.
    ///
    /// # Errors
    ///
    /// [`IteratorInvalidated`] when concurrent restructuring outran the
    /// retry budget.
    pub fn move_next(&mut self) -> Result<(), IteratorInvalidated> {
        if self.cur == NULL_PTR {
            return Ok(());
        }

        let mut retries: usize = 0;
        loop {
            let word: u64 = self.list.node_at(self.cur).load();

            if word == NULL_LINK {
                // The node was fully removed; its forward link is gone.
                self.prev = self.cur;
                self.cur = NULL_PTR;
                return Ok(());
            }

            let links: Links = Links::unpack(word);

            if links.is_deleting() {
                // The owning deleter is about to finalize this word to
                // NULL_LINK; wait it out.
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(IteratorInvalidated);
                }
                StdHint::spin_loop();
                continue;
            }

            if links.prev != self.prev {
                // The stretch between prev and cur changed underneath us;
                // adopt the node's own view of its predecessor and
                // re-validate.
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(IteratorInvalidated);
                }
                trace_log!(cur = self.cur, adopted = links.prev, "cursor re-anchor");
                self.prev = links.prev;
                continue;
            }

            self.prev = self.cur;
            self.cur = links.next;
            return Ok(());
        }
    }

    /// Step backward. A no-op at the front.
    ///
    /// Predecessors that are mid-removal are stepped through (their back
    /// edge remains readable); a predecessor that finalized before we could
    /// read it leaves the cursor at the front.
    ///
    /// # Errors
    ///
    /// [`IteratorInvalidated`] when concurrent restructuring outran the
    /// retry budget.
    pub fn move_prev(&mut self) -> Result<(), IteratorInvalidated> {
        if self.prev == NULL_PTR {
            return Ok(());
        }

        let mut retries: usize = 0;
        loop {
            let word: u64 = self.list.node_at(self.prev).load();

            if word == NULL_LINK {
                // The anchor finalized underneath us. Re-anchor through the
                // referenced node's own back edge (still readable even while
                // deleting), or through the tail when past the end.
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(IteratorInvalidated);
                }

                if self.cur != NULL_PTR {
                    let cur_word: u64 = self.list.node_at(self.cur).load();
                    if cur_word == NULL_LINK {
                        // Both gone; fall off the front.
                        self.prev = NULL_PTR;
                        return Ok(());
                    }
                    trace_log!(cur = self.cur, "cursor re-anchoring backward");
                    self.prev = Links::unpack(cur_word).prev;
                    if self.prev == NULL_PTR {
                        return Ok(());
                    }
                    continue;
                }

                let tail: Link = self.list.tail.load(READ_ORD);
                if tail == NULL_PTR {
                    self.prev = NULL_PTR;
                    return Ok(());
                }
                if tail == self.prev {
                    // The deleter has not handed the tail over yet.
                    StdHint::spin_loop();
                    continue;
                }
                self.prev = tail;
                continue;
            }

            let links: Links = Links::unpack(word);

            if links.is_deleting() {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(IteratorInvalidated);
                }
                if links.prev == self.prev {
                    // Self-referential tear; bail out to the front.
                    self.prev = NULL_PTR;
                    return Ok(());
                }
                trace_log!(skipped = self.prev, "cursor stepping through unlink");
                self.prev = links.prev;
                if self.prev == NULL_PTR {
                    return Ok(());
                }
                continue;
            }

            self.cur = self.prev;
            self.prev = links.prev;
            return Ok(());
        }
    }
}

impl<T: ListItem> Clone for Cursor<'_, '_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ListItem> Copy for Cursor<'_, '_, T> {}

impl<T: ListItem> PartialEq for Cursor<'_, '_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cur == other.cur
    }
}

impl<T: ListItem> StdFmt::Debug for Cursor<'_, '_, T> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("Cursor")
            .field("cur", &self.cur)
            .field("prev", &self.prev)
            .finish()
    }
}

// ============================================================================
//  Iter / RevIter
// ============================================================================

/// Forward self-healing iterator over a [`List`].
///
/// Yields `Err(IteratorInvalidated)` once and then ends if a step could not
/// re-anchor; a completed scan yields only `Ok` items.
pub struct Iter<'l, 's, T: ListItem> {
    cursor: Cursor<'l, 's, T>,
    done: bool,
}

impl<'l, 's, T: ListItem> Iter<'l, 's, T> {
    pub(crate) fn new(cursor: Cursor<'l, 's, T>) -> Self {
        Self {
            cursor,
            done: false,
        }
    }
}

impl<'s, T: ListItem> Iterator for Iter<'_, 's, T> {
    type Item = Result<&'s T, IteratorInvalidated>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item: &'s T = self.cursor.current()?;

        match self.cursor.move_next() {
            Ok(()) => Some(Ok(item)),
            Err(invalidated) => {
                self.done = true;
                Some(Err(invalidated))
            }
        }
    }
}

/// Reverse self-healing iterator over a [`List`], starting from the tail.
pub struct RevIter<'l, 's, T: ListItem> {
    cursor: Cursor<'l, 's, T>,
    done: bool,
}

impl<'l, 's, T: ListItem> RevIter<'l, 's, T> {
    pub(crate) fn new(cursor: Cursor<'l, 's, T>) -> Self {
        Self {
            cursor,
            done: false,
        }
    }
}

impl<'s, T: ListItem> Iterator for RevIter<'_, 's, T> {
    type Item = Result<&'s T, IteratorInvalidated>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cursor.prev == NULL_PTR {
            return None;
        }
        let before: Link = self.cursor.cur;

        match self.cursor.move_prev() {
            Ok(()) => {
                if self.cursor.cur == before || self.cursor.cur == NULL_PTR {
                    // The anchor vanished; the cursor fell off the front.
                    None
                } else {
                    Some(Ok(self.cursor.list.to_item(self.cursor.cur)))
                }
            }
            Err(invalidated) => {
                self.done = true;
                Some(Err(invalidated))
            }
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================
