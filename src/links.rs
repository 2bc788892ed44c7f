//! Link word codec.
//!
//! Both neighbor links of a node, plus a small wrapping version counter per
//! side, are packed into one 64-bit word so that every structural edit to a
//! node is a single compare-and-swap:
//!
//! ```text
//! Bits 34-63: `next` link | Bits 32-33: `next` version
//! Bits  2-31: `prev` link | Bits  0-1:  `prev` version
//! ```
//!
//! Links are slot indices into the caller-owned item array, not addresses.
//! Two values in the link space are reserved: [`NULL_PTR`] ("no neighbor")
//! and [`DELETING_MARK`] ("this node is being unlinked; do not traverse
//! through it, do not update it"). The all-ones word [`NULL_LINK`] marks a
//! fully removed node.
//!
//! The version counters exist to distinguish consecutive CAS updates to the
//! same side within one retry loop. They wrap modulo 4; they are local ABA
//! noise-makers, not globally unique epochs.

/// Width of one link field, in bits.
pub const LINK_BITS: u32 = 30;

/// Width of one version counter, in bits.
pub const VERSION_BITS: u32 = 2;

/// A slot index into the caller-owned item array.
pub type Link = u32;

/// Mask for one link field.
pub const LINK_MASK: u64 = (1 << LINK_BITS) - 1;

/// Mask for one version counter.
pub const VERSION_MASK: u64 = (1 << VERSION_BITS) - 1;

/// Reserved link value: "no neighbor on this side".
pub const NULL_PTR: Link = (1 << LINK_BITS) - 1;

/// Reserved link value: the node is being unlinked. Appears only in the
/// `next` field; once written, the only legal follow-up write to the whole
/// word is [`NULL_LINK`].
pub const DELETING_MARK: Link = NULL_PTR - 1;

/// Whole-word sentinel for a fully removed (or never inserted) node.
pub const NULL_LINK: u64 = u64::MAX;

/// Largest item array a list can span: two link values are reserved.
pub const MAX_CAPACITY: usize = (1 << LINK_BITS) as usize - 2;

const NEXT_SHIFT: u32 = 34;
const VNEXT_SHIFT: u32 = 32;
const PREV_SHIFT: u32 = 2;

/// Pack both links and both versions into one word.
#[inline]
#[must_use]
pub const fn pack(next: Link, prev: Link, vnext: u8, vprev: u8) -> u64 {
    ((next as u64 & LINK_MASK) << NEXT_SHIFT)
        | ((vnext as u64 & VERSION_MASK) << VNEXT_SHIFT)
        | ((prev as u64 & LINK_MASK) << PREV_SHIFT)
        | (vprev as u64 & VERSION_MASK)
}

/// Bump a version counter, wrapping modulo `2^VERSION_BITS`.
#[inline]
#[must_use]
pub const fn bump(version: u8) -> u8 {
    version.wrapping_add(1) & VERSION_MASK as u8
}

// ============================================================================
//  Links
// ============================================================================

/// The decoded form of a link word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Links {
    /// Forward neighbor, or [`NULL_PTR`], or [`DELETING_MARK`].
    pub next: Link,
    /// Backward neighbor, or [`NULL_PTR`].
    pub prev: Link,
    /// Version counter of the `next` side.
    pub vnext: u8,
    /// Version counter of the `prev` side.
    pub vprev: u8,
}

impl Links {
    /// Decode a link word.
    #[inline]
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "fields are masked")]
    pub const fn unpack(word: u64) -> Self {
        Self {
            next: ((word >> NEXT_SHIFT) & LINK_MASK) as Link,
            prev: ((word >> PREV_SHIFT) & LINK_MASK) as Link,
            vnext: ((word >> VNEXT_SHIFT) & VERSION_MASK) as u8,
            vprev: (word & VERSION_MASK) as u8,
        }
    }

    /// Re-encode into a word.
    #[inline]
    #[must_use]
    pub const fn pack(self) -> u64 {
        pack(self.next, self.prev, self.vnext, self.vprev)
    }

    /// Whether the node this word belongs to is being unlinked.
    #[inline]
    #[must_use]
    pub const fn is_deleting(self) -> bool {
        self.next == DELETING_MARK
    }

    /// Replace the `next` side, bumping its version.
    ///
    /// `pack(NULL_PTR, NULL_PTR, 3, 3)` is bit-identical to [`NULL_LINK`], so
    /// a live word must never carry that combination; the bump skips over it.
    #[inline]
    #[must_use]
    pub const fn with_next(self, next: Link) -> Self {
        let updated = Self {
            next,
            vnext: bump(self.vnext),
            ..self
        };
        updated.skip_null_collision()
    }

    /// Replace the `prev` side, bumping its version.
    #[inline]
    #[must_use]
    pub const fn with_prev(self, prev: Link) -> Self {
        let updated = Self {
            prev,
            vprev: bump(self.vprev),
            ..self
        };
        updated.skip_null_collision()
    }

    /// Enter the deleting state: the `next` field is overwritten with the
    /// mark (its version bumped), the `prev` side stays visible so that
    /// backward traversals can still step through.
    #[inline]
    #[must_use]
    pub const fn deleting(self) -> Self {
        Self {
            next: DELETING_MARK,
            vnext: bump(self.vnext),
            ..self
        }
    }

    #[inline]
    const fn skip_null_collision(self) -> Self {
        if self.pack() == NULL_LINK {
            Self { vprev: 0, ..self }
        } else {
            self
        }
    }
}

/// Whether a raw word encodes the deleting state. [`NULL_LINK`] is *not*
/// deleting; it is already gone.
#[inline]
#[must_use]
pub const fn is_deleting(word: u64) -> bool {
    word != NULL_LINK && Links::unpack(word).is_deleting()
}

// ============================================================================
//  Tests
// ============================================================================
