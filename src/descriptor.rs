//! The block descriptor: the registry record for one contiguous byte range.

use std::ptr::NonNull;

/// Sentinel meaning "no such descriptor" — ⊥ in this registry's index space.
pub const INVALID: u32 = u32::MAX;

/// One contiguous byte range carved out of some primary region.
///
/// A descriptor that was split out of a primary region (the remainder left
/// over after an allocation) is never itself primary; only the descriptor
/// still covering the whole original region carries `is_primary = true`.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
  /// Byte length of this range.
  pub size: usize,
  /// Starting address of this range.
  pub memory: Option<NonNull<u8>>,
  /// Index of the next descriptor in logical order, or [`INVALID`].
  pub next: u32,
  /// True iff `next`'s range is the byte-contiguous successor of this one,
  /// within the same primary region.
  pub is_adjacent_to_next: bool,
  /// True iff this range is available for allocation.
  pub is_free: bool,
  /// True iff this descriptor still owns the entire region returned by one
  /// `acquire` call — the only unit eligible for `release`.
  pub is_primary: bool,
}

impl Descriptor {
  /// A default-constructed, logically empty slot — the shape every
  /// invalidated descriptor is reset to before its index joins `free_ids`.
  pub const EMPTY: Self = Self {
    size: 0,
    memory: None,
    next: INVALID,
    is_adjacent_to_next: false,
    is_free: false,
    is_primary: false,
  };

  /// The byte address one past the end of this range.
  ///
  /// Only meaningful while `memory` is `Some`; used to check adjacency
  /// against a successor's starting address.
  pub fn end_addr(&self) -> usize {
    self.memory.map_or(0, |m| m.as_ptr() as usize) + self.size
  }

  /// Whether this descriptor is, right now, a primary region eligible for
  /// release back to the backing allocator: primary ∧ free ∧
  /// not-adjacent-to-next, i.e. still whole.
  pub fn is_release_eligible(&self) -> bool {
    self.is_primary && self.is_free && !self.is_adjacent_to_next
  }
}
