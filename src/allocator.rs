//! The free-list state machine: the part of this crate that actually
//! decides how bytes are carved up. Everything else — the backing
//! interface, the descriptor registry, the stats formatter — exists to
//! support `Allocator::{allocate, free, resize, clear}`.
//!
//! ```text
//!   Allocator
//!   ┌──────────────────────────────────────────────────────────┐
//!   │  registry: Registry            (§ block descriptors)     │
//!   │  backing:  B: BackingAllocator (§ where primaries come   │
//!   │                                   from)                  │
//!   │  max_descriptors: usize        (§ capacity reserved at   │
//!   │                                   construction)          │
//!   └──────────────────────────────────────────────────────────┘
//!
//!   head ──► [primary A, free] ──► [split, used] ──► [primary B, free] ──► ⊥
//!                    ▲ is_primary                           ▲ is_primary
//! ```

use std::fmt;
use std::ptr::NonNull;

use crate::backing::{BackingAllocator, SystemBackingAllocator};
use crate::descriptor::{Descriptor, INVALID};
use crate::error::AllocatorError;
use crate::registry::Registry;

/// Below this remainder, a split is declined and the whole block is handed
/// to the caller instead — keeps the descriptor count bounded under
/// micro-allocation workloads at the cost of some per-block slack.
pub const MIN_ALLOC_SIZE: usize = 64;

/// A dynamic pool allocator over a coalescing free-list.
///
/// Construct with [`Allocator::new`] (system heap backing) or
/// [`Allocator::with_backing`] (custom [`BackingAllocator`]). Not `Send` or
/// `Sync`: every public method mutates shared internal state with no
/// synchronization, matching the single-threaded contract this crate
/// documents rather than enforces through a lock.
pub struct Allocator<B: BackingAllocator = SystemBackingAllocator> {
  registry: Registry,
  backing: B,
  max_descriptors: usize,
}

impl Allocator<SystemBackingAllocator> {
  /// Constructs an allocator backed by the system heap, with an initial
  /// pool of `base_size` bytes and storage reserved for `max_descriptors`
  /// descriptors.
  ///
  /// # Errors
  ///
  /// Returns [`AllocatorError::OutOfBackingMemory`] if the initial region
  /// cannot be acquired.
  pub fn new(base_size: usize, max_descriptors: usize) -> Result<Self, AllocatorError> {
    Self::with_backing(base_size, max_descriptors, SystemBackingAllocator)
  }
}

impl<B: BackingAllocator> Allocator<B> {
  /// Constructs an allocator over a caller-supplied [`BackingAllocator`].
  ///
  /// # Errors
  ///
  /// Returns [`AllocatorError::OutOfBackingMemory`] if the initial region
  /// cannot be acquired.
  pub fn with_backing(
    base_size: usize,
    max_descriptors: usize,
    backing: B,
  ) -> Result<Self, AllocatorError> {
    let mut allocator = Self { registry: Registry::with_capacity(max_descriptors), backing, max_descriptors };

    // The empty-registry construction case and the growth case are the
    // same code path: growing from total_size == 0 by exactly `base_size`
    // produces the single initial primary descriptor.
    allocator.resize_grow(base_size)?;

    Ok(allocator)
  }

  /// Allocates `size` bytes from the pool, growing it first if necessary.
  ///
  /// Uses best-fit selection: among all free blocks large enough, the
  /// smallest one is chosen, ties broken by first occurrence. If none fits,
  /// the pool is grown by exactly `size` bytes and the new primary block is
  /// used directly.
  ///
  /// # Errors
  ///
  /// Returns [`AllocatorError::OutOfBackingMemory`] if growth is required
  /// and the backing allocator cannot supply it, or
  /// [`AllocatorError::DescriptorCapacityExceeded`] if servicing the
  /// request (including any split remainder) would exceed the descriptor
  /// capacity reserved at construction.
  ///
  /// # Panics (debug only)
  ///
  /// Debug builds assert `size > 0`; this is a precondition violation, not
  /// a recoverable error.
  pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocatorError> {
    debug_assert!(size > 0, "Allocate size must be nonzero");

    if size > self.registry.free_size() {
      #[cfg(feature = "debug-log")]
      log::trace!("allocate({size}): free_size insufficient, growing pool");
      self.resize_grow(self.registry.total_size() + size)?;
    }

    let target = match self.best_fit(size) {
      Some(id) => id,
      None => {
        #[cfg(feature = "debug-log")]
        log::debug!("allocate({size}): no single free block fits, growing again");
        self.resize_grow(self.registry.total_size() + size)?;
        self.registry.tail()
      }
    };

    let block = *self.registry.get(target);
    let remainder = block.size - size;

    if remainder >= MIN_ALLOC_SIZE {
      self.split(target, &block, size, remainder)?;
    }
    // free_size is charged the request size in both the split and
    // no-split cases, never the whole block's size in the no-split case —
    // so a no-split allocation can silently burn `block.size - size` bytes
    // of slack that free_size no longer reports as occupied but that are
    // not actually allocatable.
    self.registry.sub_free_size(size);
    self.registry.get_mut(target).is_free = false;

    Ok(self.registry.get(target).memory.expect("allocated block must own memory"))
  }

  /// Frees a previously allocated address, coalescing it with adjacent free
  /// neighbours (forward, then backward, so a P|C|N run collapses in one
  /// call).
  ///
  /// Returns `false` if `addr` is not currently held by this allocator.
  /// Freeing an address twice is a precondition violation, not a checked
  /// error; whether a second call happens to return `false` depends on
  /// what the first free merged the block into, so that is not a contract
  /// callers should rely on.
  pub fn free(&mut self, addr: NonNull<u8>) -> bool {
    let Some((prev, id)) = self.find(addr) else {
      #[cfg(feature = "debug-log")]
      log::warn!("free({addr:?}): address not recognised");
      return false;
    };

    let size = self.registry.get(id).size;
    self.registry.get_mut(id).is_free = true;
    self.registry.add_free_size(size);

    self.merge_forward(id);
    if prev != INVALID {
      self.merge_backward(prev, id);
    }

    true
  }

  /// Adjusts the pool's `total_size` toward `target`.
  ///
  /// Growing always succeeds unless the backing allocator fails. Shrinking
  /// only releases primary regions that are entirely free and unsplit (see
  /// [`Descriptor::is_release_eligible`]) and stops as soon as `total_size
  /// <= target` or `free_size <= target`; it returns `true` iff `target`
  /// was reached, `false` if insufficient free primary regions were
  /// available (a deliberate partial-failure signal — the allocator
  /// remains consistent either way).
  pub fn resize(&mut self, target: usize) -> bool {
    let total = self.registry.total_size();

    match target.cmp(&total) {
      std::cmp::Ordering::Equal => true,
      std::cmp::Ordering::Greater => self.resize_grow(target).is_ok(),
      std::cmp::Ordering::Less => {
        if self.registry.free_size() < target {
          // Live (non-free) bytes alone already exceed the target; no walk
          // can possibly reach it.
          return false;
        }
        self.resize_shrink(target)
      }
    }
  }

  /// Releases every primary region back to the backing allocator and
  /// resets all registry state to empty. Any address previously returned
  /// by `allocate` is invalidated by this call.
  pub fn clear(&mut self) {
    let mut current = self.registry.head();
    while current != INVALID {
      let desc = *self.registry.get(current);
      if desc.is_primary {
        if let Some(addr) = desc.memory {
          // SAFETY: primary regions are released exactly once, here or in
          // `resize_shrink`; `clear` is the terminal release of whatever
          // remains.
          unsafe { self.backing.release(addr, desc.size) };
        }
      }
      current = desc.next;
    }
    self.registry.clear();
  }

  /// Total bytes currently owned across all primary regions.
  pub fn total_size(&self) -> usize {
    self.registry.total_size()
  }

  /// Bytes currently available for allocation.
  pub fn free_size(&self) -> usize {
    self.registry.free_size()
  }

  /// `total_size - free_size`: bytes the registry considers handed out.
  ///
  /// Because of the free-size accounting quirk documented on
  /// [`Allocator::allocate`], this can under-report the bytes truly
  /// unavailable for a future allocation by up to `MIN_ALLOC_SIZE - 1` per
  /// no-split allocation.
  pub fn occupied_size(&self) -> usize {
    self.registry.total_size() - self.registry.free_size()
  }

  pub(crate) fn registry(&self) -> &Registry {
    &self.registry
  }

  /// Renders a diagnostic snapshot of the registry: allocator address,
  /// every live descriptor, and the current free-id recycle bin. Purely
  /// read-only; format is not a compatibility surface.
  #[cfg(feature = "stats")]
  pub fn stats(&self) -> String {
    crate::stats::format_snapshot(self as *const _ as usize, &self.registry)
  }

  // ---- internal state machine -------------------------------------------

  /// Best-fit search: the free block with the smallest size `>= size`,
  /// first occurrence wins a tie. Always walks the full list rather than
  /// stopping at the first block that fits.
  fn best_fit(&self, size: usize) -> Option<u32> {
    let mut best: Option<u32> = None;
    let mut best_size = usize::MAX;

    for (id, desc) in self.registry.iter() {
      if desc.is_free && desc.size >= size && desc.size < best_size {
        best = Some(id);
        best_size = desc.size;
      }
    }

    best
  }

  /// Splits `target` into a `size`-byte allocation and a free remainder
  /// descriptor, inserted immediately after `target` in logical order.
  fn split(
    &mut self,
    target: u32,
    block: &Descriptor,
    size: usize,
    remainder: usize,
  ) -> Result<(), AllocatorError> {
    // SAFETY: `size < block.size`, so the offset stays within the region
    // `block.memory` anchors.
    let remainder_memory = block.memory.map(|m| unsafe { NonNull::new_unchecked(m.as_ptr().add(size)) });

    let remainder_desc = Descriptor {
      size: remainder,
      memory: remainder_memory,
      next: block.next,
      is_adjacent_to_next: block.is_adjacent_to_next,
      is_free: true,
      is_primary: false,
    };
    let remainder_id = self.try_allocate_slot(remainder_desc)?;

    let was_tail = self.registry.tail() == target;
    {
      let target_mut = self.registry.get_mut(target);
      target_mut.size = size;
      target_mut.next = remainder_id;
      target_mut.is_adjacent_to_next = true;
    }
    if was_tail {
      self.registry.set_tail(remainder_id);
    }

    Ok(())
  }

  /// Locates the descriptor whose `memory == Some(addr)`, returning
  /// `(predecessor_id, id)` with `predecessor_id == INVALID` if `id` is
  /// `head`.
  fn find(&self, addr: NonNull<u8>) -> Option<(u32, u32)> {
    let mut prev = INVALID;
    let mut current = self.registry.head();

    while current != INVALID {
      let desc = self.registry.get(current);
      if desc.memory == Some(addr) {
        return Some((prev, current));
      }
      prev = current;
      current = desc.next;
    }

    None
  }

  fn merge_forward(&mut self, id: u32) {
    let desc = *self.registry.get(id);
    if desc.next == INVALID {
      return;
    }
    let next_id = desc.next;
    if !desc.is_adjacent_to_next || !self.registry.get(next_id).is_free {
      return;
    }

    let next_desc = *self.registry.get(next_id);
    {
      let d = self.registry.get_mut(id);
      d.size += next_desc.size;
      d.is_adjacent_to_next = next_desc.is_adjacent_to_next;
      d.next = next_desc.next;
    }
    if self.registry.tail() == next_id {
      self.registry.set_tail(id);
    }
    self.registry.invalidate(next_id);
  }

  fn merge_backward(&mut self, prev: u32, id: u32) {
    let prev_desc = self.registry.get(prev);
    if !prev_desc.is_adjacent_to_next || !prev_desc.is_free {
      return;
    }

    let cur_desc = *self.registry.get(id);
    {
      let pd = self.registry.get_mut(prev);
      pd.size += cur_desc.size;
      pd.is_adjacent_to_next = cur_desc.is_adjacent_to_next;
      pd.next = cur_desc.next;
    }
    if self.registry.tail() == id {
      self.registry.set_tail(prev);
    }
    self.registry.invalidate(id);
  }

  /// Growth/empty-case of Resize: acquires exactly `target - total_size`
  /// bytes and appends a new primary free descriptor. Distinct primary
  /// regions are assumed non-contiguous, so the previous tail's
  /// `is_adjacent_to_next` stays/ becomes `false`.
  fn resize_grow(&mut self, target: usize) -> Result<(), AllocatorError> {
    let total = self.registry.total_size();
    if target <= total {
      return Ok(());
    }
    let delta = target - total;

    let memory = self.backing.acquire(delta)?;
    let desc = Descriptor {
      size: delta,
      memory: Some(memory),
      next: INVALID,
      is_adjacent_to_next: false,
      is_free: true,
      is_primary: true,
    };
    let id = self.try_allocate_slot(desc)?;

    let prev_tail = self.registry.tail();
    if prev_tail == INVALID {
      self.registry.set_head(id);
    } else {
      self.registry.get_mut(prev_tail).next = id;
      self.registry.get_mut(prev_tail).is_adjacent_to_next = false;
    }
    self.registry.set_tail(id);
    self.registry.add_total_size(delta);
    self.registry.add_free_size(delta);

    Ok(())
  }

  /// Shrink-case of `resize`: `true` means `target` was reached.
  fn resize_shrink(&mut self, target: usize) -> bool {
    let mut prev = INVALID;
    let mut current = self.registry.head();

    while current != INVALID {
      let desc = *self.registry.get(current);

      if !desc.is_release_eligible() {
        prev = current;
        current = desc.next;
        continue;
      }

      let next = desc.next;
      if prev == INVALID {
        self.registry.set_head(next);
      } else {
        self.registry.get_mut(prev).next = next;
      }
      if self.registry.tail() == current {
        self.registry.set_tail(prev);
      }

      if let Some(addr) = desc.memory {
        // SAFETY: `desc` is primary, free, and no longer linked into the
        // registry, so it will not be touched again before release.
        unsafe { self.backing.release(addr, desc.size) };
      }
      self.registry.invalidate(current);
      self.registry.sub_total_size(desc.size);
      self.registry.sub_free_size(desc.size);

      current = next;

      if self.registry.total_size() <= target || self.registry.free_size() <= target {
        break;
      }
    }

    let reached = self.registry.total_size() <= target;
    #[cfg(feature = "debug-log")]
    if !reached {
      log::debug!(
        "resize({target}): shrink unsatisfied, total_size={}",
        self.registry.total_size()
      );
    }
    reached
  }

  /// Inserts `desc` into the registry, first checking that doing so would
  /// not exceed `max_descriptors` — a hard cap, not a hint. Reused
  /// recycled slots never count against the cap a second time — only a
  /// fresh append does.
  fn try_allocate_slot(&mut self, desc: Descriptor) -> Result<u32, AllocatorError> {
    let about_to_append = !self.registry.use_free_bin() || self.registry.free_ids().is_empty();
    if about_to_append && self.registry.len() >= self.max_descriptors {
      return Err(AllocatorError::DescriptorCapacityExceeded { capacity: self.max_descriptors });
    }
    Ok(self.registry.allocate_slot(desc))
  }
}

impl<B: BackingAllocator> Drop for Allocator<B> {
  fn drop(&mut self) {
    self.clear();
  }
}

impl<B: BackingAllocator> fmt::Debug for Allocator<B> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Allocator")
      .field("total_size", &self.total_size())
      .field("free_size", &self.free_size())
      .field("occupied_size", &self.occupied_size())
      .field("descriptor_slots", &self.registry.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backing::SystemBackingAllocator;

  fn new_allocator(base_size: usize) -> Allocator<SystemBackingAllocator> {
    Allocator::new(base_size, 1024).expect("construction should succeed")
  }

  #[test]
  fn scenario_allocate_write_free_restores_pool() {
    let mut allocator = new_allocator(1_048_576);

    let ptr = allocator.allocate(200).expect("allocate should succeed");
    unsafe {
      ptr.as_ptr().write(1);
      ptr.as_ptr().add(199).write(2);
    }
    assert!(allocator.free(ptr));

    assert_eq!(allocator.free_size(), 1_048_576);
    assert_eq!(allocator.registry().len(), 1);
  }

  #[test]
  fn scenario_many_alloc_free_cycles_return_to_baseline() {
    let mut allocator = new_allocator(1_048_576);

    for i in 8..10_000 {
      let ptr = allocator.allocate(i * 10).expect("allocate should succeed");
      unsafe { ptr.as_ptr().cast::<u32>().write_unaligned(0xDEAD_BEEF) };
      assert!(allocator.free(ptr));
      assert_eq!(allocator.free_size(), 1_048_576);
    }
  }

  #[test]
  fn scenario_grow_allocate_shrink_roundtrip() {
    let mut allocator = new_allocator(1_048_576);

    assert!(allocator.resize(1_058_576));
    let ptr = allocator.allocate(1_003_520).expect("allocate should succeed");

    // The live allocation's primary is split and in use, ineligible for
    // release; only the untouched 10_000-byte growth region is a whole
    // free primary, so this shrink releases it but still overshoots past
    // the (very small) target and reports failure.
    assert!(!allocator.resize(5_120));
    assert!(allocator.total_size() <= 1_058_576);

    assert!(allocator.free(ptr));
    // Freeing restores a single free primary covering the original
    // 1_048_576-byte region. Shrinking to 5_120 releases that whole
    // primary in one unit — there is no partial release — so the pool can
    // legitimately undershoot the target rather than land exactly on it.
    let reached = allocator.resize(5_120);
    assert!(allocator.total_size() <= 1_058_576);
    if reached {
      assert_eq!(allocator.total_size(), 0);
    }
  }

  #[test]
  fn scenario_triple_merge_on_middle_free() {
    let mut allocator = new_allocator(1024);

    let a = allocator.allocate(200).unwrap();
    let b = allocator.allocate(200).unwrap();
    let c = allocator.allocate(200).unwrap();
    let _ = c;

    assert!(allocator.free(b));
    assert!(allocator.free(a));

    // a and b's ranges are now one coalesced free block of exactly their
    // combined size, sitting at the head of the list; c is still live and
    // sits between that block and the untouched tail remainder.
    let merged_count = allocator.registry().iter().filter(|(_, d)| d.is_free && d.size == 400).count();
    assert_eq!(merged_count, 1);
  }

  #[test]
  fn scenario_clear_then_allocate_acts_like_fresh_resize() {
    let mut allocator = new_allocator(1024);
    allocator.clear();

    let ptr = allocator.allocate(400).expect("allocate after clear should succeed");
    assert!(!ptr.as_ptr().is_null());
    assert!(allocator.total_size() >= 400);
  }

  #[test]
  fn scenario_allocate_larger_than_pool_grows_it() {
    let mut allocator = new_allocator(128);

    let ptr = allocator.allocate(1_000_000).expect("allocate should grow the pool");
    assert!(allocator.total_size() >= 1_000_000);
    assert!(allocator.free(ptr));
  }

  #[test]
  fn free_of_unrecognised_address_returns_false() {
    let mut allocator = new_allocator(1024);
    let ptr = allocator.allocate(64).unwrap();
    // An address one byte into the block never matches a descriptor's
    // `memory` field, which always holds a range's starting address.
    let bogus = NonNull::new((ptr.as_ptr() as usize + 1) as *mut u8).unwrap();

    assert!(!allocator.free(bogus));
    assert!(allocator.free(ptr));
  }

  #[test]
  fn no_split_allocation_keeps_block_intact_below_min_alloc_size() {
    let mut allocator = new_allocator(256);
    // Force a block barely too small to split: request leaves < MIN_ALLOC_SIZE slack.
    let ptr = allocator.allocate(256 - MIN_ALLOC_SIZE + 1).expect("allocate should succeed");
    assert_eq!(allocator.registry().len(), 1);
    assert!(allocator.free(ptr));
  }

  #[test]
  fn descriptor_capacity_is_enforced() {
    let mut allocator = Allocator::new(1_048_576, 2).expect("construction should succeed");
    // Slot 0: the initial primary region. First allocate splits it,
    // consuming slot 1 for the remainder — capacity (2) now exhausted.
    let _a = allocator.allocate(64).expect("first split should fit capacity");
    // A second split would need a third slot, which the cap forbids.
    let err = allocator.allocate(64);
    assert!(matches!(err, Err(AllocatorError::DescriptorCapacityExceeded { .. })));
  }

  #[test]
  fn adjacent_descriptors_have_contiguous_ranges() {
    let mut allocator = new_allocator(1024);
    let _a = allocator.allocate(100).unwrap();
    let _b = allocator.allocate(100).unwrap();

    for (_, desc) in allocator.registry().iter() {
      if desc.is_adjacent_to_next && desc.next != INVALID {
        let next = allocator.registry().get(desc.next);
        assert_eq!(desc.end_addr(), next.memory.unwrap().as_ptr() as usize);
      }
    }
  }
}
