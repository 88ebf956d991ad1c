//! Property-based checks over arbitrary allocate/free sequences: that
//! `total_size` never drops below `free_size`, that live allocations never
//! overlap, and that `clear` always resets the pool to empty. Driven purely
//! through the public API — no access to internal registry state is needed
//! to observe any of this.

use freepool::Allocator;
use quickcheck_macros::quickcheck;
use std::ptr::NonNull;

/// Sizes kept modest so a handful of operations stays within a small pool
/// without forcing pathological growth on every run.
fn clamp_size(raw: u16) -> usize {
  (raw as usize % 4096) + 1
}

#[quickcheck]
fn total_size_never_less_than_free_size(sizes: Vec<u16>) -> bool {
  let mut pool = Allocator::new(4096, 512).unwrap();
  let mut live: Vec<NonNull<u8>> = Vec::new();

  for raw in sizes {
    let size = clamp_size(raw);
    if let Ok(ptr) = pool.allocate(size) {
      live.push(ptr);
    }
    if pool.total_size() < pool.free_size() {
      return false;
    }
    // Occasionally free something to exercise coalescing too.
    if size % 3 == 0 {
      if let Some(ptr) = live.pop() {
        pool.free(ptr);
      }
    }
  }

  pool.total_size() >= pool.free_size()
}

#[quickcheck]
fn allocations_never_overlap(sizes: Vec<u16>) -> bool {
  let mut pool = Allocator::new(8192, 512).unwrap();
  let mut live: Vec<(NonNull<u8>, usize)> = Vec::new();

  for raw in sizes {
    let size = clamp_size(raw);
    if let Ok(ptr) = pool.allocate(size) {
      let start = ptr.as_ptr() as usize;
      let end = start + size;
      for &(other, other_size) in &live {
        let other_start = other.as_ptr() as usize;
        let other_end = other_start + other_size;
        let disjoint = end <= other_start || start >= other_end;
        if !disjoint {
          return false;
        }
      }
      live.push((ptr, size));
    }
  }

  for (ptr, _) in live {
    pool.free(ptr);
  }

  true
}

#[quickcheck]
fn clear_resets_to_empty(sizes: Vec<u16>) -> bool {
  let mut pool = Allocator::new(4096, 512).unwrap();

  for raw in sizes {
    let _ = pool.allocate(clamp_size(raw));
  }

  pool.clear();

  pool.total_size() == 0 && pool.free_size() == 0
}

#[test]
fn free_then_allocate_same_size_restores_free_size() {
  let mut pool = Allocator::new(1 << 20, 512).unwrap();
  let before = pool.free_size();

  let ptr = pool.allocate(256).unwrap();
  pool.free(ptr);

  assert_eq!(pool.free_size(), before);
}

#[test]
fn resize_grow_then_grow_again_lands_on_the_larger_target() {
  let mut pool = Allocator::new(1024, 64).unwrap();
  assert!(pool.resize(4096));
  assert!(pool.resize(8192));
  assert_eq!(pool.total_size(), 8192);
}
