//! # freepool — a dynamic free-list pool allocator
//!
//! This crate provides a general-purpose allocator for medium-to-large
//! allocation sizes. Unlike a bump allocator, it tracks freed blocks in a
//! **coalescing free-list** so memory can actually be reused, and it grows
//! or shrinks its backing pool on demand instead of only ever growing.
//!
//! ## Overview
//!
//! ```text
//!   Pool (one or more primary regions, each from one backing acquire):
//!
//!   ┌──────────────────────────────┬──────────────────────────────────┐
//!   │         primary A            │           primary B              │
//!   │  ┌──────┬──────┬──────────┐  │  ┌───────────────────────────┐   │
//!   │  │ used │ free │  used    │  │  │          free             │   │
//!   │  └──────┴──────┴──────────┘  │  └───────────────────────────┘   │
//!   └──────────────────────────────┴──────────────────────────────────┘
//!        ▲ descriptors, linked in address order within each primary run
//! ```
//!
//! Each byte range — used or free — is tracked by a [`Descriptor`] in a
//! dense, index-addressed registry. `allocate` walks the list for the
//! smallest free block that fits (best-fit); `free` marks a block free and
//! coalesces it with adjacent free neighbours; `resize` grows the pool by
//! acquiring a new primary region, or shrinks it by releasing primary
//! regions that have become entirely free again.
//!
//! ## Crate structure
//!
//! ```text
//!   freepool
//!   ├── backing      - the BackingAllocator trait + the system-heap default
//!   ├── descriptor   - Descriptor, the per-block-range record
//!   ├── registry     - dense descriptor storage + the free-id recycle bin
//!   ├── allocator    - Allocator: allocate / free / resize / clear
//!   ├── stats        - diagnostic snapshot formatting (feature "stats")
//!   └── error        - AllocatorError
//! ```
//!
//! ## Quick start
//!
//! ```
//! use freepool::Allocator;
//!
//! let mut pool = Allocator::new(1 << 20, 4096).unwrap();
//! let ptr = pool.allocate(200).unwrap();
//!
//! unsafe {
//!     ptr.as_ptr().write(42);
//!     assert_eq!(ptr.as_ptr().read(), 42);
//! }
//!
//! assert!(pool.free(ptr));
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no internal synchronization; see
//!   [`Allocator`]'s docs.
//! - **No alignment guarantees** beyond whatever the backing allocator
//!   returns — this allocator hands out whole block addresses unaligned.
//! - **No compaction**: live blocks never move, so fragmentation can only
//!   be fought by coalescing, not by relocation.
//!
//! ## Safety
//!
//! Addresses returned by [`Allocator::allocate`] are raw `NonNull<u8>`
//! pointers into memory this crate owns until a matching
//! [`Allocator::free`] call (or [`Allocator::clear`], which invalidates
//! every outstanding address at once). Reading or writing through such a
//! pointer after it has been freed is undefined behaviour, same as any
//! manual allocator.

mod allocator;
mod backing;
mod descriptor;
mod error;
mod registry;

#[cfg(feature = "stats")]
mod stats;

pub use allocator::{Allocator, MIN_ALLOC_SIZE};
pub use backing::{BackingAllocator, SystemBackingAllocator};
pub use descriptor::Descriptor;
pub use error::AllocatorError;
