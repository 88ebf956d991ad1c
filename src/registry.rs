//! The block registry: a dense, index-addressed pool of descriptors plus a
//! recycle bin of freed slot indices, linked into logical order by `next`.

use crate::descriptor::{Descriptor, INVALID};

/// Recycle-bin hysteresis threshold: an anti-thrash margin, not tuned to
/// any particular workload.
pub const FREE_IDS_THRESHOLD: usize = 64;

/// Dense descriptor storage with a logical singly-linked traversal order.
///
/// Indices into `blocks` are stable identifiers: once handed out they never
/// change meaning until the slot is invalidated and possibly recycled.
pub struct Registry {
  blocks: Vec<Descriptor>,
  free_ids: Vec<u32>,
  use_free_bin: bool,
  head: u32,
  tail: u32,
  total_size: usize,
  free_size: usize,
}

impl Registry {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      blocks: Vec::with_capacity(capacity),
      free_ids: Vec::new(),
      use_free_bin: false,
      head: INVALID,
      tail: INVALID,
      total_size: 0,
      free_size: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.blocks.capacity()
  }

  /// Number of slots ever allocated, live or invalidated. This is what a
  /// capacity check against `max_descriptors` compares against, since the
  /// backing `Vec` never shrinks (only `Clear` resets it).
  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  pub fn head(&self) -> u32 {
    self.head
  }

  pub fn tail(&self) -> u32 {
    self.tail
  }

  pub fn set_head(&mut self, id: u32) {
    self.head = id;
  }

  pub fn set_tail(&mut self, id: u32) {
    self.tail = id;
  }

  pub fn total_size(&self) -> usize {
    self.total_size
  }

  pub fn free_size(&self) -> usize {
    self.free_size
  }

  pub fn add_total_size(&mut self, delta: usize) {
    self.total_size += delta;
  }

  pub fn sub_total_size(&mut self, delta: usize) {
    self.total_size -= delta;
  }

  pub fn add_free_size(&mut self, delta: usize) {
    self.free_size += delta;
  }

  pub fn sub_free_size(&mut self, delta: usize) {
    self.free_size -= delta;
  }

  pub fn get(&self, id: u32) -> &Descriptor {
    &self.blocks[id as usize]
  }

  pub fn get_mut(&mut self, id: u32) -> &mut Descriptor {
    &mut self.blocks[id as usize]
  }

  pub fn free_ids(&self) -> &[u32] {
    &self.free_ids
  }

  /// Walks the logical list from `head`, yielding `(id, &Descriptor)` pairs.
  pub fn iter(&self) -> RegistryIter<'_> {
    RegistryIter { registry: self, current: self.head }
  }

  /// Inserts `desc` into the registry, reusing a recycled slot when the
  /// free bin is active and non-empty, otherwise appending a fresh slot.
  ///
  /// The bin stays latched until it fully drains, not merely until it dips
  /// under the threshold.
  pub fn allocate_slot(&mut self, desc: Descriptor) -> u32 {
    if self.use_free_bin {
      if let Some(id) = self.free_ids.pop() {
        self.blocks[id as usize] = desc;
        if self.free_ids.is_empty() {
          self.use_free_bin = false;
        }
        return id;
      }
    }

    let id = self.blocks.len() as u32;
    self.blocks.push(desc);
    id
  }

  /// Overwrites `id`'s slot with [`Descriptor::EMPTY`] and pushes it onto
  /// the recycle bin, latching `use_free_bin` once the bin exceeds
  /// [`FREE_IDS_THRESHOLD`].
  pub fn invalidate(&mut self, id: u32) {
    self.blocks[id as usize] = Descriptor::EMPTY;
    self.free_ids.push(id);

    if self.free_ids.len() > FREE_IDS_THRESHOLD {
      self.use_free_bin = true;
    }
  }

  pub fn use_free_bin(&self) -> bool {
    self.use_free_bin
  }

  /// Resets the registry to the empty state. Does not shrink `blocks`'
  /// backing storage — this just empties it logically, it does not free
  /// the `Vec`'s allocation.
  pub fn clear(&mut self) {
    self.blocks.clear();
    self.free_ids.clear();
    self.use_free_bin = false;
    self.head = INVALID;
    self.tail = INVALID;
    self.total_size = 0;
    self.free_size = 0;
  }
}

pub struct RegistryIter<'a> {
  registry: &'a Registry,
  current: u32,
}

impl<'a> Iterator for RegistryIter<'a> {
  type Item = (u32, &'a Descriptor);

  fn next(&mut self) -> Option<Self::Item> {
    if self.current == INVALID {
      return None;
    }
    let id = self.current;
    let desc = self.registry.get(id);
    self.current = desc.next;
    Some((id, desc))
  }
}
