use thiserror::Error;

/// Errors surfaced by the public API.
///
/// Per the taxonomy this allocator follows, not every failure kind becomes
/// an `Err`: [`Allocator::free`](crate::Allocator::free) and
/// [`Allocator::resize`](crate::Allocator::resize) report "not found" /
/// "target not reached" through a `bool`, matching how callers actually
/// branch on those outcomes. Only failures that can't be represented as a
/// sentinel return end up here.
#[derive(Debug, Error)]
pub enum AllocatorError {
  /// The backing allocator could not supply a region of the requested size.
  #[error("backing allocator failed to acquire {requested} bytes")]
  OutOfBackingMemory {
    /// Size that was requested from the backing allocator.
    requested: usize,
  },

  /// Construction or growth would exceed the descriptor capacity reserved
  /// at construction time.
  #[error("descriptor registry capacity ({capacity}) exceeded")]
  DescriptorCapacityExceeded {
    /// The capacity reserved by `Allocator::new`.
    capacity: usize,
  },
}
