//! Read-only observer over registry state: a diagnostic snapshot, nothing
//! more. No method here mutates an [`Allocator`](crate::Allocator).

use std::fmt::Write as _;

use crate::descriptor::INVALID;
use crate::registry::Registry;

/// Renders a human-readable snapshot of `registry`: a diagnostic aid, not a
/// compatibility surface. Exact formatting may change between versions.
pub(crate) fn format_snapshot(allocator_addr: usize, registry: &Registry) -> String {
  let mut out = String::new();

  let _ = writeln!(out, "Allocator @ {allocator_addr:#x}");
  let _ = writeln!(out, "  total_size={} free_size={}", registry.total_size(), registry.free_size());

  let mut current = registry.head();
  if current == INVALID {
    let _ = writeln!(out, "  (empty)");
  }
  while current != INVALID {
    let desc = registry.get(current);
    let _ = writeln!(
      out,
      "  [{id}] size={size} memory={memory:?} next={next} adjacent={adjacent} free={free} primary={primary}",
      id = current,
      size = desc.size,
      memory = desc.memory,
      next = if desc.next == INVALID { "-".to_string() } else { desc.next.to_string() },
      adjacent = desc.is_adjacent_to_next,
      free = desc.is_free,
      primary = desc.is_primary,
    );
    current = desc.next;
  }

  let _ = write!(out, "  free_ids={:?}", registry.free_ids());

  out
}
