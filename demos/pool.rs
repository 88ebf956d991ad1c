//! Walks through the allocator's lifecycle: initial growth, best-fit
//! allocation, coalescing on free, and shrinking the pool back down.
//!
//! Run with `cargo run --example pool --features stats`.

use freepool::Allocator;

fn main() {
  let mut pool = Allocator::new(4096, 256).expect("initial pool should acquire its region");

  println!("[start] total={} free={}", pool.total_size(), pool.free_size());

  let a = pool.allocate(200).expect("allocate should succeed");
  let b = pool.allocate(300).expect("allocate should succeed");
  let c = pool.allocate(128).expect("allocate should succeed");

  unsafe {
    a.as_ptr().write(1);
    b.as_ptr().write(2);
    c.as_ptr().write(3);
  }

  #[cfg(feature = "stats")]
  println!("\n[after 3 allocations]\n{}", pool.stats());

  // Freeing the middle allocation first, then the first, demonstrates the
  // forward/backward coalescing pass: two separate free blocks become one.
  println!("\n[free] b and then a");
  pool.free(b);
  pool.free(a);

  #[cfg(feature = "stats")]
  println!("{}", pool.stats());

  pool.free(c);
  println!(
    "\n[after freeing everything] free_size == total_size: {}",
    pool.free_size() == pool.total_size()
  );

  // Grow past the current pool, then try to shrink back down — since
  // nothing is live, the whole pool becomes one release-eligible primary.
  pool.resize(8192);
  println!("\n[grow] total={}", pool.total_size());
  let shrank = pool.resize(0);
  println!("[shrink to 0] reached={} total={}", shrank, pool.total_size());
}
