//! The host "sandbox" memory primitive (spec.md §6), generalized from
//! the teacher crate's direct use of `libc::sbrk` in `bump.rs` and
//! from `original_source/`'s `memlib.c` test harness (referenced by
//! `test.c`'s `mem_init`/`mem_sbrk`/`mem_reset_brk` calls).

use crate::error::GrowError;

/// The narrow interface the engine consumes to grow (and, on
/// rollback, shrink) the heap. Implementations own a contiguous,
/// monotonically-extensible byte region; `heap_lo` must stay stable
/// for the implementation's lifetime.
pub trait MemLib {
  /// Start address of the reserved region. Stable for the
  /// implementation's lifetime.
  fn heap_lo(&self) -> *mut u8;

  /// One past the last valid byte currently reserved.
  fn heap_hi(&self) -> *mut u8;

  /// Bytes currently reserved (`heap_hi - heap_lo`).
  fn heap_size(&self) -> usize {
    (self.heap_hi() as usize) - (self.heap_lo() as usize)
  }

  /// Extends the reservation by exactly `bytes`. Returns a pointer
  /// to the first new byte, or `GrowError` if the host refuses.
  ///
  /// Callers (the engine's `grow_heap`) are responsible for keeping
  /// a single call within [`MemLib::max_single_grow`].
  fn grow(&mut self, bytes: usize) -> Result<*mut u8, GrowError>;

  /// Shrinks the reservation back to zero. Used only to roll back a
  /// failed multi-part grow (spec.md §4.4.6).
  fn reset(&mut self);

  /// The largest `bytes` a single `grow` call may be trusted with.
  /// Default: unbounded.
  fn max_single_grow(&self) -> usize {
    usize::MAX
  }
}

/// Real `sbrk`-backed heap, generalizing the teacher crate's
/// `BumpAllocator` use of `libc::sbrk`.
pub struct SbrkMemLib {
  heap_lo: *mut u8,
}

impl SbrkMemLib {
  /// Captures the current program break as this heap's `heap_lo`.
  pub fn new() -> Self {
    let brk = unsafe { libc::sbrk(0) };
    SbrkMemLib {
      heap_lo: brk as *mut u8,
    }
  }
}

impl Default for SbrkMemLib {
  fn default() -> Self {
    Self::new()
  }
}

impl MemLib for SbrkMemLib {
  fn heap_lo(&self) -> *mut u8 {
    self.heap_lo
  }

  fn heap_hi(&self) -> *mut u8 {
    unsafe { libc::sbrk(0) as *mut u8 }
  }

  fn grow(&mut self, bytes: usize) -> Result<*mut u8, GrowError> {
    let prev_break = unsafe { libc::sbrk(bytes as libc::intptr_t) };
    if prev_break == usize::MAX as *mut libc::c_void {
      return Err(GrowError::HostRefused);
    }
    Ok(prev_break as *mut u8)
  }

  fn reset(&mut self) {
    let size = self.heap_size();
    unsafe {
      let _ = libc::sbrk(-(size as libc::intptr_t));
    }
  }

  fn max_single_grow(&self) -> usize {
    i32::MAX as usize
  }
}

/// In-memory `MemLib` for tests, generalizing `original_source/`'s
/// `memlib.c` harness (`mem_init`/`mem_sbrk`/`mem_reset_brk`). Backed
/// by a fixed-capacity buffer allocated once up front, so addresses
/// handed out to the allocator under test stay stable for the whole
/// test - unlike a `Vec<u8>`, which could move its backing storage on
/// growth and invalidate every pointer already returned to the caller.
pub struct SimMemLib {
  buffer: Box<[u8]>,
  used: usize,
  chunk_limit: usize,
}

impl SimMemLib {
  /// Reserves `capacity` bytes up front; `grow` fails once `used`
  /// would exceed it.
  pub fn new(capacity: usize) -> Self {
    Self::with_chunk_limit(capacity, usize::MAX)
  }

  /// As [`SimMemLib::new`], but caps a single `grow` call to
  /// `chunk_limit` bytes, so tests can exercise `grow_heap`'s
  /// multi-part chunking path (spec.md §4.4.6) deterministically
  /// without a multi-gigabyte backing buffer.
  pub fn with_chunk_limit(capacity: usize, chunk_limit: usize) -> Self {
    SimMemLib {
      buffer: vec![0u8; capacity].into_boxed_slice(),
      used: 0,
      chunk_limit,
    }
  }
}

impl MemLib for SimMemLib {
  fn heap_lo(&self) -> *mut u8 {
    self.buffer.as_ptr() as *mut u8
  }

  fn heap_hi(&self) -> *mut u8 {
    unsafe { self.heap_lo().add(self.used) }
  }

  fn grow(&mut self, bytes: usize) -> Result<*mut u8, GrowError> {
    if self.used + bytes > self.buffer.len() {
      return Err(GrowError::HostRefused);
    }
    let at = unsafe { self.heap_lo().add(self.used) };
    self.used += bytes;
    Ok(at)
  }

  fn reset(&mut self) {
    self.used = 0;
  }

  fn max_single_grow(&self) -> usize {
    self.chunk_limit
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sim_heap_starts_empty() {
    let mem = SimMemLib::new(4096);
    assert_eq!(mem.heap_size(), 0);
    assert_eq!(mem.heap_lo(), mem.heap_hi());
  }

  #[test]
  fn sim_heap_grows_and_reports_size() {
    let mut mem = SimMemLib::new(4096);
    let p1 = mem.grow(64).unwrap();
    assert_eq!(p1, mem.heap_lo());
    assert_eq!(mem.heap_size(), 64);

    let p2 = mem.grow(32).unwrap();
    assert_eq!(p2 as usize, mem.heap_lo() as usize + 64);
    assert_eq!(mem.heap_size(), 96);
  }

  #[test]
  fn sim_heap_refuses_past_capacity() {
    let mut mem = SimMemLib::new(128);
    assert!(mem.grow(64).is_ok());
    assert_eq!(mem.grow(128), Err(GrowError::HostRefused));
    assert_eq!(mem.heap_size(), 64);
  }

  #[test]
  fn sim_heap_reset_rolls_back_to_zero() {
    let mut mem = SimMemLib::new(128);
    mem.grow(64).unwrap();
    mem.reset();
    assert_eq!(mem.heap_size(), 0);
  }

  #[test]
  fn sim_heap_respects_chunk_limit() {
    let mut mem = SimMemLib::with_chunk_limit(1024, 16);
    assert_eq!(mem.max_single_grow(), 16);
    assert!(mem.grow(16).is_ok());
  }
}
