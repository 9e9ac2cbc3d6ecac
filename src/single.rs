//! Single-linked-heap allocator: forward coalesce only (spec.md §4.4,
//! §9). Ported from `original_source/mm-single.c`, generalized onto
//! [`Header`]/[`FreeListRegistry`]/[`MemLib`].
//!
//! A block is `header(1 unit) + payload(size+1 units)`; there is no
//! footer and no backward traversal.

use std::ptr::NonNull;

use crate::diagnostics;
use crate::error::GrowError;
use crate::freelist::FreeListRegistry;
use crate::header::{Header, UNIT_BYTES};
use crate::memlib::MemLib;
use crate::units::{bytes_to_payload_units, class_of, NUM_SMALL_CLASSES};

/// Smallest total-unit footprint a carved-off remainder block must
/// have to be worth splitting out: one header unit plus one payload
/// unit. Below this, the leftover space is left as internal
/// fragmentation of the left block (spec.md §4.4.2 step 3).
const MIN_SPLIT_REMAINDER: u32 = 2;

/// Segregated-fits allocator over a single-linked (no boundary tags)
/// implicit heap.
pub struct SingleLinkedAllocator<M: MemLib> {
  mem: M,
  lists: FreeListRegistry,
  next: *mut Header,
}

impl<M: MemLib> SingleLinkedAllocator<M> {
  /// Initializes the allocator over a fresh `MemLib` (spec.md §6
  /// `init`). `mem` must not yet have any blocks carved into it.
  pub fn new(mem: M) -> Self {
    let next = mem.heap_lo() as *mut Header;
    SingleLinkedAllocator {
      mem,
      lists: FreeListRegistry::new(),
      next,
    }
  }

  fn total_units(size: u32) -> u32 {
    size + 2
  }

  fn get_payload(block: NonNull<Header>) -> *mut u8 {
    unsafe { block.as_ptr().add(1) as *mut u8 }
  }

  /// # Safety
  /// `ptr` must have been returned by this allocator and still be
  /// outstanding (not already freed).
  unsafe fn header_of_payload(ptr: *mut u8) -> NonNull<Header> {
    let header = (ptr as *mut Header).wrapping_sub(1);
    let Some(block) = NonNull::new(header) else {
      diagnostics::fatal("free/realloc of a null-derived pointer", ptr);
    };
    if !unsafe { block.as_ref() }.is_alloc() {
      diagnostics::fatal(
        "pointer is not the payload of a currently-allocated block",
        ptr,
      );
    }
    block
  }

  unsafe fn next_in_heap(block: NonNull<Header>) -> NonNull<Header> {
    let total = Self::total_units(unsafe { block.as_ref() }.size());
    unsafe { NonNull::new_unchecked(block.as_ptr().add(total as usize)) }
  }

  /// Allocates a payload of `size` (minus-one-encoded) units
  /// (spec.md §4.4.1).
  unsafe fn allocate(&mut self, size: u32) -> *mut u8 {
    let class = class_of(size);
    if let Some(head) = self.lists.head(class) {
      if class < NUM_SMALL_CLASSES {
        return unsafe { self.allocate_block(head) };
      }
      return unsafe { self.allocate_largish(class, size) };
    }
    unsafe { self.allocate_from_larger(class, size) }
  }

  unsafe fn allocate_largish(&mut self, class: usize, size: u32) -> *mut u8 {
    match unsafe { self.lists.scan(class, size) } {
      Some(block) => unsafe { self.split_block(block, size) },
      None => unsafe { self.allocate_from_larger(class, size) },
    }
  }

  unsafe fn allocate_from_larger(&mut self, class: usize, size: u32) -> *mut u8 {
    match self.lists.first_nonempty_above(class) {
      Some(larger) => {
        let block = self.lists.head(larger).unwrap();
        unsafe { self.split_block(block, size) }
      }
      None => unsafe { self.allocate_next(size) },
    }
  }

  /// Removes `block` from its free list and marks it allocated
  /// (spec.md §4.4's `allocate_block`).
  unsafe fn allocate_block(&mut self, block: NonNull<Header>) -> *mut u8 {
    unsafe {
      let class = block.as_ref().class_index();
      self.lists.unlink(class, block);
      (*block.as_ptr()).set_alloc(true);
      Self::get_payload(block)
    }
  }

  /// Carves a `left_size`-unit payload off the front of a free block
  /// (spec.md §4.4.2).
  unsafe fn split_block(&mut self, left: NonNull<Header>, left_size: u32) -> *mut u8 {
    unsafe {
      let prev_size = left.as_ref().size();
      let payload = self.allocate_block(left);

      let remaining = prev_size - left_size;
      if remaining < MIN_SPLIT_REMAINDER {
        return payload;
      }

      (*left.as_ptr()).set_size(left_size);

      let right = Self::next_in_heap(left);
      right
        .as_ptr()
        .write(Header::new(remaining - MIN_SPLIT_REMAINDER, true));
      self.free_block(right);

      payload
    }
  }

  /// Carves a fresh block off the heap tail, growing the heap if
  /// needed (spec.md §4.4.3).
  unsafe fn allocate_next(&mut self, size: u32) -> *mut u8 {
    let block = unsafe { NonNull::new_unchecked(self.next) };
    if unsafe { self.grow_heap(Self::total_units(size) as usize) }.is_err() {
      return std::ptr::null_mut();
    }
    unsafe {
      block.as_ptr().write(Header::new(size, true));
      Self::get_payload(block)
    }
  }

  /// Marks `block` free and appends it to its size class's list
  /// (spec.md §4.4.4). Coalescing is deferred to `realloc`.
  unsafe fn free_block(&mut self, block: NonNull<Header>) {
    unsafe {
      let class = class_of(block.as_ref().size());
      (*block.as_ptr()).set_alloc(false);
      (*block.as_ptr()).set_class_index(class);
      self.lists.insert_tail(class, block);
    }
  }

  /// Grows the host heap by `units`, chunked to the host's
  /// per-call maximum, with best-effort rollback on failure
  /// (spec.md §4.4.6).
  unsafe fn grow_heap(&mut self, units: usize) -> Result<(), GrowError> {
    let prev_heap_size = self.mem.heap_size();
    let max_chunk = self.mem.max_single_grow().max(1);
    let mut remaining_bytes = units * UNIT_BYTES;

    while remaining_bytes > 0 {
      let chunk = remaining_bytes.min(max_chunk);
      if self.mem.grow(chunk).is_err() {
        self.mem.reset();
        let _ = self.mem.grow(prev_heap_size);
        return Err(GrowError::HostRefused);
      }
      remaining_bytes -= chunk;
    }

    self.next = unsafe { self.next.add(units) };
    Ok(())
  }

  /// Allocates `bytes` of payload (spec.md §6 `malloc`). `bytes ==
  /// 0` returns null "successfully".
  pub unsafe fn malloc(&mut self, bytes: usize) -> *mut u8 {
    if bytes == 0 {
      return std::ptr::null_mut();
    }
    let size = bytes_to_payload_units(bytes);
    let ptr = unsafe { self.allocate(size) };
    diagnostics::trace_alloc(bytes, ptr);
    ptr
  }

  /// Frees a previously-allocated block (spec.md §6 `free`). `ptr
  /// == null` is a no-op; any other pointer not currently allocated
  /// by this allocator is a fatal contract violation.
  pub unsafe fn free(&mut self, ptr: *mut u8) {
    if ptr.is_null() {
      return;
    }
    diagnostics::trace_free(ptr);
    let block = unsafe { Self::header_of_payload(ptr) };
    unsafe { self.free_block(block) };
  }

  /// Resizes a previously-allocated block (spec.md §6 `realloc`,
  /// §4.4.5's state machine).
  pub unsafe fn realloc(&mut self, ptr: *mut u8, bytes: usize) -> *mut u8 {
    if ptr.is_null() {
      return unsafe { self.malloc(bytes) };
    }
    if bytes == 0 {
      unsafe { self.free(ptr) };
      return std::ptr::null_mut();
    }

    let block = unsafe { Self::header_of_payload(ptr) };
    let prev_size = unsafe { block.as_ref() }.size();
    let size = bytes_to_payload_units(bytes);

    let result = if size == prev_size {
      ptr
    } else if size < prev_size {
      unsafe { self.realloc_shrink(block, prev_size, size, ptr) }
    } else {
      unsafe { self.realloc_grow(block, prev_size, size, ptr) }
    };
    diagnostics::trace_realloc(ptr, bytes, result);
    result
  }

  unsafe fn realloc_shrink(
    &mut self,
    block: NonNull<Header>,
    prev_size: u32,
    size: u32,
    ptr: *mut u8,
  ) -> *mut u8 {
    unsafe {
      let remaining = prev_size - size;
      if remaining < MIN_SPLIT_REMAINDER {
        return ptr;
      }

      (*block.as_ptr()).set_size(size);

      let right = Self::next_in_heap(block);
      right
        .as_ptr()
        .write(Header::new(remaining - MIN_SPLIT_REMAINDER, true));
      self.free_block(right);

      ptr
    }
  }

  unsafe fn realloc_grow(
    &mut self,
    block: NonNull<Header>,
    prev_size: u32,
    size: u32,
    ptr: *mut u8,
  ) -> *mut u8 {
    unsafe {
      let right = Self::next_in_heap(block);
      let needed = size - prev_size;

      let mut iter = right;
      let mut total: u32 = 0;
      while (iter.as_ptr() as usize) < (self.next as usize)
        && !iter.as_ref().is_alloc()
        && total < needed
      {
        total += Self::total_units(iter.as_ref().size());
        iter = Self::next_in_heap(iter);
      }
      let rightmost = iter;

      if total >= needed {
        return self.realloc_forward_coalesce(block, size, right, rightmost, total, needed, ptr);
      }

      if rightmost.as_ptr() as usize == self.next as usize {
        return self.realloc_heap_extend(block, size, right, rightmost, total, needed);
      }

      self.realloc_fallback(block, prev_size, size, ptr)
    }
  }

  #[allow(clippy::too_many_arguments)]
  unsafe fn realloc_forward_coalesce(
    &mut self,
    block: NonNull<Header>,
    size: u32,
    right: NonNull<Header>,
    rightmost: NonNull<Header>,
    total: u32,
    needed: u32,
    ptr: *mut u8,
  ) -> *mut u8 {
    unsafe {
      // Unlink every fully-absorbed block, but leave the last one
      // (bordering `rightmost`) untouched: the extra-unit logic
      // below decides whether it gets absorbed whole or split.
      let mut cur = right;
      while Self::next_in_heap(cur) != rightmost {
        let nxt = Self::next_in_heap(cur);
        self.allocate_block(cur);
        cur = nxt;
      }
      let last = cur;

      let extra = total - needed;
      if extra < MIN_SPLIT_REMAINDER {
        self.allocate_block(last);
        (*block.as_ptr()).set_size(size + extra);
      } else if extra == last.as_ref().size() + 1 {
        self.split_block(last, 0);
        (*block.as_ptr()).set_size(size + 1);
      } else {
        let last_size = last.as_ref().size();
        self.split_block(last, last_size - extra);
        (*block.as_ptr()).set_size(size);
      }

      ptr
    }
  }

  unsafe fn realloc_heap_extend(
    &mut self,
    block: NonNull<Header>,
    size: u32,
    right: NonNull<Header>,
    rightmost: NonNull<Header>,
    total: u32,
    needed: u32,
  ) -> *mut u8 {
    unsafe {
      if self.grow_heap((needed - total) as usize).is_err() {
        return std::ptr::null_mut();
      }

      let mut cur = right;
      while (cur.as_ptr() as usize) < (rightmost.as_ptr() as usize) {
        let nxt = Self::next_in_heap(cur);
        self.allocate_block(cur);
        cur = nxt;
      }

      (*block.as_ptr()).set_size(size);
      Self::get_payload(block)
    }
  }

  unsafe fn realloc_fallback(
    &mut self,
    block: NonNull<Header>,
    prev_size: u32,
    size: u32,
    ptr: *mut u8,
  ) -> *mut u8 {
    unsafe {
      let new_ptr = self.allocate(size);
      if new_ptr.is_null() {
        return std::ptr::null_mut();
      }
      let copy_units = prev_size.min(size) as usize + 1;
      std::ptr::copy_nonoverlapping(ptr, new_ptr, copy_units * UNIT_BYTES);
      self.free_block(block);
      new_ptr
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::memlib::SimMemLib;

  fn fresh(capacity: usize) -> SingleLinkedAllocator<SimMemLib> {
    SingleLinkedAllocator::new(SimMemLib::new(capacity))
  }

  fn fill(ptr: *mut u8, len: usize, byte: u8) {
    unsafe { std::ptr::write_bytes(ptr, byte, len) };
  }

  fn verify(ptr: *const u8, len: usize, byte: u8) {
    for i in 0..len {
      assert_eq!(unsafe { *ptr.add(i) }, byte);
    }
  }

  #[test]
  fn scenario_1_malloc_then_free_lands_in_class_zero() {
    let mut a = fresh(1 << 16);
    unsafe {
      let p = a.malloc(8);
      assert!(!p.is_null());
      a.free(p);
      assert!(a.lists.head(0).is_some());
    }
  }

  #[test]
  fn scenario_2_grow_from_small_to_large_preserves_content() {
    let mut a = fresh(1 << 16);
    unsafe {
      let p = a.malloc(8);
      fill(p, 8, 0xAB);
      let q = a.realloc(p, 1024);
      assert!(!q.is_null());
      verify(q, 8, 0xAB);
      a.free(q);
    }
  }

  #[test]
  fn scenario_3_shrink_back_down_preserves_content() {
    let mut a = fresh(1 << 16);
    unsafe {
      let p = a.malloc(8);
      fill(p, 8, 0x5A);
      let q = a.realloc(p, 1024);
      verify(q, 8, 0x5A);
      let r = a.realloc(q, 8);
      verify(r, 8, 0x5A);
    }
  }

  #[test]
  fn scenario_4_same_size_realloc_is_a_noop() {
    let mut a = fresh(1 << 16);
    unsafe {
      let p = a.malloc(8);
      let q = a.realloc(p, 8);
      assert_eq!(p, q);
    }
  }

  #[test]
  fn realloc_null_is_malloc_and_zero_size_is_free() {
    let mut a = fresh(1 << 16);
    unsafe {
      let p = a.realloc(std::ptr::null_mut(), 16);
      assert!(!p.is_null());
      let n = a.realloc(p, 0);
      assert!(n.is_null());
    }
  }

  #[test]
  fn malloc_zero_returns_null() {
    let mut a = fresh(1 << 16);
    assert!(unsafe { a.malloc(0) }.is_null());
  }

  #[test]
  fn forward_coalesce_grows_in_place_when_next_block_is_free() {
    let mut a = fresh(1 << 16);
    unsafe {
      let p = a.malloc(64);
      let q = a.malloc(64);
      a.free(q);
      // p's immediate neighbor is free and large enough: realloc
      // should coalesce forward in place rather than relocate.
      let grown = a.realloc(p, 96);
      assert_eq!(grown, p);
    }
  }

  #[test]
  fn stress_random_sizes_preserve_content_and_heap_walk() {
    let mut a = fresh(4 << 20);
    let mut state: u64 = 0x2545F4914F6CDD1D;
    let mut next_rand = move || {
      state ^= state << 13;
      state ^= state >> 7;
      state ^= state << 17;
      state
    };

    let mut live: Vec<(*mut u8, usize, u8)> = Vec::new();
    unsafe {
      for i in 0..256 {
        let size = 1 + (next_rand() % 512) as usize;
        let p = a.malloc(size);
        assert!(!p.is_null(), "malloc({size}) failed at iteration {i}");
        let byte = (i & 0xFF) as u8;
        fill(p, size, byte);
        live.push((p, size, byte));
      }

      for (p, size, byte) in &live {
        verify(*p, *size, *byte);
      }

      // Free every other survivor, then grow the rest.
      let mut kept = Vec::new();
      for (i, (p, size, byte)) in live.into_iter().enumerate() {
        if i % 2 == 0 {
          a.free(p);
        } else {
          kept.push((p, size, byte));
        }
      }

      for (p, size, byte) in kept {
        verify(p, size, byte);
        let new_size = 1 + (next_rand() % 1024) as usize;
        let q = a.realloc(p, new_size);
        assert!(!q.is_null());
        verify(q, size.min(new_size), byte);
      }
    }
  }
}
