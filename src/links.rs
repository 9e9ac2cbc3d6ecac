//! Intrusive free-list links overlaid on a free block's payload
//! (spec.md §3, §9).
//!
//! `original_source/mm-{single,double}.c` store `prev`/`next` directly
//! in the header struct, which is only possible there because that
//! header is already far larger than one unit. spec.md's tighter,
//! exactly-one-unit header has no room for them, so they live in the
//! first two units of the payload instead - valid only while the
//! block is free, since an allocated block's payload belongs entirely
//! to the caller.

use std::ptr::NonNull;

use crate::header::Header;

#[inline]
unsafe fn slot(block: NonNull<Header>, index: usize) -> *mut *mut Header {
  unsafe { (block.as_ptr().add(1) as *mut *mut Header).add(index) }
}

/// # Safety
/// `block` must be free and must have payload capacity for 2 units.
pub unsafe fn get_prev(block: NonNull<Header>) -> Option<NonNull<Header>> {
  unsafe { NonNull::new(slot(block, 0).read()) }
}

/// # Safety
/// `block` must be free and must have payload capacity for 2 units.
pub unsafe fn set_prev(block: NonNull<Header>, prev: Option<NonNull<Header>>) {
  unsafe {
    slot(block, 0).write(prev.map_or(std::ptr::null_mut(), NonNull::as_ptr));
  }
}

/// # Safety
/// `block` must be free and must have payload capacity for 2 units.
pub unsafe fn get_next(block: NonNull<Header>) -> Option<NonNull<Header>> {
  unsafe { NonNull::new(slot(block, 1).read()) }
}

/// # Safety
/// `block` must be free and must have payload capacity for 2 units.
pub unsafe fn set_next(block: NonNull<Header>, next: Option<NonNull<Header>>) {
  unsafe {
    slot(block, 1).write(next.map_or(std::ptr::null_mut(), NonNull::as_ptr));
  }
}
