//! Segregated free-list registry (spec.md §4.3).
//!
//! Eleven doubly-linked lists, one per size class, each tracked by a
//! `head`/`tail` pair. New frees are appended at the tail; lists are
//! not sorted by size and no attempt is made here to coalesce -
//! that's the engine's job (spec.md §4.4).

use std::ptr::NonNull;

use crate::header::Header;
use crate::links::{get_next, get_prev, set_next, set_prev};
use crate::units::NUM_CLASSES;

#[derive(Clone, Copy)]
struct ClassList {
  head: Option<NonNull<Header>>,
  tail: Option<NonNull<Header>>,
}

impl ClassList {
  const EMPTY: ClassList = ClassList {
    head: None,
    tail: None,
  };
}

pub struct FreeListRegistry {
  classes: [ClassList; NUM_CLASSES],
}

impl FreeListRegistry {
  pub fn new() -> Self {
    FreeListRegistry {
      classes: [ClassList::EMPTY; NUM_CLASSES],
    }
  }

  pub fn head(&self, class: usize) -> Option<NonNull<Header>> {
    self.classes[class].head
  }

  /// Appends `block` to the tail of `class`'s list.
  ///
  /// # Safety
  /// `block` must be free, unlinked, and have payload capacity for
  /// the two link units.
  pub unsafe fn insert_tail(&mut self, class: usize, block: NonNull<Header>) {
    unsafe {
      set_next(block, None);
      match self.classes[class].tail {
        None => {
          set_prev(block, None);
          self.classes[class].head = Some(block);
        }
        Some(tail) => {
          set_next(tail, Some(block));
          set_prev(block, Some(tail));
        }
      }
      self.classes[class].tail = Some(block);
    }
  }

  /// Unlinks `block` from `class`'s list. Handles the four cases
  /// from spec.md §4.3: head-and-tail, head-only, tail-only, interior.
  ///
  /// # Safety
  /// `block` must currently be a member of `class`'s list.
  pub unsafe fn unlink(&mut self, class: usize, block: NonNull<Header>) {
    unsafe {
      let prev = get_prev(block);
      let next = get_next(block);
      match prev {
        Some(p) => set_next(p, next),
        None => self.classes[class].head = next,
      }
      match next {
        Some(n) => set_prev(n, prev),
        None => self.classes[class].tail = prev,
      }
    }
  }

  /// First-fit scan of `class` for a free block whose encoded size
  /// is at least `min_size`.
  ///
  /// # Safety
  /// Every block reachable from `class`'s head must be a live,
  /// well-formed free block.
  pub unsafe fn scan(&self, class: usize, min_size: u32) -> Option<NonNull<Header>> {
    unsafe {
      let mut cursor = self.classes[class].head;
      while let Some(block) = cursor {
        if block.as_ref().size() >= min_size {
          return Some(block);
        }
        cursor = get_next(block);
      }
      None
    }
  }

  /// First non-empty class strictly above `class` (spec.md §4.4.1's
  /// "allocate from larger" fallback).
  pub fn first_nonempty_above(&self, class: usize) -> Option<usize> {
    (class + 1..NUM_CLASSES).find(|&c| self.classes[c].head.is_some())
  }
}

impl Default for FreeListRegistry {
  fn default() -> Self {
    Self::new()
  }
}
