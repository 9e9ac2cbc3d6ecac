//! # segfit - A Segregated-Fits Memory Allocator
//!
//! This crate provides a `malloc`/`free`/`realloc` replacement that
//! manages a single, monotonically-extensible heap region on top of a
//! host-supplied growth primitive (`sbrk(2)` by default, or an
//! in-memory stand-in for tests).
//!
//! ## Overview
//!
//! Free blocks are tracked in eleven segregated free lists, one per
//! size class, rather than one big list walked on every allocation:
//!
//! ```text
//!   Segregated Free Lists:
//!
//!   class 0 (1 unit)   ┌────┐ → ┌────┐ → ┌────┐
//!   class 1 (2 units)  ┌────┐ → ┌────┐
//!   class 2 (3 units)  ┌────┐
//!   ...
//!   class 7 (8-15)      ┌──────┐ → ┌──────┐ → ┌──────┐
//!   class 8 (16-31)     ┌────────┐
//!   class 9 (32-63)     (empty)
//!   class 10 (>=64)     ┌──────────────┐
//!
//!   malloc(n) picks the class for n, pops its head (exact classes)
//!   or first-fits within it (largish classes), falling back to a
//!   larger class or the heap tail when the class is empty.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   segfit
//!   ├── header      - block header/footer bit layout
//!   ├── units       - byte<->unit conversion, size-class table
//!   ├── links       - intrusive free-list pointers overlaid on payload
//!   ├── freelist    - the eleven-class free-list registry
//!   ├── memlib      - host heap-growth primitive (MemLib trait)
//!   ├── error       - GrowError (the one recoverable failure mode)
//!   ├── diagnostics - abort-on-corruption, opt-in event tracing
//!   ├── single      - single-linked heap: forward coalesce only
//!   └── double      - double-linked heap: forward + backward coalesce
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use segfit::{SingleLinkedAllocator, SbrkMemLib};
//!
//! fn main() {
//!     let mut heap = SingleLinkedAllocator::new(SbrkMemLib::new());
//!
//!     unsafe {
//!         let ptr = heap.malloc(64) as *mut u64;
//!         *ptr = 42;
//!         println!("Value: {}", *ptr);
//!         heap.free(ptr as *mut u8);
//!     }
//! }
//! ```
//!
//! ## Block Layout
//!
//! Every block starts with a one-unit header: a minus-one-encoded
//! payload size, the allocated bit, and (while free) a size-class
//! index. The double-linked variant additionally carries a one-unit
//! footer - a byte-for-byte copy of the header - enabling backward
//! traversal for coalescing with a freed left neighbor:
//!
//! ```text
//!   Single-linked block (no footer):
//!   ┌────────┬──────────────────────────────┐
//!   │ header │           payload            │
//!   │ 1 unit │         size+1 units         │
//!   └────────┴──────────────────────────────┘
//!
//!   Double-linked block (boundary tag):
//!   ┌────────┬──────────────────────────────┬────────┐
//!   │ header │           payload            │ footer │
//!   │ 1 unit │         size+1 units         │ 1 unit │
//!   └────────┴──────────────────────────────┴────────┘
//! ```
//!
//! A free block's payload doubles up as an intrusive doubly-linked
//! list node (`prev`/`next`, see [`links`]) - valid only while the
//! block is free, since an allocated block's payload belongs entirely
//! to the caller.
//!
//! ## Features
//!
//! - `trace` - opt-in `eprintln!` tracing of `malloc`/`free`/`realloc`
//!   calls via [`diagnostics`]. Off by default.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives.
//! - **No shrink-to-OS**: freed memory is recycled, never returned to
//!   the host.
//! - **Unix-only** for [`SbrkMemLib`]; [`memlib::SimMemLib`] has no
//!   such restriction.
//!
//! ## Safety
//!
//! This crate is inherently unsafe, as it deals with raw memory
//! management and pointer arithmetic directly. `malloc`/`free`/`realloc`
//! all require `unsafe` blocks; passing a pointer that didn't come
//! from the same allocator instance, or reusing one already freed, is
//! undefined behavior at best and a diagnosed abort at worst (see
//! [`diagnostics::fatal`]).

pub mod diagnostics;
pub mod double;
pub mod error;
pub mod freelist;
pub mod header;
pub mod links;
pub mod memlib;
pub mod single;
pub mod units;

pub use double::DoubleLinkedAllocator;
pub use error::GrowError;
pub use memlib::{MemLib, SbrkMemLib, SimMemLib};
pub use single::SingleLinkedAllocator;

/// The block layout selected when no specific variant is named: the
/// single-linked heap unless the `boundary-tags` feature asks for the
/// double-linked one.
#[cfg(not(feature = "boundary-tags"))]
pub type DefaultAllocator<M> = SingleLinkedAllocator<M>;

/// See the non-`boundary-tags` [`DefaultAllocator`] doc.
#[cfg(feature = "boundary-tags")]
pub type DefaultAllocator<M> = DoubleLinkedAllocator<M>;
