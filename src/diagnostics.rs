//! Diagnostic reporting (spec.md §7).
//!
//! The teacher crate's own convention for this is a small free
//! function, `print_alloc`, called explicitly at call sites rather
//! than wired into a global logger. This module keeps that shape:
//! opt-in event tracing behind the `trace` feature, plus the one
//! diagnostic that is never optional - the abort-on-corruption path
//! required by spec.md §7.2.

/// Reports a contract violation (a corrupt or foreign pointer handed
/// to `free`/`realloc`) and aborts the process. There is no recovery
/// path for this case: spec.md §7.2 calls continuing past heap
/// corruption unsafe, and the public API has no error return for it.
#[cold]
pub fn fatal(message: &str, ptr: *const u8) -> ! {
  eprintln!("allocator: fatal: {message} (pointer = {ptr:p})");
  std::process::abort();
}

/// Same as [`fatal`], without an associated pointer.
#[cold]
pub fn fatal_no_ptr(message: &str) -> ! {
  eprintln!("allocator: fatal: {message}");
  std::process::abort();
}

#[cfg(feature = "trace")]
pub fn trace_alloc(bytes: usize, addr: *const u8) {
  eprintln!("allocator: malloc({bytes}) = {addr:p}");
}

#[cfg(not(feature = "trace"))]
#[inline(always)]
pub fn trace_alloc(_bytes: usize, _addr: *const u8) {}

#[cfg(feature = "trace")]
pub fn trace_free(addr: *const u8) {
  eprintln!("allocator: free({addr:p})");
}

#[cfg(not(feature = "trace"))]
#[inline(always)]
pub fn trace_free(_addr: *const u8) {}

#[cfg(feature = "trace")]
pub fn trace_realloc(addr: *const u8, bytes: usize, new_addr: *const u8) {
  eprintln!("allocator: realloc({addr:p}, {bytes}) = {new_addr:p}");
}

#[cfg(not(feature = "trace"))]
#[inline(always)]
pub fn trace_realloc(_addr: *const u8, _bytes: usize, _new_addr: *const u8) {}
