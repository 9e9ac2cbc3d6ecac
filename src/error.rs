//! Failure modes the allocator can surface (spec.md §7).
//!
//! The teacher crate and the rest of the retrieval pack's complete
//! example repos carry no error-derive crate (`thiserror` et al.) in
//! their dependency graphs, so this stays a plain hand-rolled
//! `Display` enum rather than pulling one in.

use std::fmt;

/// Resource exhaustion: the host heap primitive refused to grow.
/// This is the only recoverable failure in the allocator (spec.md
/// §7.1); everything else is a contract violation and aborts instead
/// of returning an error (spec.md §7.2, see [`crate::diagnostics::fatal`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowError {
  /// The host primitive's `grow` returned its failure sentinel.
  HostRefused,
}

impl fmt::Display for GrowError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GrowError::HostRefused => write!(f, "host heap primitive refused to grow"),
    }
  }
}

impl std::error::Error for GrowError {}
