//! Size-class table and byte/unit conversions (spec.md §3, §4.1).

use crate::header::UNIT_BYTES;

/// Classes 0..6 hold exact payload sizes of 1..7 units each.
pub const NUM_SMALL_CLASSES: usize = 7;
/// Total size classes: 7 small + medium-small/medium/medium-large/large.
pub const NUM_CLASSES: usize = 11;

/// Converts a byte count to the header's minus-one-encoded size.
/// Mirrors `bytes_to_units` in `original_source/mm-single.c`.
pub fn bytes_to_payload_units(bytes: usize) -> u32 {
  debug_assert!(bytes > 0);
  (bytes.div_ceil(UNIT_BYTES) - 1) as u32
}

/// Maps a minus-one-encoded payload size to its size-class index.
/// Branch-driven per spec.md §4.1; ranges mirror `get_class_index` in
/// `original_source/mm-{single,double}.c`.
pub fn class_of(size: u32) -> usize {
  match size {
    0..=6 => size as usize,
    7..=14 => 7,
    15..=30 => 8,
    31..=62 => 9,
    _ => 10,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bytes_round_trip_small() {
    assert_eq!(bytes_to_payload_units(1), 0);
    assert_eq!(bytes_to_payload_units(8), 0);
    assert_eq!(bytes_to_payload_units(9), 1);
    assert_eq!(bytes_to_payload_units(16), 1);
    assert_eq!(bytes_to_payload_units(17), 2);
  }

  #[test]
  fn class_boundaries() {
    for size in 0..=6u32 {
      assert_eq!(class_of(size), size as usize);
    }
    assert_eq!(class_of(7), 7);
    assert_eq!(class_of(14), 7);
    assert_eq!(class_of(15), 8);
    assert_eq!(class_of(30), 8);
    assert_eq!(class_of(31), 9);
    assert_eq!(class_of(62), 9);
    assert_eq!(class_of(63), 10);
    assert_eq!(class_of(u32::MAX), 10);
  }
}
