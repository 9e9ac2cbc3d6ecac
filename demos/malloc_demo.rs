use std::io::Read;

use segfit::{SbrkMemLib, SingleLinkedAllocator};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { libc::sbrk(0) },
  );
}

fn main() {
  // The allocator itself holds no heap state beyond a free-list
  // registry and the `next` carve-off pointer; all growth goes
  // through the MemLib it was built with.
  let mut heap = SingleLinkedAllocator::new(SbrkMemLib::new());

  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate space for a u32.
    // --------------------------------------------------------------------
    let first_block = heap.malloc(4) as *mut u32;
    println!("\n[1] malloc(4) = {:?}", first_block);
    first_block.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_block.read());
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 12 "odd-sized" bytes.
    // --------------------------------------------------------------------
    let second_block = heap.malloc(12);
    println!("\n[2] malloc(12) = {:?}", second_block);
    std::ptr::write_bytes(second_block, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Grow the first block in place or relocate it, preserving content.
    // --------------------------------------------------------------------
    let grown = heap.realloc(first_block as *mut u8, 256) as *mut u32;
    println!(
      "\n[3] realloc(first_block, 256) = {:?} (moved: {})",
      grown,
      grown != first_block as *mut u32
    );
    println!("[3] Preserved value = 0x{:X}", grown.read());
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Free the second block, then allocate a small block to see if the
    //    allocator reuses the freed space from its size-class free list.
    // --------------------------------------------------------------------
    heap.free(second_block);
    println!("\n[4] Freed second_block at {:?}", second_block);
    let third_block = heap.malloc(2);
    println!(
      "[4] malloc(2) = {:?} (reused second_block? {})",
      third_block,
      third_block == second_block
    );
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Allocate a large block to observe heap growth via sbrk.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");
    let big_block = heap.malloc(64 * 1024);
    println!("\n[5] malloc(64 KiB) = {:?}", big_block);
    print_program_break("after large alloc");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Shrink the grown block back down, then free everything.
    // --------------------------------------------------------------------
    let shrunk = heap.realloc(grown as *mut u8, 4);
    println!("\n[6] realloc(grown, 4) = {:?}", shrunk);
    heap.free(shrunk);
    heap.free(third_block);
    heap.free(big_block);
    println!("\n[7] End of demo. All blocks freed back to the allocator's free lists.");
  }
}
