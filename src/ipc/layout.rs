//! Byte layout of the shared region: a fixed header followed by the slots.
//!
//! ```text
//! +-------------------------------+  offset 0
//! | magic        AtomicU32        |
//! | capacity     u32              |
//! | read_index   AtomicU32        |
//! | write_index  AtomicU32        |
//! | stop         AtomicBool       |
//! +-------------------------------+  slots_offset()
//! | Solution × capacity           |
//! +-------------------------------+  region_size(capacity)
//! ```
//!
//! The creator writes every header field, then publishes `magic` with
//! release ordering. An attaching process loads `magic` with acquire
//! ordering before trusting anything else in the region.

use crate::graph::Solution;
use std::mem::{align_of, size_of};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Marks a fully initialised region ("FBAS").
pub const MAGIC: u32 = 0x4642_4153;

#[repr(C)]
pub struct Header {
    pub magic: AtomicU32,
    pub capacity: u32,
    pub read_index: AtomicU32,
    pub write_index: AtomicU32,
    pub stop: AtomicBool,
}

/// Offset of the first slot, aligned for `Solution`.
pub const fn slots_offset() -> usize {
    let align = align_of::<Solution>();
    size_of::<Header>().div_ceil(align) * align
}

/// Total bytes needed for `capacity` slots.
pub const fn region_size(capacity: usize) -> usize {
    slots_offset() + capacity * size_of::<Solution>()
}

/// Write a fresh header for `capacity` slots and publish it.
///
/// # Safety
/// `base` must point to at least `region_size(capacity)` writable bytes,
/// aligned for `Header`, that no other process reads yet.
pub unsafe fn initialize(base: *mut u8, capacity: u32) {
    let header = base as *mut Header;
    // SAFETY: caller guarantees the region is large enough and unshared.
    unsafe {
        header.write(Header {
            magic: AtomicU32::new(0),
            capacity,
            read_index: AtomicU32::new(0),
            write_index: AtomicU32::new(0),
            stop: AtomicBool::new(false),
        });
        (*header).magic.store(MAGIC, Ordering::Release);
    }
}

/// Pointer to slot `index`.
///
/// # Safety
/// `base` must point to a region of at least `region_size(index + 1)` bytes.
pub unsafe fn slot_ptr(base: *mut u8, index: usize) -> *mut Solution {
    // SAFETY: caller guarantees the offset stays inside the mapping.
    unsafe { base.add(slots_offset()).cast::<Solution>().add(index) }
}
