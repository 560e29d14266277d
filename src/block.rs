//! The block subsystem: in-band block headers, validity, split and merge.
//!
//! Grounded directly in the original `ft_malloc` block operations
//! (`ft_block_split`/`ft_block_merge`/`ft_block_is_valid`, referenced from
//! `original_source/src/malloc.c`) and in the header-plus-magic shape of
//! `mm/src/kernel_heap.rs`'s `SlabHeader`/`LargeAllocHeader`.

use core::mem;
use core::ptr;

use crate::align::align_up;
use crate::sizing::ALIGN;
use crate::zone::ZoneHeader;

/// Marks a block as allocated and intact. Any other value in `magic` means
/// the block is either free or the pointer is not one of ours.
pub const ALLOC_MAGIC: u32 = 0x4D41_4C43; // "MALC"

/// In-band header prefixing every block. Lives at the very start of the
/// block's bytes; the user's data pointer is `self as *mut u8 + size_of::<Self>()`.
///
/// The trailing word is always present, `verbose` or not: the fields above
/// it total 56 bytes, one `usize` short of a 16-byte multiple, and
/// `data_ptr`/`block_total_size` both assume `BLOCK_HEADER_SIZE` itself is
/// `ALIGN`-aligned (the header carries no alignment padding of its own).
/// Under `verbose` that word is the real `user_size`; without it, it's
/// explicit padding rather than an accidental reliance on the feature to
/// round the struct out.
#[repr(C)]
pub struct BlockHeader {
    /// Total size of this block in bytes, including this header.
    pub size: usize,
    /// True while the block sits on its zone's free list.
    pub is_free: bool,
    /// [`ALLOC_MAGIC`] when allocated; 0 when free.
    pub magic: u32,
    /// Owning zone. Never null once a block has been installed in a zone.
    pub zone: *mut ZoneHeader,
    /// Address-ordered intra-zone neighbors (spans the whole zone exactly).
    pub prev: *mut BlockHeader,
    pub next: *mut BlockHeader,
    /// Free-list neighbors; null on both ends for an allocated block.
    pub prev_free: *mut BlockHeader,
    pub next_free: *mut BlockHeader,
    /// Exact user-requested size, stored only when `verbose` is enabled.
    #[cfg(feature = "verbose")]
    pub user_size: usize,
    /// Keeps `BLOCK_HEADER_SIZE` a multiple of `ALIGN` when `user_size`
    /// isn't present. Never read.
    #[cfg(not(feature = "verbose"))]
    _pad: usize,
}

pub const BLOCK_HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

#[cfg(test)]
mod header_layout_tests {
    use super::*;

    #[test]
    fn header_size_is_align_aligned_regardless_of_verbose() {
        assert_eq!(BLOCK_HEADER_SIZE % ALIGN, 0);
    }
}

impl BlockHeader {
    /// Initialize a freshly-mapped region as a single free block of `size`
    /// bytes (header included), with no neighbors yet.
    ///
    /// # Safety
    /// `at` must point to at least `size` bytes of writable memory, aligned
    /// to `align_of::<BlockHeader>()`.
    pub unsafe fn init_free(at: *mut BlockHeader, size: usize, zone: *mut ZoneHeader) {
        unsafe {
            (*at).size = size;
            (*at).is_free = true;
            (*at).magic = 0;
            (*at).zone = zone;
            (*at).prev = ptr::null_mut();
            (*at).next = ptr::null_mut();
            (*at).prev_free = ptr::null_mut();
            (*at).next_free = ptr::null_mut();
            #[cfg(feature = "verbose")]
            {
                (*at).user_size = 0;
            }
            #[cfg(not(feature = "verbose"))]
            {
                (*at)._pad = 0;
            }
        }
    }

    /// The user-visible data pointer for a block header at `header`.
    #[inline]
    pub fn data_ptr(header: *mut BlockHeader) -> *mut u8 {
        unsafe { (header as *mut u8).add(BLOCK_HEADER_SIZE) }
    }

    /// Recover the block header from a user data pointer. Does not validate
    /// the result — callers must check [`is_valid`] before trusting it.
    #[inline]
    pub fn from_data_ptr(ptr: *mut u8) -> *mut BlockHeader {
        unsafe { ptr.sub(BLOCK_HEADER_SIZE) as *mut BlockHeader }
    }
}

/// A block is valid iff its magic word is intact and it is not on a free
/// list. Release/resize treat a failing pointer as a silent no-op rather
/// than a fault — see SPEC_FULL.md §4.2.
///
/// # Safety
/// `header` must point to readable memory at least `size_of::<BlockHeader>()`
/// bytes long (true for anything recovered via [`BlockHeader::from_data_ptr`]
/// from a pointer that at least used to be a live allocation from this
/// allocator; a wholly foreign pointer can still crash here, same as libc
/// `free()` on garbage).
pub unsafe fn is_valid(header: *mut BlockHeader) -> bool {
    if header.is_null() {
        return false;
    }
    unsafe { (*header).magic == ALLOC_MAGIC && !(*header).is_free }
}

/// Split `block` (of size `block_size`) into a prefix of `needed` bytes and a
/// free remainder, iff the remainder could itself host a minimum block
/// (`BLOCK_HEADER_SIZE + ALIGN`). Returns the remainder's header on success.
///
/// The remainder inherits `block`'s old right neighbor; the caller is
/// responsible for inserting the remainder into the zone's free list.
///
/// # Safety
/// `block` must be a valid, currently-unlinked (from both lists) block
/// header with `size == block_size`.
pub unsafe fn split(block: *mut BlockHeader, needed: usize) -> Option<*mut BlockHeader> {
    unsafe {
        let block_size = (*block).size;
        if block_size < needed {
            return None;
        }
        let remainder_size = block_size - needed;
        if remainder_size < BLOCK_HEADER_SIZE + ALIGN {
            return None;
        }

        let zone = (*block).zone;
        let old_next = (*block).next;
        let remainder = (block as *mut u8).add(needed) as *mut BlockHeader;

        BlockHeader::init_free(remainder, remainder_size, zone);
        (*remainder).prev = block;
        (*remainder).next = old_next;
        if !old_next.is_null() {
            (*old_next).prev = remainder;
        }

        (*block).size = needed;
        (*block).next = remainder;

        Some(remainder)
    }
}

/// Two address-adjacent free blocks can be merged into one. `left` absorbs
/// `right`'s bytes and takes on `right`'s old right neighbor. Neither block
/// is touched in any free list by this function — the caller must have
/// already unlinked `right` (and, if merging leftward, `left` itself).
///
/// # Safety
/// `left` and `right` must both be free blocks in the same zone with
/// `right == left.next` (i.e. truly address-adjacent).
pub unsafe fn merge(left: *mut BlockHeader, right: *mut BlockHeader) {
    unsafe {
        debug_assert!((*left).is_free && (*right).is_free);
        debug_assert_eq!((*left).next, right);

        (*left).size += (*right).size;
        let new_next = (*right).next;
        (*left).next = new_next;
        if !new_next.is_null() {
            (*new_next).prev = left;
        }
    }
}

/// Can `left` and `right` be merged: both free, and address-adjacent in the
/// zone's intra-zone list? Used by release's coalescing, where both sides
/// are already free blocks.
#[inline]
pub fn can_merge(left: *const BlockHeader, right: *const BlockHeader) -> bool {
    if left.is_null() || right.is_null() {
        return false;
    }
    unsafe { (*left).is_free && (*right).is_free && (*left).next == right as *mut BlockHeader }
}

/// Is `right` a free, address-adjacent right neighbor of `block`? Unlike
/// [`can_merge`], `block` itself is not required to be free — this backs
/// resize's in-place grow, which absorbs a free right neighbor into a
/// still-allocated block.
#[inline]
pub fn right_neighbor_is_free(block: *const BlockHeader, right: *const BlockHeader) -> bool {
    if right.is_null() {
        return false;
    }
    unsafe { (*right).is_free && (*block).next == right as *mut BlockHeader }
}

/// Align a raw block total up to the allocator's granule. Exposed for the
/// zone subsystem, which needs to size the first block of a fresh zone.
#[inline]
pub fn align_block_total(n: usize) -> usize {
    align_up(n, ALIGN)
}
