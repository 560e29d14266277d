//! Zone headers and zone lifecycle: mapping a fresh zone, tearing one down,
//! and the free-list splice helpers shared by the allocation façade.
//!
//! Grounded in `mm/src/kernel_heap.rs`'s zone/slab bookkeeping for the header
//! shape, and in `original_source/src/malloc.c`'s `ft_free_list_add` /
//! `ft_free_list_remove` for the free-list splice logic.

use core::ptr;

use crate::block::{BlockHeader, BLOCK_HEADER_SIZE};
use crate::error::ZoneError;
use crate::platform::{map_pages, unmap_pages};
use crate::sizing::{zone_size_for, SizeClass};

/// Header prefixing every zone's mapping. `first_block` anchors the
/// address-ordered intra-zone block list; `free_head` anchors the subset of
/// those blocks currently free.
#[repr(C)]
pub struct ZoneHeader {
    pub class: SizeClass,
    /// Bytes mapped for this zone, header included. Needed to `munmap` it.
    pub total_size: usize,
    /// Bytes currently handed out to callers (user-visible payload only
    /// under `verbose`, block totals otherwise — see SPEC_FULL.md §9).
    pub used_size: usize,
    /// Live (allocated) block count. A LARGE zone is torn down the moment
    /// this reaches zero; TINY/SMALL zones never are.
    pub block_count: usize,
    pub first_block: *mut BlockHeader,
    pub free_head: *mut BlockHeader,
    /// Class-list neighbors, maintained by the zone manager.
    pub prev: *mut ZoneHeader,
    pub next: *mut ZoneHeader,
}

pub const ZONE_HEADER_SIZE: usize = core::mem::size_of::<ZoneHeader>();

/// Map and initialize a fresh zone able to host at least one block of
/// `min_block_total` bytes, with that single block installed free.
///
/// Returns the new zone's header on success. The caller is responsible for
/// splicing it into the manager's class list.
pub fn create(class: SizeClass, min_block_total: usize) -> Result<*mut ZoneHeader, ZoneError> {
    let mapped_len = zone_size_for(class, min_block_total);
    if mapped_len == 0 || mapped_len < ZONE_HEADER_SIZE + min_block_total {
        return Err(ZoneError::SizeOverflow);
    }

    let base = map_pages(mapped_len);
    if base.is_null() {
        return Err(ZoneError::MapFailed);
    }

    let zone = base as *mut ZoneHeader;
    let first_block = unsafe { base.add(ZONE_HEADER_SIZE) } as *mut BlockHeader;
    let block_total = mapped_len - ZONE_HEADER_SIZE;

    unsafe {
        (*zone).class = class;
        (*zone).total_size = mapped_len;
        (*zone).used_size = 0;
        (*zone).block_count = 0;
        (*zone).first_block = first_block;
        (*zone).free_head = first_block;
        (*zone).prev = ptr::null_mut();
        (*zone).next = ptr::null_mut();

        BlockHeader::init_free(first_block, block_total, zone);
    }

    Ok(zone)
}

/// Unmap a zone. The zone must already be unlinked from its manager's class
/// list and have no live blocks (`block_count == 0`).
///
/// # Safety
/// `zone` must be a valid pointer returned by [`create`] and not referenced
/// by anyone else afterward.
pub unsafe fn destroy(zone: *mut ZoneHeader) {
    unsafe {
        debug_assert_eq!((*zone).block_count, 0);
        let len = (*zone).total_size;
        unmap_pages(zone as *mut u8, len);
    }
}

/// Whether a zone currently has no blocks allocated out of it at all
/// (a single free block spanning the whole zone).
pub fn is_fully_free(zone: *mut ZoneHeader) -> bool {
    unsafe { (*zone).block_count == 0 }
}

/// Prepend `block` to `zone`'s free list.
///
/// Mirrors `ft_free_list_add` in `original_source/src/malloc.c`: new free
/// blocks go to the head, so a subsequent first-fit search finds
/// recently-freed memory before walking further into the zone.
///
/// # Safety
/// `block` must belong to `zone` and not already be linked into any free list.
pub unsafe fn free_list_add(zone: *mut ZoneHeader, block: *mut BlockHeader) {
    unsafe {
        (*block).is_free = true;
        (*block).magic = 0;
        (*block).prev_free = ptr::null_mut();
        (*block).next_free = (*zone).free_head;
        if !(*zone).free_head.is_null() {
            (*(*zone).free_head).prev_free = block;
        }
        (*zone).free_head = block;
    }
}

/// Remove `block` from `zone`'s free list (it is about to be allocated or
/// merged away). Does not touch `block.is_free`/`magic` — the caller
/// transitions those immediately afterward.
///
/// Mirrors `ft_free_list_remove` in `original_source/src/malloc.c`.
///
/// # Safety
/// `block` must currently be linked into `zone`'s free list.
pub unsafe fn free_list_remove(zone: *mut ZoneHeader, block: *mut BlockHeader) {
    unsafe {
        let prev = (*block).prev_free;
        let next = (*block).next_free;
        if !prev.is_null() {
            (*prev).next_free = next;
        } else {
            (*zone).free_head = next;
        }
        if !next.is_null() {
            (*next).prev_free = prev;
        }
        (*block).prev_free = ptr::null_mut();
        (*block).next_free = ptr::null_mut();
    }
}
