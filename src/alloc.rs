//! The allocation façade: `allocate`/`release`/`resize` over the zone
//! manager. These are the *unwrapped* primitives — the logger calls them
//! directly, and `lib.rs`'s public façade is this plus an optional
//! `logger::maybe_snapshot()` call afterward (SPEC_FULL.md §4.7).
//!
//! Grounded in `original_source/src/malloc.c`'s `ft_malloc`/`ft_free`/
//! `ft_realloc`, restructured around `mm/src/kernel_heap.rs`'s lock-once,
//! search-then-claim shape.

use crate::block::{self, BlockHeader, ALLOC_MAGIC};
use crate::lock::Lock;
use crate::manager::ZoneManager;
use crate::platform::copy_bytes;
use crate::sizing::{block_total_size, classify, SizeClass};
use crate::zone::{self, ZoneHeader};

static MANAGER: Lock<ZoneManager> = Lock::new(ZoneManager::new());

/// Mark a freshly claimed block allocated and account for it in its zone.
fn commit_allocation(zone: *mut ZoneHeader, block: *mut BlockHeader, user_size: usize) {
    unsafe {
        (*block).is_free = false;
        (*block).magic = ALLOC_MAGIC;
        (*block).prev_free = core::ptr::null_mut();
        (*block).next_free = core::ptr::null_mut();
        #[cfg(feature = "verbose")]
        {
            (*block).user_size = user_size;
        }
        #[cfg(not(feature = "verbose"))]
        {
            let _ = user_size;
        }
        (*zone).block_count += 1;
        (*zone).used_size += accounted_size(block);
    }
}

/// The number of bytes a block contributes to its zone's `used_size`:
/// exact user size under `verbose`, block total otherwise. See
/// SPEC_FULL.md §9 for why these two modes diverge.
#[inline]
fn accounted_size(block: *mut BlockHeader) -> usize {
    #[cfg(feature = "verbose")]
    unsafe {
        (*block).user_size
    }
    #[cfg(not(feature = "verbose"))]
    unsafe {
        (*block).size
    }
}

/// Claim `block` from `zone` for a `needed`-byte allocation, splitting off a
/// free remainder when there's enough slack to make it worthwhile.
fn claim(zone: *mut ZoneHeader, block: *mut BlockHeader, needed: usize, user_size: usize) -> *mut u8 {
    unsafe {
        if let Some(remainder) = block::split(block, needed) {
            zone::free_list_add(zone, remainder);
        }
        commit_allocation(zone, block, user_size);
        BlockHeader::data_ptr(block)
    }
}

/// Allocate `user_size` bytes, returning a pointer to the first byte of
/// usable memory. A request of zero bytes returns null, matching the
/// original project's behavior rather than libc's "valid, zero-size
/// pointer" convention — see SPEC_FULL.md §4.1.
pub fn allocate(user_size: usize) -> *mut u8 {
    if user_size == 0 {
        return core::ptr::null_mut();
    }

    let class = classify(user_size);
    let needed = block_total_size(user_size);

    let mut manager = MANAGER.lock();

    if class == SizeClass::Large {
        return allocate_large(&mut manager, needed, user_size);
    }

    if let Some((zone, block)) = manager.find_free_block(class, needed) {
        return claim(zone, block, needed, user_size);
    }

    let zone = match zone::create(class, needed) {
        Ok(z) => z,
        Err(_) => {
            log::warn!("zalloc: failed to map a new {} zone", class.name());
            return core::ptr::null_mut();
        }
    };
    manager.link_zone(class, zone);
    let block = unsafe { (*zone).first_block };
    claim(zone, block, needed, user_size)
}

fn allocate_large(manager: &mut ZoneManager, needed: usize, user_size: usize) -> *mut u8 {
    let zone = match zone::create(SizeClass::Large, needed) {
        Ok(z) => z,
        Err(_) => {
            log::warn!("zalloc: failed to map a new LARGE zone");
            return core::ptr::null_mut();
        }
    };
    manager.link_zone(SizeClass::Large, zone);
    let block = unsafe { (*zone).first_block };
    claim(zone, block, needed, user_size)
}

/// Release a previously allocated pointer. Null, or a pointer that fails
/// the magic-word check, is silently ignored rather than treated as an
/// error — see SPEC_FULL.md §4.2.
///
/// # Safety
/// If non-null, `ptr` must either be a pointer this allocator previously
/// returned and not yet released, or garbage the caller accepts the risk
/// of dereferencing (same contract as libc `free`).
pub unsafe fn release(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    let header = BlockHeader::from_data_ptr(ptr);
    if !unsafe { block::is_valid(header) } {
        log::debug!("zalloc: release() called with an invalid or foreign pointer");
        return;
    }

    let mut manager = MANAGER.lock();
    unsafe { release_locked(&mut manager, header) };
}

/// The guts of `release`, reusable by `resize`'s relocate path once it
/// already holds the lock.
unsafe fn release_locked(manager: &mut ZoneManager, header: *mut BlockHeader) {
    unsafe {
        let zone = (*header).zone;
        let class = (*zone).class;

        (*zone).used_size -= accounted_size(header);
        (*zone).block_count -= 1;
        zone::free_list_add(zone, header);

        let mut merged = header;
        let right = ZoneManager::right_neighbor(merged);
        if !right.is_null() && block::can_merge(merged, right) {
            zone::free_list_remove(zone, right);
            block::merge(merged, right);
        }
        let left = ZoneManager::left_neighbor(merged);
        if !left.is_null() && block::can_merge(left, merged) {
            zone::free_list_remove(zone, left);
            zone::free_list_remove(zone, merged);
            block::merge(left, merged);
            zone::free_list_add(zone, left);
            merged = left;
        }
        let _ = merged;

        if class == SizeClass::Large && (*zone).block_count == 0 {
            manager.unlink_zone(class, zone);
            zone::destroy(zone);
        }
    }
}

/// Resize a previously allocated pointer to `user_size` bytes, per the
/// dispatch table in SPEC_FULL.md §4.4:
///
/// - null pointer: behaves like [`allocate`].
/// - zero size on a valid pointer: releases it and returns null.
/// - invalid or foreign pointer: returns null, leaves memory untouched.
/// - new size already fits in the current block: returns the same pointer.
/// - new size fits after merging the immediate right neighbor: grows in
///   place, re-splitting any leftover tail.
/// - otherwise: allocates fresh, copies the smaller of the two sizes, and
///   releases the original.
///
/// # Safety
/// Same contract as [`release`] when `ptr` is non-null.
pub unsafe fn resize(ptr: *mut u8, user_size: usize) -> *mut u8 {
    if ptr.is_null() {
        return allocate(user_size);
    }

    let header = BlockHeader::from_data_ptr(ptr);
    if !unsafe { block::is_valid(header) } {
        log::debug!("zalloc: resize() called with an invalid or foreign pointer");
        return core::ptr::null_mut();
    }

    if user_size == 0 {
        unsafe { release(ptr) };
        return core::ptr::null_mut();
    }

    let needed = block_total_size(user_size);
    let mut manager = MANAGER.lock();

    unsafe {
        let zone = (*header).zone;

        if (*header).size >= needed {
            shrink_or_keep(zone, header, needed, user_size);
            return ptr;
        }

        let right = ZoneManager::right_neighbor(header);
        if block::right_neighbor_is_free(header, right) && (*header).size + (*right).size >= needed {
            (*zone).used_size -= accounted_size(header);
            zone::free_list_remove(zone, right);
            block::merge(header, right);
            if let Some(remainder) = block::split(header, needed) {
                zone::free_list_add(zone, remainder);
            }
            #[cfg(feature = "verbose")]
            {
                (*header).user_size = user_size;
            }
            (*zone).used_size += accounted_size(header);
            return ptr;
        }

        let fresh = allocate_unlocked(&mut manager, user_size);
        if fresh.is_null() {
            return core::ptr::null_mut();
        }
        let copy_len = core::cmp::min(payload_len(header), user_size);
        copy_bytes(fresh, ptr, copy_len);
        release_locked(&mut manager, header);
        fresh
    }
}

/// The data payload a block can currently hold (its total size minus the
/// header), used to bound the copy on a relocating resize.
fn payload_len(header: *mut BlockHeader) -> usize {
    unsafe { (*header).size - block::BLOCK_HEADER_SIZE }
}

/// `user_size` already fits in `header` unchanged: just update accounting
/// (verbose mode tracks the exact new user size; non-verbose mode's
/// accounting is already correct since the block total didn't change).
fn shrink_or_keep(zone: *mut ZoneHeader, header: *mut BlockHeader, _needed: usize, user_size: usize) {
    #[cfg(feature = "verbose")]
    unsafe {
        (*zone).used_size -= (*header).user_size;
        (*header).user_size = user_size;
        (*zone).used_size += user_size;
    }
    #[cfg(not(feature = "verbose"))]
    {
        let _ = (zone, header, user_size);
    }
}

/// `allocate`, but reusing an already-held lock (resize's relocate path).
fn allocate_unlocked(manager: &mut ZoneManager, user_size: usize) -> *mut u8 {
    let class = classify(user_size);
    let needed = block_total_size(user_size);

    if class == SizeClass::Large {
        return allocate_large(manager, needed, user_size);
    }

    if let Some((zone, block)) = manager.find_free_block(class, needed) {
        return claim(zone, block, needed, user_size);
    }

    let zone = match zone::create(class, needed) {
        Ok(z) => z,
        Err(_) => {
            log::warn!("zalloc: failed to map a new {} zone", class.name());
            return core::ptr::null_mut();
        }
    };
    manager.link_zone(class, zone);
    let block = unsafe { (*zone).first_block };
    claim(zone, block, needed, user_size)
}

/// Walk every zone of every class under the manager's lock, read-only.
/// Used by the logger and text dumper.
pub(crate) fn for_each_zone<F: FnMut(SizeClass, *const ZoneHeader)>(f: F) {
    let manager = MANAGER.lock();
    manager.for_each_zone(f);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_zero_returns_null() {
        assert!(allocate(0).is_null());
    }

    #[test]
    fn allocate_then_release_round_trips() {
        let ptr = allocate(64);
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % crate::sizing::ALIGN, 0);
        unsafe {
            *ptr = 0x42;
            release(ptr);
        }
    }

    #[test]
    fn release_of_null_is_a_no_op() {
        unsafe { release(core::ptr::null_mut()) };
    }

    #[test]
    fn release_of_foreign_pointer_is_ignored() {
        let mut stack_value = 0_u8;
        unsafe { release(&mut stack_value as *mut u8) };
    }

    #[test]
    fn resize_null_behaves_like_allocate() {
        let ptr = unsafe { resize(core::ptr::null_mut(), 32) };
        assert!(!ptr.is_null());
        unsafe { release(ptr) };
    }

    #[test]
    fn resize_to_zero_releases_and_returns_null() {
        let ptr = allocate(32);
        let result = unsafe { resize(ptr, 0) };
        assert!(result.is_null());
    }

    #[test]
    fn resize_shrink_keeps_the_same_pointer() {
        let ptr = allocate(100);
        let shrunk = unsafe { resize(ptr, 10) };
        assert_eq!(shrunk, ptr);
        unsafe { release(shrunk) };
    }

    #[test]
    fn resize_grow_within_tiny_preserves_contents() {
        let ptr = allocate(16);
        unsafe {
            *ptr = 0xAB;
            *ptr.add(1) = 0xCD;
        }
        let grown = unsafe { resize(ptr, 100) };
        assert!(!grown.is_null());
        unsafe {
            assert_eq!(*grown, 0xAB);
            assert_eq!(*grown.add(1), 0xCD);
            release(grown);
        }
    }

    // `ptr` is the sole allocation in a freshly mapped TINY zone, so its
    // right neighbor is one large free block — growing into it must take
    // the in-place merge path, not silently fall back to relocate-and-copy.
    #[test]
    fn resize_grow_into_free_right_neighbor_keeps_the_same_pointer() {
        let ptr = allocate(16);
        let grown = unsafe { resize(ptr, 100) };
        assert_eq!(grown, ptr);
        unsafe { release(grown) };
    }

    #[test]
    fn large_allocation_round_trips() {
        let ptr = allocate(1_000_000);
        assert!(!ptr.is_null());
        unsafe {
            *ptr = 1;
            *ptr.add(999_999) = 2;
            release(ptr);
        }
    }

    #[test]
    fn two_adjacent_tiny_frees_coalesce() {
        let a = allocate(32);
        let b = allocate(32);
        assert!(!a.is_null() && !b.is_null());
        unsafe {
            release(a);
            release(b);
        }
        // A third allocation the size of the coalesced pair should succeed
        // without needing a new zone, proving the merge actually happened.
        let c = allocate(48);
        assert!(!c.is_null());
        unsafe { release(c) };
    }
}
