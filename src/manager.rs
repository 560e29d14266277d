//! The process-wide zone manager: one address-ordered list of zones per
//! size class, and the first-fit search across a class's zones and their
//! free lists.
//!
//! Grounded in `mm/src/kernel_heap.rs`'s `KernelHeap` (which keeps exactly
//! this shape of per-class zone lists behind a single lock), generalized
//! from two classes (slab/large) to three (TINY/SMALL/LARGE) per
//! SPEC_FULL.md §3.

use core::ptr;

use crate::block::BlockHeader;
use crate::sizing::SizeClass;
use crate::zone::{self, ZoneHeader};

/// Holds the three class lists. Default-constructed all-zero, which is
/// already a fully valid "no zones yet" state — there is no separate init
/// step, unlike the teacher's explicit `init_kernel_heap()` call.
pub struct ZoneManager {
    tiny: *mut ZoneHeader,
    small: *mut ZoneHeader,
    large: *mut ZoneHeader,
}

// Every field is a raw pointer into `mmap`'d memory owned by this process;
// access is always mediated by `Lock<ZoneManager>` in `alloc.rs`.
unsafe impl Send for ZoneManager {}

impl ZoneManager {
    pub const fn new() -> Self {
        ZoneManager {
            tiny: ptr::null_mut(),
            small: ptr::null_mut(),
            large: ptr::null_mut(),
        }
    }

    fn head(&self, class: SizeClass) -> *mut ZoneHeader {
        match class {
            SizeClass::Tiny => self.tiny,
            SizeClass::Small => self.small,
            SizeClass::Large => self.large,
        }
    }

    fn set_head(&mut self, class: SizeClass, head: *mut ZoneHeader) {
        match class {
            SizeClass::Tiny => self.tiny = head,
            SizeClass::Small => self.small = head,
            SizeClass::Large => self.large = head,
        }
    }

    /// Splice a freshly created zone onto the front of its class's list.
    pub fn link_zone(&mut self, class: SizeClass, zone: *mut ZoneHeader) {
        let old_head = self.head(class);
        unsafe {
            (*zone).prev = ptr::null_mut();
            (*zone).next = old_head;
            if !old_head.is_null() {
                (*old_head).prev = zone;
            }
        }
        self.set_head(class, zone);
    }

    /// Remove a zone from its class's list (it is about to be unmapped).
    pub fn unlink_zone(&mut self, class: SizeClass, zone: *mut ZoneHeader) {
        unsafe {
            let prev = (*zone).prev;
            let next = (*zone).next;
            if !prev.is_null() {
                (*prev).next = next;
            } else {
                self.set_head(class, next);
            }
            if !next.is_null() {
                (*next).prev = prev;
            }
        }
    }

    /// First-fit search: walk `class`'s zones in list order, and within each
    /// zone its free list in list order (most-recently-freed first), for
    /// the first block whose size is at least `needed` bytes.
    ///
    /// Returns the owning zone and the block, with the block already
    /// unlinked from that zone's free list. The caller still needs to split
    /// it and mark it allocated.
    pub fn find_free_block(
        &self,
        class: SizeClass,
        needed: usize,
    ) -> Option<(*mut ZoneHeader, *mut BlockHeader)> {
        let mut zone = self.head(class);
        while !zone.is_null() {
            let mut candidate = unsafe { (*zone).free_head };
            while !candidate.is_null() {
                if unsafe { (*candidate).size } >= needed {
                    unsafe { zone::free_list_remove(zone, candidate) };
                    return Some((zone, candidate));
                }
                candidate = unsafe { (*candidate).next_free };
            }
            zone = unsafe { (*zone).next };
        }
        None
    }

    /// Walk every zone of every class, invoking `f` with each zone's class
    /// and header. Used by the logger and text dumper; never mutates.
    pub fn for_each_zone<F: FnMut(SizeClass, *const ZoneHeader)>(&self, mut f: F) {
        for class in [SizeClass::Tiny, SizeClass::Small, SizeClass::Large] {
            let mut zone = self.head(class);
            while !zone.is_null() {
                f(class, zone);
                zone = unsafe { (*zone).next };
            }
        }
    }

    /// Recover the block header immediately to the right of `block` within
    /// its zone's address-ordered list, if any (used by resize's in-place
    /// grow and by release's coalescing).
    pub fn right_neighbor(block: *mut BlockHeader) -> *mut BlockHeader {
        unsafe { (*block).next }
    }

    pub fn left_neighbor(block: *mut BlockHeader) -> *mut BlockHeader {
        unsafe { (*block).prev }
    }
}

impl Default for ZoneManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizing::TINY_MAX;

    #[test]
    fn link_and_unlink_zone_round_trips_to_empty() {
        let mut manager = ZoneManager::new();
        let min_total = crate::block::BLOCK_HEADER_SIZE + TINY_MAX;
        let zone = zone::create(SizeClass::Tiny, min_total).unwrap();
        manager.link_zone(SizeClass::Tiny, zone);
        assert_eq!(manager.head(SizeClass::Tiny), zone);
        manager.unlink_zone(SizeClass::Tiny, zone);
        assert!(manager.head(SizeClass::Tiny).is_null());
        unsafe { zone::destroy(zone) };
    }

    #[test]
    fn find_free_block_returns_none_with_no_zones() {
        let manager = ZoneManager::new();
        assert!(manager.find_free_block(SizeClass::Tiny, 64).is_none());
    }

    #[test]
    fn find_free_block_locates_and_unlinks_a_fitting_block() {
        let mut manager = ZoneManager::new();
        let min_total = crate::block::BLOCK_HEADER_SIZE + TINY_MAX;
        let zone = zone::create(SizeClass::Tiny, min_total * 2).unwrap();
        manager.link_zone(SizeClass::Tiny, zone);

        let (found_zone, block) = manager.find_free_block(SizeClass::Tiny, 32).unwrap();
        assert_eq!(found_zone, zone);
        unsafe {
            assert!((*block).next_free.is_null());
            assert!((*block).prev_free.is_null());
            assert!((*zone).free_head != block);
            zone::destroy(zone);
        }
    }
}
