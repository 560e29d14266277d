//! Size classification and the arithmetic that turns a user request size
//! into a zone class and a total block size.
//!
//! Constants match `original_source/src/utils.c` (`ft_calculate_zone_size`,
//! `ft_calculate_alloc_size`) and SPEC_FULL.md §3: at least ~100 allocations
//! of the class maximum fit in one shared zone.

use core::mem;

use crate::align::align_up;
use crate::block::BlockHeader;
use crate::platform::page_size;

/// Alignment granule: every user-visible data pointer satisfies
/// `ptr mod ALIGN == 0`.
pub const ALIGN: usize = 16;

/// Largest user size routed to the TINY class.
pub const TINY_MAX: usize = 128;
/// Largest user size routed to the SMALL class (anything above is LARGE).
pub const SMALL_MAX: usize = 4096;

/// Pages backing a single TINY zone.
pub const TINY_ZONE_PAGES: usize = 16;
/// Pages backing a single SMALL zone.
pub const SMALL_ZONE_PAGES: usize = 64;

/// One of the three size classes a user request routes into.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Tiny = 0,
    Small = 1,
    Large = 2,
}

impl SizeClass {
    pub fn name(self) -> &'static str {
        match self {
            SizeClass::Tiny => "TINY",
            SizeClass::Small => "SMALL",
            SizeClass::Large => "LARGE",
        }
    }
}

/// Classify a user request size into its size class.
#[inline]
pub fn classify(user_size: usize) -> SizeClass {
    if user_size <= TINY_MAX {
        SizeClass::Tiny
    } else if user_size <= SMALL_MAX {
        SizeClass::Small
    } else {
        SizeClass::Large
    }
}

/// Total bytes a block must occupy (header included) to satisfy a user
/// request of `user_size` bytes, aligned up to [`ALIGN`].
#[inline]
pub fn block_total_size(user_size: usize) -> usize {
    let header = mem::size_of::<BlockHeader>();
    align_up(header.saturating_add(user_size), ALIGN)
}

/// Bytes a fresh zone of `class` must map to host at least one block of
/// `min_block_total` bytes. TINY/SMALL zones are a fixed page count;
/// LARGE zones are sized exactly to the one block they will ever hold.
pub fn zone_size_for(class: SizeClass, min_block_total: usize) -> usize {
    let ps = page_size();
    match class {
        SizeClass::Tiny => TINY_ZONE_PAGES * ps,
        SizeClass::Small => SMALL_ZONE_PAGES * ps,
        SizeClass::Large => {
            let header = mem::size_of::<crate::zone::ZoneHeader>();
            align_up(header.saturating_add(min_block_total), ps)
        }
    }
}
