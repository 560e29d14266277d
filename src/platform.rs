//! The platform layer: page size discovery and page-aligned anonymous
//! mappings, obtained directly from the host OS via `libc`.
//!
//! SPEC_FULL.md treats this as an environmental capability for the
//! distilled core, but a hosted crate has to get it from somewhere — grounded
//! in `other_examples/4f58d2d1_jgespiga-memalloc__src-mmap.rs.rs`, which is
//! the closest prior art in the retrieval pack for a userspace allocator
//! backed directly by `mmap`/`sysconf`. None of the five example kernels
//! reach for `libc` here because each of them *is* the platform.

use core::ffi::c_void;
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::align::align_up;

/// 0 is not a valid page size; used as the "not yet queried" sentinel.
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// The host's page size, queried once via `sysconf(_SC_PAGESIZE)` and cached
/// thereafter (it cannot change for the lifetime of a process). Falls back to
/// 4096 if the syscall reports something nonsensical.
#[inline]
pub fn page_size() -> usize {
    let cached = PAGE_SIZE.load(Ordering::Relaxed);
    if cached != 0 {
        return cached;
    }
    let queried = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    let resolved = if queried > 0 { queried as usize } else { 4096 };
    PAGE_SIZE.store(resolved, Ordering::Relaxed);
    resolved
}

/// Round `bytes` up to a whole number of pages.
#[inline]
pub fn round_up_to_pages(bytes: usize) -> usize {
    align_up(bytes, page_size())
}

/// Map a fresh, zero-filled, anonymous, private, read-write region of `len`
/// bytes (already a multiple of the page size). Returns null on failure.
///
/// The kernel zero-fills anonymous mappings, so a newly mapped zone's first
/// block never needs an explicit memset.
pub fn map_pages(len: usize) -> *mut u8 {
    if len == 0 {
        return ptr::null_mut();
    }
    let addr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        ptr::null_mut()
    } else {
        addr as *mut u8
    }
}

/// Unmap a region previously returned by [`map_pages`]. `len` must match the
/// length originally mapped.
pub fn unmap_pages(ptr: *mut u8, len: usize) {
    if ptr.is_null() || len == 0 {
        return;
    }
    unsafe {
        libc::munmap(ptr as *mut c_void, len);
    }
}

/// Copy `n` bytes from `src` to `dst`. The two ranges must not overlap —
/// callers only ever use this to move user bytes between two distinct
/// allocator-owned blocks (resize's relocate path).
///
/// Mirrors `ft_memcpy` in `original_source/src/utils.c`.
#[inline]
pub unsafe fn copy_bytes(dst: *mut u8, src: *const u8, n: usize) {
    if n == 0 {
        return;
    }
    unsafe {
        ptr::copy_nonoverlapping(src, dst, n);
    }
}
