//! A small demo binary exercising the allocator and printing a text dump
//! of its final state. Not a port of the original project's test drivers
//! (those are out of scope per SPEC_FULL.md §1) — just a way to see
//! [`zalloc::dump_text_stdout`] produce real output without writing a
//! separate test harness.

use std::env;

fn main() {
    env_logger::init();

    let mut live = Vec::new();
    for size in [16_usize, 48, 96, 512, 2048, 1_000_000] {
        let ptr = zalloc::allocate(size);
        if ptr.is_null() {
            eprintln!("allocation of {size} bytes failed");
            continue;
        }
        live.push(ptr);
    }

    if let Some(first) = live.first().copied() {
        let grown = unsafe { zalloc::resize(first, 4096) };
        if !grown.is_null() {
            live[0] = grown;
        }
    }

    if env::args().nth(1).as_deref() == Some("--free-half") {
        for ptr in live.drain(..live.len() / 2) {
            unsafe { zalloc::release(ptr) };
        }
    }

    zalloc::dump_text_stdout().expect("writing to stdout should not fail");

    for ptr in live {
        unsafe { zalloc::release(ptr) };
    }
}
