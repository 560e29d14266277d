//! Internal error types for the zone/block machinery.
//!
//! These never reach the public allocate/release/resize façade directly —
//! per SPEC_FULL.md §7 that boundary only ever communicates failure through
//! its return value (null). They exist so the layers below the façade can
//! tell each other *why* something failed, which the façade then collapses
//! into "return null" and a best-effort `log::warn!`/`log::debug!` line.

use core::fmt;

/// Failure modes internal to zone creation and teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneError {
    /// The platform layer's `mmap` call failed (out of memory, or the
    /// process has exhausted its mapping count).
    MapFailed,
    /// The computed zone size overflowed `usize` before it could be
    /// rounded up to a page multiple.
    SizeOverflow,
}

impl fmt::Display for ZoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MapFailed => write!(f, "mmap failed to back a new zone"),
            Self::SizeOverflow => write!(f, "zone size computation overflowed"),
        }
    }
}

/// Failure modes internal to the snapshot logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerError {
    /// The log file could not be opened (permissions, bad path, disk full).
    OpenFailed,
    /// A write to the already-open log file failed partway through.
    WriteFailed,
}

impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed => write!(f, "could not open the snapshot log file"),
            Self::WriteFailed => write!(f, "write to the snapshot log file failed"),
        }
    }
}
