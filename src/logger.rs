//! The snapshot logger: an append-only, newline-delimited JSON record of
//! the zone manager's live state, written without itself ever touching the
//! wrapped public façade (see SPEC_FULL.md §4.5).
//!
//! Grounded in `original_source/src/mem_logger.c` for the record shape and
//! the pid+time default filename; the re-entrancy flag mirrors the
//! "don't recurse into logging from inside logging" discipline every
//! teacher repo applies to its own `klog!` call sites around allocation.

use std::fs::{File, OpenOptions};
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::alloc::for_each_zone;
use crate::block::BlockHeader;
use crate::error::LoggerError;
use crate::sizing::SizeClass;
use crate::zone::ZoneHeader;

/// Set for the duration of a snapshot write. Any allocation performed while
/// this is set (there are none on the hot path today, but the guard exists
/// independent of that) must not itself trigger a nested snapshot.
static INSIDE_DUMP: AtomicBool = AtomicBool::new(false);

/// Monotonically increasing snapshot id, assigned at the start of each
/// successful snapshot.
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

static FIRST_SNAPSHOT: OnceLock<Instant> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_FILE: OnceLock<Mutex<Option<File>>> = OnceLock::new();

fn resolve_log_path() -> &'static PathBuf {
    LOG_PATH.get_or_init(|| {
        if let Ok(from_env) = std::env::var("MALLOC_LOG") {
            return PathBuf::from(from_env);
        }
        let pid = std::process::id();
        let unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        PathBuf::from(format!("malloc_log_{pid}_{unix_secs}.jsonl"))
    })
}

fn open_log_file() -> Result<(), LoggerError> {
    let cell = LOG_FILE.get_or_init(|| Mutex::new(None));
    let mut guard = cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if guard.is_some() {
        return Ok(());
    }
    let path = resolve_log_path();
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            *guard = Some(file);
            Ok(())
        }
        Err(_) => Err(LoggerError::OpenFailed),
    }
}

fn elapsed_micros() -> u128 {
    let first = FIRST_SNAPSHOT.get_or_init(Instant::now);
    first.elapsed().as_micros()
}

/// Bytes this block contributes to a snapshot/dump: exact user size in
/// verbose builds, block total otherwise. Mirrors `accounted_size` in
/// `alloc.rs`, duplicated here so the logger never has to call back into
/// the allocation façade to ask.
fn reported_size(block: *const BlockHeader) -> usize {
    #[cfg(feature = "verbose")]
    unsafe {
        (*block).user_size
    }
    #[cfg(not(feature = "verbose"))]
    unsafe {
        (*block).size
    }
}

/// Write one zone's record, and its live allocations, straight to `file`.
/// Mirrors `dump.rs`'s `write_zone`: direct `write!` calls into the open
/// file handle, never an intermediate `String`, so this runs safely from
/// inside the zone manager's lock even with a `#[global_allocator]` whose
/// `alloc` is the `logging`-wrapped façade — nothing here can recurse back
/// into `alloc::allocate`.
fn write_zone_record(
    file: &mut File,
    class: SizeClass,
    zone: *const ZoneHeader,
    first_zone: &mut bool,
) -> io::Result<()> {
    if !*first_zone {
        write!(file, ",")?;
    }
    *first_zone = false;

    unsafe {
        write!(
            file,
            r#"{{"class":"{}","address":"0x{:x}","total_size":{},"used_size":{},"block_count":{},"allocations":["#,
            class.name(),
            zone as usize,
            (*zone).total_size,
            (*zone).used_size,
            (*zone).block_count,
        )?;

        let mut block = (*zone).first_block;
        let mut first_alloc = true;
        while !block.is_null() {
            if !(*block).is_free {
                if !first_alloc {
                    write!(file, ",")?;
                }
                first_alloc = false;
                let data = BlockHeader::data_ptr(block);
                write!(
                    file,
                    r#"{{"address":"0x{:x}","size":{}}}"#,
                    data as usize,
                    reported_size(block),
                )?;
            }
            block = (*block).next;
        }
        write!(file, "]}}")?;
    }
    Ok(())
}

/// Write one snapshot record to `file`: the `{id, micros, zones}` envelope
/// around one [`write_zone_record`] call per zone. Errors partway through a
/// zone are swallowed and the walk continues, same as `dump.rs`'s text
/// dumper — the final `writeln!`'s result is what's actually surfaced.
fn write_snapshot_record(file: &mut File, id: u64, micros: u128) -> io::Result<()> {
    write!(file, r#"{{"id":{id},"micros":{micros},"zones":["#)?;

    let mut first_zone = true;
    for_each_zone(|class, zone: *const ZoneHeader| {
        let _ = write_zone_record(file, class, zone, &mut first_zone);
    });

    writeln!(file, "]}}")
}

/// Unconditionally write one snapshot record to the log file.
///
/// `for_each_zone` holds the zone manager's lock for the duration of the
/// walk; every write here goes straight to the already-open `File` handle
/// with no heap allocation in between, so this cannot re-enter
/// `alloc::allocate` (e.g. via a `#[global_allocator]` install) and
/// deadlock on — or alias — that same lock.
pub fn snapshot() {
    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    let micros = elapsed_micros();

    let result = (|| -> Result<(), LoggerError> {
        open_log_file()?;
        let cell = LOG_FILE.get().expect("just opened above");
        let mut guard = cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let file = guard.as_mut().expect("just opened above");
        write_snapshot_record(file, id, micros).map_err(|_| LoggerError::WriteFailed)
    })();

    if let Err(err) = result {
        log::warn!("zalloc: snapshot logger failed: {err}");
    }
}

/// The re-entrancy-guarded version the wrapped public façade calls after
/// every mutating entry point when the `logging` feature is enabled.
/// Skips the snapshot entirely if already inside one.
pub(crate) fn maybe_snapshot() {
    if INSIDE_DUMP.swap(true, Ordering::SeqCst) {
        // Already inside a dump on this thread's call stack (or another
        // thread is mid-dump and we're racing it) — skip rather than nest.
        return;
    }
    snapshot();
    INSIDE_DUMP.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_record_is_well_formed_with_no_zones() {
        let path = std::env::temp_dir().join(format!(
            "zalloc_test_logger_{}_empty.jsonl",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        write_snapshot_record(&mut file, 0, 0).unwrap();
        drop(file);

        let contents = std::fs::read_to_string(&path).unwrap();
        let line = contents.lines().next().unwrap();
        assert!(line.starts_with(r#"{"id":0,"micros":0,"zones":["#));
        assert!(line.ends_with("]}"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn maybe_snapshot_does_not_panic_when_called_back_to_back() {
        std::env::set_var("MALLOC_LOG", std::env::temp_dir().join("zalloc_test_logger.jsonl"));
        maybe_snapshot();
        maybe_snapshot();
    }
}
