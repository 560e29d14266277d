//! A single `Lock<T>` type whose internals swap between a real spinlock and
//! a bare `UnsafeCell` depending on the `locking` feature, so the manager
//! above it is written once with no per-feature branching.
//!
//! Grounded in `lib/src/spinlock.rs`'s `IrqMutex`, stripped of the IRQ-disable
//! and preemption-guard machinery that only makes sense for kernel code —
//! this crate runs as an ordinary userspace process, so the `spin` crate's
//! plain ticket/test-and-set mutex (already a pinned teacher dependency) is
//! the right-sized replacement rather than reinventing one.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

/// A process-wide lock around a `T`, present or absent depending on the
/// `locking` feature.
pub struct Lock<T> {
    inner: Inner<T>,
}

#[cfg(feature = "locking")]
struct Inner<T>(spin::Mutex<T>);

#[cfg(not(feature = "locking"))]
struct Inner<T>(UnsafeCell<T>);

// Single-threaded builds (`locking` off) still need `Lock<T>` to be usable
// from a `static`. The crate's contract in that configuration is the same
// as the original project's unguarded globals: callers are responsible for
// not calling the allocator concurrently from more than one thread.
#[cfg(not(feature = "locking"))]
unsafe impl<T> Sync for Lock<T> {}

impl<T> Lock<T> {
    pub const fn new(value: T) -> Self {
        #[cfg(feature = "locking")]
        {
            Lock {
                inner: Inner(spin::Mutex::new(value)),
            }
        }
        #[cfg(not(feature = "locking"))]
        {
            Lock {
                inner: Inner(UnsafeCell::new(value)),
            }
        }
    }

    #[cfg(feature = "locking")]
    pub fn lock(&self) -> Guard<'_, T> {
        Guard(self.inner.0.lock())
    }

    #[cfg(not(feature = "locking"))]
    pub fn lock(&self) -> Guard<'_, T> {
        // Safety: single-threaded contract documented on `Lock` above.
        Guard(unsafe { &mut *self.inner.0.get() })
    }
}

#[cfg(feature = "locking")]
pub struct Guard<'a, T>(spin::MutexGuard<'a, T>);

#[cfg(not(feature = "locking"))]
pub struct Guard<'a, T>(&'a mut T);

impl<'a, T> Deref for Guard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<'a, T> DerefMut for Guard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_round_trips_a_value() {
        let lock = Lock::new(5_i32);
        {
            let mut guard = lock.lock();
            *guard += 1;
        }
        assert_eq!(*lock.lock(), 6);
    }
}
