//! Hook for serializing buffer access between a producer and a consumer
//! running in contexts that can preempt each other (for example an
//! interrupt handler and a main loop).
//!
//! The buffer has no locking of its own. A [`CriticalSection`] says how to
//! enter and leave an exclusive region; [`Guarded`] runs every access to
//! its ring inside one.

use std::cell::RefCell;

use crate::circular_buffer::RingBuffer;

pub trait CriticalSection {
    fn enter<R>(&self, f: impl FnOnce() -> R) -> R;
}

/// For a buffer that only one context ever touches.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGuard;

impl CriticalSection for NoGuard {
    fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        f()
    }
}

/// Runs `acquire` before and `release` after each access, e.g. masking and
/// unmasking an interrupt line. `release` also runs if the access panics.
pub struct FnGuard<A, B> {
    acquire: A,
    release: B,
}

impl<A: Fn(), B: Fn()> FnGuard<A, B> {
    pub fn new(acquire: A, release: B) -> Self {
        Self { acquire, release }
    }
}

struct Release<'a, B: Fn()>(&'a B);

impl<B: Fn()> Drop for Release<'_, B> {
    fn drop(&mut self) {
        (self.0)();
    }
}

impl<A: Fn(), B: Fn()> CriticalSection for FnGuard<A, B> {
    fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        (self.acquire)();
        let _release = Release(&self.release);
        f()
    }
}

/// A ring buffer whose accesses all go through a critical section.
///
/// Calling `with` again from inside the closure panics.
pub struct Guarded<S = NoGuard> {
    section: S,
    ring: RefCell<RingBuffer>,
}

impl<S: CriticalSection> Guarded<S> {
    pub fn new(ring: RingBuffer, section: S) -> Self {
        Self {
            section,
            ring: RefCell::new(ring),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut RingBuffer) -> R) -> R {
        self.section.enter(|| f(&mut self.ring.borrow_mut()))
    }

    /// Producer-side shorthand for a single guarded write.
    pub fn write(&self, byte: u8) {
        self.with(|ring| ring.write(byte));
    }

    pub fn read(&self) -> Option<u8> {
        self.with(|ring| ring.read())
    }

    pub fn into_inner(self) -> RingBuffer {
        self.ring.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_no_guard_passes_through() {
        let guarded = Guarded::new(RingBuffer::new(8).unwrap(), NoGuard);
        guarded.write(b'a');
        assert_eq!(guarded.read(), Some(b'a'));
        assert_eq!(guarded.read(), None);
    }

    #[test]
    fn test_fn_guard_brackets_each_access() {
        let events = RefCell::new(Vec::new());
        let guard = FnGuard::new(
            || events.borrow_mut().push("acquire"),
            || events.borrow_mut().push("release"),
        );
        let guarded = Guarded::new(RingBuffer::new(8).unwrap(), guard);

        guarded.with(|ring| {
            ring.extend(b"OK\r\n");
        });
        let found = guarded.with(|ring| ring.consuming_find(b"OK"));
        assert!(found);

        assert_eq!(
            *events.borrow(),
            vec!["acquire", "release", "acquire", "release"]
        );
    }

    #[test]
    fn test_release_runs_on_panic() {
        let depth = Cell::new(0);
        let guard = FnGuard::new(|| depth.set(depth.get() + 1), || depth.set(depth.get() - 1));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            guard.enter(|| panic!("inside section"))
        }));
        assert!(result.is_err());
        assert_eq!(depth.get(), 0);
    }

    #[test]
    fn test_into_inner_keeps_contents() {
        let guarded = Guarded::new(RingBuffer::new(8).unwrap(), NoGuard);
        guarded.with(|ring| ring.extend(b"xyz"));
        let mut ring = guarded.into_inner();
        assert_eq!(ring.read(), Some(b'x'));
        assert_eq!(ring.len(), 2);
    }
}
