//! Single-writer, best-effort-reader gate guarding a results slot.
//!
//! Readers never wait: they fail as soon as a writer has asked for access, and
//! long read loops poll [`AccessGate::can_continue_reading`] to bail out early.
//! The writer spins with a short backoff until every reader has left. This is
//! not a fair lock: a pending writer turns away new readers, and a reader that
//! never polls can keep the writer spinning.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use tracing::trace;

const SPIN_ROUNDS: u32 = 64;
const YIELD_ROUNDS: u32 = 256;
const SLEEP_STEP: Duration = Duration::from_micros(50);

#[derive(Debug, Default)]
pub struct AccessGate {
    readers: AtomicUsize,
    writing: AtomicBool,
}

impl AccessGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a reader unless a writer has signalled its intent. Every
    /// successful call must be paired with [`Self::release_reading_access`].
    pub fn acquire_reading_access(&self) -> bool {
        if self.writing.load(Ordering::SeqCst) {
            return false;
        }
        self.readers.fetch_add(1, Ordering::SeqCst);
        // The writer may have raised its flag between the check and the
        // increment; it is then waiting for this reader to leave.
        if self.writing.load(Ordering::SeqCst) {
            self.readers.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    pub fn release_reading_access(&self) {
        let released = self
            .readers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            });
        debug_assert!(
            released.is_ok(),
            "reading access released without a matching acquire"
        );
    }

    #[must_use]
    pub fn can_continue_reading(&self) -> bool {
        !self.writing.load(Ordering::SeqCst)
    }

    /// Raises the writer flag and spins until the last reader has left.
    pub fn acquire_writing_access(&self) {
        let already_writing = self.writing.swap(true, Ordering::SeqCst);
        debug_assert!(!already_writing, "writing access acquired twice");

        let mut rounds = 0_u32;
        while self.readers.load(Ordering::SeqCst) > 0 {
            if rounds < SPIN_ROUNDS {
                std::hint::spin_loop();
            } else if rounds < YIELD_ROUNDS {
                thread::yield_now();
            } else {
                thread::sleep(SLEEP_STEP);
            }
            rounds = rounds.saturating_add(1);
        }
        if rounds > 0 {
            trace!(rounds, "writing access granted after readers drained");
        }
    }

    pub fn release_writing_access(&self) {
        let was_writing = self.writing.swap(false, Ordering::SeqCst);
        debug_assert!(was_writing, "writing access released without a matching acquire");
    }

    #[must_use]
    pub fn reader_count(&self) -> usize {
        self.readers.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_writing_requested(&self) -> bool {
        self.writing.load(Ordering::SeqCst)
    }

    /// Guard flavour of [`Self::acquire_reading_access`].
    #[must_use]
    pub fn try_read(self: &Arc<Self>) -> Option<ReadAccess> {
        self.acquire_reading_access().then(|| ReadAccess {
            gate: Arc::clone(self),
        })
    }

    /// Guard flavour of [`Self::acquire_writing_access`].
    #[must_use]
    pub fn write(&self) -> WriteAccess<'_> {
        self.acquire_writing_access();
        WriteAccess { gate: self }
    }
}

/// Reading access released on drop. Owns its gate handle so it can travel to a
/// worker thread.
#[derive(Debug)]
pub struct ReadAccess {
    gate: Arc<AccessGate>,
}

impl ReadAccess {
    #[must_use]
    pub fn can_continue(&self) -> bool {
        self.gate.can_continue_reading()
    }

    #[must_use]
    pub fn gate(&self) -> &Arc<AccessGate> {
        &self.gate
    }
}

impl Drop for ReadAccess {
    fn drop(&mut self) {
        self.gate.release_reading_access();
    }
}

#[derive(Debug)]
pub struct WriteAccess<'a> {
    gate: &'a AccessGate,
}

impl Drop for WriteAccess<'_> {
    fn drop(&mut self) {
        self.gate.release_writing_access();
    }
}
