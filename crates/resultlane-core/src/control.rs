use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use crate::{
    access::AccessGate,
    error::{Result, ResultsError},
};

#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Advancement in `[0, 1]`, written by a worker and polled by anyone.
/// Best effort: a reset racing a worker update may be overwritten.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    bits: Arc<AtomicU32>,
}

impl Progress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, advancement: f32) {
        let advancement = if advancement.is_nan() {
            0.0
        } else {
            advancement.clamp(0.0, 1.0)
        };
        self.bits.store(advancement.to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn reset(&self) {
        self.set(0.0);
    }
}

/// What every codec call receives: a cancellation token, a progress sink and,
/// when reading from a store, the gate to poll for a pending writer.
#[derive(Debug, Clone, Default)]
pub struct Control {
    cancellation: Cancellation,
    progress: Progress,
    gate: Option<Arc<AccessGate>>,
}

impl Control {
    #[must_use]
    pub fn new(cancellation: Cancellation, progress: Progress) -> Self {
        Self {
            cancellation,
            progress,
            gate: None,
        }
    }

    #[must_use]
    pub fn with_gate(mut self, gate: Arc<AccessGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    #[must_use]
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    #[must_use]
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Called between frames. Cancellation wins over a pending writer.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(ResultsError::Aborted);
        }
        if self
            .gate
            .as_ref()
            .is_some_and(|gate| !gate.can_continue_reading())
        {
            return Err(ResultsError::DataLocked);
        }
        Ok(())
    }

    pub fn report(&self, advancement: f32) {
        self.progress.set(advancement);
    }

    /// Reports `done / total` scaled into `[from, to]`.
    #[allow(clippy::cast_precision_loss)]
    pub fn report_fraction(&self, done: usize, total: usize, from: f32, to: f32) {
        let ratio = if total == 0 {
            1.0
        } else {
            done as f32 / total as f32
        };
        self.report(from + (to - from) * ratio);
    }
}
