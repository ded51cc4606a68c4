use std::{ops::Deref, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::{
    access::{AccessGate, ReadAccess},
    error::{Result, ResultsError},
    model::Results,
};

/// The results of one track, shared between a single producer and any number
/// of readers.
#[derive(Debug, Default)]
pub struct ResultsStore {
    gate: Arc<AccessGate>,
    slot: Mutex<Results>,
}

impl ResultsStore {
    #[must_use]
    pub fn new(results: Results) -> Self {
        Self {
            gate: Arc::new(AccessGate::new()),
            slot: Mutex::new(results),
        }
    }

    #[must_use]
    pub fn gate(&self) -> &Arc<AccessGate> {
        &self.gate
    }

    /// Snapshot of the current results, or `DataLocked` when a write is
    /// pending. The snapshot keeps reading access until dropped.
    pub fn try_read(&self) -> Result<ResultsSnapshot> {
        let access = self.gate.try_read().ok_or(ResultsError::DataLocked)?;
        let results = self.slot.lock().clone();
        Ok(ResultsSnapshot { access, results })
    }

    /// Swaps in `results` once readers have drained. Returns `false` when the
    /// new value shares the current storage and nothing changed.
    #[instrument(skip_all, fields(shape = %results.shape(), channels = results.num_channels()))]
    pub fn replace(&self, results: Results) -> bool {
        let _access = self.gate.write();
        let mut slot = self.slot.lock();
        if *slot == results {
            debug!("results unchanged");
            return false;
        }
        *slot = results;
        debug!("results replaced");
        true
    }

    /// Applies `edit` to the current results and stores what it returns. The
    /// edit runs with exclusive access.
    pub fn update(&self, edit: impl FnOnce(&Results) -> Result<Results>) -> Result<bool> {
        let _access = self.gate.write();
        let mut slot = self.slot.lock();
        let edited = edit(&*slot)?;
        if *slot == edited {
            return Ok(false);
        }
        *slot = edited;
        Ok(true)
    }
}

#[derive(Debug)]
pub struct ResultsSnapshot {
    access: ReadAccess,
    results: Results,
}

impl ResultsSnapshot {
    #[must_use]
    pub fn can_continue(&self) -> bool {
        self.access.can_continue()
    }

    #[must_use]
    pub fn access(&self) -> &ReadAccess {
        &self.access
    }

    #[must_use]
    pub fn results(&self) -> &Results {
        &self.results
    }
}

impl Deref for ResultsSnapshot {
    type Target = Results;

    fn deref(&self) -> &Self::Target {
        &self.results
    }
}
