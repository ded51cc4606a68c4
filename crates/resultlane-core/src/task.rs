//! One background job at a time: `idle -> running -> {succeeded, failed,
//! aborted} -> idle`. The outcome goes back to idle once it is collected.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use parking_lot::Mutex;
use tracing::{error, info, instrument, warn};

use crate::{
    access::AccessGate,
    control::{Cancellation, Control, Progress},
    error::{Result, ResultsError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Aborted,
}

pub struct Task<T> {
    name: &'static str,
    cancellation: Cancellation,
    progress: Progress,
    state: Arc<Mutex<TaskState>>,
    job: Mutex<Option<JoinHandle<Result<T>>>>,
}

impl<T: Send + 'static> Task<T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cancellation: Cancellation::new(),
            progress: Progress::new(),
            state: Arc::new(Mutex::new(TaskState::Idle)),
            job: Mutex::new(None),
        }
    }

    /// Runs `job` on a worker thread. A job still in flight is aborted first.
    /// Fails with `Busy` when another thread is starting this task at the
    /// same time.
    #[instrument(skip_all, fields(task = self.name))]
    pub fn start<F>(&self, gate: Option<Arc<AccessGate>>, job: F) -> Result<()>
    where
        F: FnOnce(&Control) -> Result<T> + Send + 'static,
    {
        let mut slot = self.job.try_lock().ok_or(ResultsError::Busy)?;
        if let Some(previous) = slot.take() {
            self.cancellation.cancel();
            // The previous outcome is discarded.
            let _ = previous.join();
        }
        self.cancellation.reset();
        self.progress.reset();
        *self.state.lock() = TaskState::Running;

        let mut control = Control::new(self.cancellation.clone(), self.progress.clone());
        if let Some(gate) = gate {
            control = control.with_gate(gate);
        }
        let state = Arc::clone(&self.state);
        let name = self.name;
        let handle = thread::Builder::new()
            .name(format!("resultlane-{name}"))
            .spawn(move || {
                let outcome = job(&control);
                let next = match &outcome {
                    Ok(_) => {
                        info!(task = name, "task succeeded");
                        TaskState::Succeeded
                    }
                    Err(ResultsError::Aborted) => {
                        info!(task = name, "task aborted");
                        TaskState::Aborted
                    }
                    Err(failure) => {
                        error!(task = name, error = %failure, "task failed");
                        TaskState::Failed
                    }
                };
                *state.lock() = next;
                outcome
            })
            .map_err(|error| {
                *self.state.lock() = TaskState::Idle;
                ResultsError::WorkerUnavailable(error.to_string())
            })?;
        *slot = Some(handle);
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }

    #[must_use]
    pub fn progress(&self) -> f32 {
        self.progress.get()
    }

    #[must_use]
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// Blocks until the job ends and returns its outcome. `None` when no job
    /// was started since the last collected outcome.
    pub fn wait(&self) -> Option<Result<T>> {
        let handle = self.job.lock().take()?;
        let outcome = handle.join().unwrap_or_else(|_| {
            warn!(task = self.name, "task worker panicked");
            Err(ResultsError::WorkerPanicked)
        });
        *self.state.lock() = TaskState::Idle;
        Some(outcome)
    }

    /// The outcome of a finished job, without blocking.
    pub fn try_take(&self) -> Option<Result<T>> {
        if self.job.lock().as_ref().is_some_and(|handle| !handle.is_finished()) {
            return None;
        }
        self.wait()
    }

    /// Cancels the job in flight and waits for it to stop; its outcome is
    /// dropped.
    pub fn abort(&self) {
        self.cancellation.cancel();
        if self.wait().is_some() {
            info!(task = self.name, "task stopped");
        }
        self.cancellation.reset();
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        self.cancellation.cancel();
        if let Some(handle) = self.job.get_mut().take() {
            let _ = handle.join();
        }
    }
}
