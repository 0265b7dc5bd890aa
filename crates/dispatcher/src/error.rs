//! Dispatcher error types

use thiserror::Error;

use crate::worker::WorkerState;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Filter text rejected by the compiler
    #[error("filter compile error: {0}")]
    Compile(#[source] contracts::ContractError),

    /// `process_event` called before a filter was compiled
    #[error("no filter compiled, call compile() before process_event()")]
    NotCompiled,

    /// `compile` called while evaluations are in progress
    #[error("cannot compile filter while {busy} worker(s) are busy")]
    WorkersBusy { busy: usize },

    /// Worker operation attempted from the wrong state
    #[error("filter worker {worker} is {actual}, expected {expected}")]
    InvalidWorkerState {
        worker: usize,
        expected: WorkerState,
        actual: WorkerState,
    },

    /// Worker thread could not be started
    #[error("failed to spawn filter worker {worker}: {source}")]
    WorkerSpawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    /// Worker thread did not terminate cleanly
    #[error("filter worker {worker} failed to terminate: {message}")]
    TeardownFailed { worker: usize, message: String },

    /// `flush` gave up before every submission completed
    #[error("flush timed out with {pending} event(s) still pending")]
    FlushTimeout { pending: usize },
}

impl DispatcherError {
    /// Create an invalid worker state error
    pub fn invalid_state(worker: usize, expected: WorkerState, actual: WorkerState) -> Self {
        Self::InvalidWorkerState {
            worker,
            expected,
            actual,
        }
    }

    /// Create a teardown error
    pub fn teardown(worker: usize, message: impl Into<String>) -> Self {
        Self::TeardownFailed {
            worker,
            message: message.into(),
        }
    }
}
