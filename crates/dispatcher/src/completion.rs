//! Completion notifications from background workers to the coordinator

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// Indices of workers that have published a result and wait to be harvested
#[derive(Debug, Default)]
pub(crate) struct CompletionQueue {
    ready: Mutex<VecDeque<usize>>,
    signal: Condvar,
}

impl CompletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by a worker thread after its state became `HasResult`
    pub fn push(&self, worker: usize) {
        self.ready.lock().push_back(worker);
        self.signal.notify_all();
    }

    /// Take every pending notification, in completion order
    pub fn drain(&self) -> Vec<usize> {
        self.ready.lock().drain(..).collect()
    }

    /// Block until at least one notification is pending or `deadline` passes
    ///
    /// Returns `true` if a notification is pending.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut ready = self.ready.lock();
        while ready.is_empty() {
            if self.signal.wait_until(&mut ready, deadline).timed_out() {
                return !ready.is_empty();
            }
        }
        true
    }
}
