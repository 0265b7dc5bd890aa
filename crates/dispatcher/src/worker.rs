//! FilterWorker - one event slot evaluated inline or on a dedicated thread

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace, warn};

use contracts::{Event, FilterPredicate};

use crate::completion::CompletionQueue;
use crate::error::DispatcherError;

/// Worker 状态机: `Ready` → `Working` → `HasResult` → `Ready`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// 空闲，可接受新事件
    Ready,
    /// 持有事件，正在（或即将）求值
    Working,
    /// 求值完成，等待取走结果
    HasResult,
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Working,
            2 => Self::HasResult,
            _ => Self::Ready,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Ready => 0,
            Self::Working => 1,
            Self::HasResult => 2,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "READY"),
            Self::Working => write!(f, "WORKING"),
            Self::HasResult => write!(f, "HAS_RESULT"),
        }
    }
}

/// Where a worker runs its evaluations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Evaluates on the caller's thread inside `assign`
    Inline,
    /// Owns a background thread
    Background,
}

/// Per-worker diagnostic counters
#[derive(Debug, Default)]
pub struct WorkerStats {
    evaluations: AtomicU64,
    accepted: AtomicU64,
    failures: AtomicU64,
}

impl WorkerStats {
    /// Take a point-in-time snapshot
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`WorkerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    pub evaluations: u64,
    pub accepted: u64,
    /// Predicate errors and panics, both counted as rejections
    pub failures: u64,
}

#[derive(Default)]
struct Slot {
    event: Option<Event>,
    predicate: Option<Arc<dyn FilterPredicate>>,
    verdict: bool,
    terminate: bool,
}

struct WorkerShared {
    index: usize,
    state: AtomicU8,
    slot: Mutex<Slot>,
    wake: Condvar,
    stats: WorkerStats,
}

impl WorkerShared {
    fn new(index: usize) -> Self {
        Self {
            index,
            state: AtomicU8::new(WorkerState::Ready.as_u8()),
            slot: Mutex::new(Slot::default()),
            wake: Condvar::new(),
            stats: WorkerStats::default(),
        }
    }

    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Evaluate the slot's event and publish the verdict
    ///
    /// Errors and panics from the predicate never leave this function.
    fn evaluate(&self, slot: &mut Slot) {
        let (Some(event), Some(predicate)) = (slot.event.as_mut(), slot.predicate.take()) else {
            slot.verdict = false;
            self.set_state(WorkerState::HasResult);
            return;
        };

        let num = event.num;
        let source_id = event.source_id;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| predicate.evaluate(event)));

        let verdict = match outcome {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker = self.index,
                    event_num = num,
                    source_id,
                    error = %e,
                    "Filter evaluation failed, event rejected"
                );
                false
            }
            Err(payload) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    worker = self.index,
                    event_num = num,
                    source_id,
                    panic = %panic_message(payload.as_ref()),
                    "Filter predicate panicked, event rejected"
                );
                false
            }
        };

        self.stats.evaluations.fetch_add(1, Ordering::Relaxed);
        if verdict {
            self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        }
        slot.verdict = verdict;
        self.set_state(WorkerState::HasResult);
    }
}

/// Owns one event slot and applies the shared predicate to it
pub struct FilterWorker {
    shared: Arc<WorkerShared>,
    mode: WorkerMode,
    thread: Option<JoinHandle<()>>,
}

impl FilterWorker {
    /// Create a worker that evaluates on the caller's thread
    pub fn inline(index: usize) -> Self {
        Self {
            shared: Arc::new(WorkerShared::new(index)),
            mode: WorkerMode::Inline,
            thread: None,
        }
    }

    /// Create a worker with its own thread named `name`
    pub(crate) fn spawn(
        index: usize,
        name: String,
        completions: Arc<CompletionQueue>,
    ) -> Result<Self, DispatcherError> {
        let shared = Arc::new(WorkerShared::new(index));
        let thread_shared = Arc::clone(&shared);

        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || worker_loop(thread_shared, completions))
            .map_err(|source| DispatcherError::WorkerSpawn {
                worker: index,
                source,
            })?;

        Ok(Self {
            shared,
            mode: WorkerMode::Background,
            thread: Some(thread),
        })
    }

    pub fn index(&self) -> usize {
        self.shared.index
    }

    pub fn mode(&self) -> WorkerMode {
        self.mode
    }

    /// Current state, read without locking
    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == WorkerState::Ready
    }

    /// Hand an event to this worker
    ///
    /// Only valid from `Ready`. Inline workers evaluate before returning and
    /// end up in `HasResult`; background workers wake their thread.
    pub fn assign(
        &self,
        event: Event,
        predicate: Arc<dyn FilterPredicate>,
    ) -> Result<(), DispatcherError> {
        let mut slot = self.shared.slot.lock();
        let state = self.state();
        if state != WorkerState::Ready {
            return Err(DispatcherError::invalid_state(
                self.index(),
                WorkerState::Ready,
                state,
            ));
        }

        trace!(worker = self.index(), event_num = event.num, "Event assigned");
        slot.event = Some(event);
        slot.predicate = Some(predicate);
        self.shared.set_state(WorkerState::Working);

        match self.mode {
            WorkerMode::Inline => self.shared.evaluate(&mut slot),
            WorkerMode::Background => {
                drop(slot);
                self.shared.wake.notify_one();
            }
        }
        Ok(())
    }

    /// Take the evaluated event and its verdict, returning the worker to `Ready`
    pub fn take_result(&self) -> Result<(Event, bool), DispatcherError> {
        let mut slot = self.shared.slot.lock();
        let state = self.state();
        if state != WorkerState::HasResult {
            return Err(DispatcherError::invalid_state(
                self.index(),
                WorkerState::HasResult,
                state,
            ));
        }

        let event = slot.event.take().ok_or_else(|| {
            DispatcherError::invalid_state(self.index(), WorkerState::HasResult, WorkerState::Ready)
        })?;
        let verdict = std::mem::take(&mut slot.verdict);
        self.shared.set_state(WorkerState::Ready);
        Ok((event, verdict))
    }

    /// Run `f` against the owned event
    ///
    /// Returns `None` when the worker is `Ready`. Blocks while a background
    /// evaluation holds the slot.
    pub fn with_event<R>(&self, f: impl FnOnce(&Event) -> R) -> Option<R> {
        if self.is_ready() {
            return None;
        }
        let slot = self.shared.slot.lock();
        slot.event.as_ref().map(f)
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Stop and join the worker thread
    ///
    /// An evaluation in progress is allowed to finish; any event still owned
    /// by the worker is discarded.
    pub fn shutdown(mut self) -> Result<(), DispatcherError> {
        self.terminate()
    }

    fn terminate(&mut self) -> Result<(), DispatcherError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        {
            let mut slot = self.shared.slot.lock();
            slot.terminate = true;
        }
        self.shared.wake.notify_all();

        thread.join().map_err(|payload| {
            DispatcherError::teardown(self.index(), panic_message(payload.as_ref()))
        })?;
        debug!(worker = self.index(), "Filter worker stopped");
        Ok(())
    }
}

impl fmt::Debug for FilterWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterWorker")
            .field("index", &self.index())
            .field("mode", &self.mode)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for FilterWorker {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            error!(worker = self.index(), error = %e, "Filter worker teardown failed");
        }
    }
}

/// Background loop: wait for an assignment, evaluate under the slot lock,
/// publish the result, notify the coordinator
fn worker_loop(shared: Arc<WorkerShared>, completions: Arc<CompletionQueue>) {
    debug!(worker = shared.index, "Filter worker started");

    loop {
        {
            let mut slot = shared.slot.lock();
            while !slot.terminate && shared.state() != WorkerState::Working {
                shared.wake.wait(&mut slot);
            }
            if slot.terminate {
                break;
            }
            shared.evaluate(&mut slot);
        }
        completions.push(shared.index);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
