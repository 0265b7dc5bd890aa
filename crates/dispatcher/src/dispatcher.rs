//! EventDispatcher - routes events to filter workers and collects accepted ones

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, trace, warn};

use contracts::{
    DispatcherSettings, Event, FilterCompiler, FilterPredicate, SourceDescriptor, SourceId,
    SourceRegistry,
};

use crate::backlog::Backlog;
use crate::completion::CompletionQueue;
use crate::error::DispatcherError;
use crate::inflight::InFlightSources;
use crate::metrics::{DispatcherMetrics, MetricsSnapshot};
use crate::worker::{FilterWorker, WorkerState, WorkerStatsSnapshot};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Background workers; `0` evaluates everything on the caller's thread
    pub async_workers: usize,
    /// Worker threads are named `<prefix>-<index>`
    pub thread_name_prefix: String,
    /// Default wait used by callers of [`EventDispatcher::flush`]
    pub flush_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&DispatcherSettings::default())
    }
}

impl From<&DispatcherSettings> for DispatcherConfig {
    fn from(settings: &DispatcherSettings) -> Self {
        Self {
            async_workers: settings.async_workers,
            thread_name_prefix: settings.thread_name_prefix.clone(),
            flush_timeout: settings.flush_timeout(),
        }
    }
}

/// Result of [`EventDispatcher::process_event`]
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Evaluated inline and accepted
    Accepted(Event),
    /// Evaluated inline and rejected
    Rejected,
    /// Handed to a background worker; accepted events surface through the backlog
    Pending,
}

impl DispatchOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// The accepted event, if any
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Accepted(event) => Some(event),
            _ => None,
        }
    }
}

/// Bookkeeping for an event owned by a background worker
#[derive(Debug, Clone, Copy)]
struct Assignment {
    seq: u64,
    source_id: SourceId,
}

/// Builder for creating an EventDispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    registry: Arc<dyn SourceRegistry>,
    compiler: Arc<dyn FilterCompiler>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(
        config: DispatcherConfig,
        registry: Arc<dyn SourceRegistry>,
        compiler: Arc<dyn FilterCompiler>,
    ) -> Self {
        Self {
            config,
            registry,
            compiler,
        }
    }

    /// Spawn the worker pool
    ///
    /// Workers spawned before a failure are joined before the error is returned.
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(async_workers = self.config.async_workers)
    )]
    pub fn build(self) -> Result<EventDispatcher, DispatcherError> {
        let completions = Arc::new(CompletionQueue::new());
        let count = self.config.async_workers;

        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let name = format!("{}-{}", self.config.thread_name_prefix, index);
            workers.push(FilterWorker::spawn(index, name, Arc::clone(&completions))?);
        }

        info!(
            async_workers = count,
            registered_sources = self.registry.len(),
            "Dispatcher started"
        );

        Ok(EventDispatcher {
            sync_worker: FilterWorker::inline(count),
            assignments: vec![None; count],
            workers,
            completions,
            config: self.config,
            registry: self.registry,
            compiler: self.compiler,
            predicate: None,
            in_flight: InFlightSources::new(),
            backlog: Backlog::new(),
            metrics: DispatcherMetrics::new(),
        })
    }
}

/// Filters events on a pool of background workers plus one inline fallback
///
/// All methods take `&mut self`: one coordinator drives the dispatcher.
/// The dispatcher is `Send` and can be moved to another thread.
pub struct EventDispatcher {
    config: DispatcherConfig,
    registry: Arc<dyn SourceRegistry>,
    compiler: Arc<dyn FilterCompiler>,
    predicate: Option<Arc<dyn FilterPredicate>>,
    workers: Vec<FilterWorker>,
    /// Used when every background worker is busy; index == `workers.len()`
    sync_worker: FilterWorker,
    assignments: Vec<Option<Assignment>>,
    completions: Arc<CompletionQueue>,
    in_flight: InFlightSources,
    backlog: Backlog,
    metrics: DispatcherMetrics,
}

impl EventDispatcher {
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Text of the active filter
    pub fn filter_text(&self) -> Option<&str> {
        self.predicate.as_ref().map(|p| p.source_text())
    }

    /// Number of background workers
    pub fn async_worker_count(&self) -> usize {
        self.workers.len()
    }

    /// 编译过滤表达式
    ///
    /// 必须在 `process_event` 之前调用。任一 worker 非空闲时拒绝；编译失败时保留旧的谓词。
    #[instrument(name = "dispatcher_compile", skip(self))]
    pub fn compile(&mut self, filter_text: &str) -> Result<(), DispatcherError> {
        self.collect_completions();

        let busy = self
            .workers
            .iter()
            .chain(std::iter::once(&self.sync_worker))
            .filter(|w| !w.is_ready())
            .count();
        if busy > 0 {
            return Err(DispatcherError::WorkersBusy { busy });
        }

        let predicate = self
            .compiler
            .compile(filter_text)
            .map_err(DispatcherError::Compile)?;

        if self.predicate.replace(predicate).is_some() {
            info!(filter = %filter_text, "Filter replaced");
        } else {
            info!(filter = %filter_text, "Filter compiled");
        }
        Ok(())
    }

    /// 分发一个事件
    ///
    /// 优先交给空闲的异步 worker (返回 `Pending`)，全部繁忙时在当前线程同步求值。
    pub fn process_event(&mut self, event: Event) -> Result<DispatchOutcome, DispatcherError> {
        let predicate = self
            .predicate
            .as_ref()
            .map(Arc::clone)
            .ok_or(DispatcherError::NotCompiled)?;

        self.metrics.inc_received();
        self.collect_completions();

        let source_id = event.source_id;
        let num = event.num;
        let info = self.acquire_source(source_id);

        let target = self.workers.iter().position(FilterWorker::is_ready);

        match target {
            Some(index) => {
                if let Err(e) = self.prepare_worker(index, event, info, predicate) {
                    self.in_flight.release(source_id);
                    return Err(e);
                }
                let seq = self.backlog.reserve();
                self.assignments[index] = Some(Assignment { seq, source_id });
                self.metrics.inc_async_dispatched();
                trace!(event_num = num, worker = index, seq, "Event dispatched");
                Ok(DispatchOutcome::Pending)
            }
            None => {
                self.metrics.inc_sync_fallbacks();
                debug!(event_num = num, "All workers busy, evaluating inline");

                let sync_index = self.workers.len();
                let result = self
                    .prepare_worker(sync_index, event, info, predicate)
                    .and_then(|()| self.sync_worker.take_result());
                self.in_flight.release(source_id);

                let (event, accepted) = result?;
                self.metrics.record_verdict(accepted);
                Ok(if accepted {
                    DispatchOutcome::Accepted(event)
                } else {
                    DispatchOutcome::Rejected
                })
            }
        }
    }

    /// Next accepted event from the background workers, in submission order
    pub fn get_event_from_backlog(&mut self) -> Option<Event> {
        self.collect_completions();
        self.backlog.pop()
    }

    /// Query the source registry directly
    pub fn get_plugin_source_info(&self, source_id: SourceId) -> Option<Arc<SourceDescriptor>> {
        self.metrics.inc_registry_lookups();
        self.registry.lookup(source_id)
    }

    /// Whether any background worker can take an event
    ///
    /// The inline worker is not counted; `false` means the next event is
    /// evaluated synchronously.
    pub fn is_worker_available(&self) -> bool {
        self.workers.iter().any(FilterWorker::is_ready)
    }

    /// Wait for every background worker to finish, then drain the backlog
    ///
    /// On timeout, harvested events stay in the backlog.
    #[instrument(name = "dispatcher_flush", skip(self), fields(pending = self.pending()))]
    pub fn flush(&mut self, timeout: Duration) -> Result<Vec<Event>, DispatcherError> {
        let deadline = Instant::now() + timeout;

        loop {
            self.collect_completions();
            if self.assignments.iter().all(Option::is_none) {
                break;
            }
            if !self.completions.wait_until(deadline) {
                self.collect_completions();
                if self.assignments.iter().all(Option::is_none) {
                    break;
                }
                let pending = self.pending();
                warn!(pending, "Flush timed out");
                return Err(DispatcherError::FlushTimeout { pending });
            }
        }

        let events = self.backlog.drain();
        debug!(delivered = events.len(), "Flush complete");
        Ok(events)
    }

    /// Background submissions not yet delivered or dropped
    pub fn pending(&self) -> usize {
        self.backlog.pending()
    }

    pub fn is_source_in_flight(&self, source_id: SourceId) -> bool {
        self.in_flight.contains(source_id)
    }

    /// Ids of sources with events inside workers, sorted
    pub fn in_flight_sources(&self) -> Vec<SourceId> {
        self.in_flight.ids()
    }

    /// States of the background workers followed by the inline worker
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.all_workers().map(FilterWorker::state).collect()
    }

    /// Counters of the background workers followed by the inline worker
    pub fn worker_stats(&self) -> Vec<WorkerStatsSnapshot> {
        self.all_workers().map(FilterWorker::stats).collect()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let failures = self.all_workers().map(|w| w.stats().failures).sum();
        self.metrics.snapshot(failures)
    }

    /// Stop and join every worker thread
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub fn shutdown(mut self) -> Result<(), DispatcherError> {
        self.teardown()
    }

    fn worker(&self, index: usize) -> Option<&FilterWorker> {
        if index == self.workers.len() {
            Some(&self.sync_worker)
        } else {
            self.workers.get(index)
        }
    }

    fn all_workers(&self) -> impl Iterator<Item = &FilterWorker> {
        self.workers.iter().chain(std::iter::once(&self.sync_worker))
    }

    /// Bind the source descriptor and hand the event to worker `index`
    fn prepare_worker(
        &self,
        index: usize,
        mut event: Event,
        info: Option<Arc<SourceDescriptor>>,
        predicate: Arc<dyn FilterPredicate>,
    ) -> Result<(), DispatcherError> {
        let worker = self.worker(index).ok_or_else(|| {
            DispatcherError::invalid_state(index, WorkerState::Ready, WorkerState::Working)
        })?;
        event.bind_source(info);
        worker.assign(event, predicate)
    }

    /// Cached descriptor for `source_id`, looked up on first sighting
    fn acquire_source(&mut self, source_id: SourceId) -> Option<Arc<SourceDescriptor>> {
        if let Some(info) = self.in_flight.acquire(source_id) {
            return info;
        }

        let info = self.get_plugin_source_info(source_id);
        if info.is_none() {
            self.metrics.inc_unknown_sources();
            warn!(source_id, "Unknown event source, dispatching without descriptor");
        }
        self.in_flight.insert(source_id, info.clone());
        info
    }

    /// Move finished background results into the backlog
    fn collect_completions(&mut self) -> usize {
        let mut harvested = 0;

        for index in self.completions.drain() {
            let Some(assignment) = self.assignments.get_mut(index).and_then(Option::take) else {
                warn!(worker = index, "Completion for unassigned worker ignored");
                continue;
            };

            match self.workers[index].take_result() {
                Ok((event, accepted)) => {
                    self.metrics.record_verdict(accepted);
                    self.backlog.complete(assignment.seq, accepted.then_some(event));
                }
                Err(e) => {
                    error!(worker = index, error = %e, "Failed to take worker result");
                    self.backlog.complete(assignment.seq, None);
                }
            }
            self.in_flight.release(assignment.source_id);
            harvested += 1;
        }

        if harvested > 0 {
            trace!(harvested, ready = self.backlog.ready_len(), "Completions harvested");
        }
        harvested
    }

    /// Join all worker threads; later calls are no-ops
    fn teardown(&mut self) -> Result<(), DispatcherError> {
        let workers = std::mem::take(&mut self.workers);
        if workers.is_empty() && self.backlog.pending() == 0 {
            return Ok(());
        }

        let undelivered = self.backlog.pending();
        if undelivered > 0 {
            warn!(undelivered, "Dispatcher stopped with undelivered events");
        }

        let mut first_error = None;
        for worker in workers {
            if let Err(e) = worker.shutdown() {
                error!(error = %e, "Worker teardown failed");
                first_error.get_or_insert(e);
            }
        }

        self.assignments.clear();
        self.backlog = Backlog::new();
        self.in_flight = InFlightSources::new();
        info!("Dispatcher shutdown complete");

        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("config", &self.config)
            .field("filter", &self.filter_text())
            .field("workers", &self.worker_states())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        // failures are already logged by teardown
        let _ = self.teardown();
    }
}

/// Build a dispatcher and compile its filter
#[instrument(name = "dispatcher_create", skip(config, registry, compiler))]
pub fn create_dispatcher(
    config: DispatcherConfig,
    registry: Arc<dyn SourceRegistry>,
    compiler: Arc<dyn FilterCompiler>,
    filter_text: &str,
) -> Result<EventDispatcher, DispatcherError> {
    let mut dispatcher = DispatcherBuilder::new(config, registry, compiler).build()?;
    dispatcher.compile(filter_text)?;
    Ok(dispatcher)
}
