//! Pipeline orchestrator - reads events, dispatches them, writes accepted ones.
//!
//! The dispatcher is synchronous; the whole run executes on one blocking
//! thread and polls a cancellation flag between events.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{Event, PipelineBlueprint, SourceId, StaticSourceRegistry};
use dispatcher::{create_dispatcher, DispatchOutcome, DispatcherConfig, EventDispatcher};
use filter_lang::FilterLangCompiler;
use tracing::{debug, info, warn};

use super::events::{parse_event_line, write_event};
use super::PipelineStats;

/// Events between two metric exports
const METRICS_INTERVAL: u64 = 1000;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated pipeline blueprint
    pub blueprint: PipelineBlueprint,

    /// JSON-lines event input
    pub events_path: PathBuf,

    /// Output file (None = stdout)
    pub output_path: Option<PathBuf>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
    source_names: HashMap<SourceId, String>,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        let source_names = config
            .blueprint
            .sources
            .iter()
            .map(|s| (s.id, s.name.clone()))
            .collect();
        Self {
            config,
            source_names,
        }
    }

    /// Run the pipeline to completion or until `cancel` is raised
    pub fn run(self, cancel: Arc<AtomicBool>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
        }

        let registry = Arc::new(StaticSourceRegistry::from_configs(&blueprint.sources));
        let mut dispatcher = create_dispatcher(
            DispatcherConfig::from(&blueprint.dispatcher),
            registry,
            Arc::new(FilterLangCompiler),
            &blueprint.filter.expression,
        )
        .context("Failed to create dispatcher")?;

        let input = File::open(&self.config.events_path).with_context(|| {
            format!(
                "Failed to open event file {}",
                self.config.events_path.display()
            )
        })?;

        let mut output: Box<dyn Write> = match &self.config.output_path {
            Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
                format!("Failed to create output file {}", path.display())
            })?)),
            None => Box::new(BufWriter::new(io::stdout().lock())),
        };

        info!(
            events = %self.config.events_path.display(),
            workers = dispatcher.async_worker_count(),
            "Pipeline started"
        );

        let mut stats = PipelineStats::default();

        for (idx, line) in BufReader::new(input).lines().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                warn!(line = idx + 1, "Shutdown requested, stopping input");
                stats.interrupted = true;
                break;
            }

            let line = line.context("Failed to read event file")?;
            if line.trim().is_empty() {
                continue;
            }
            stats.lines_read += 1;

            let event = match parse_event_line(&line, idx + 1) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed event");
                    stats.malformed_lines += 1;
                    continue;
                }
            };

            self.dispatch(&mut dispatcher, event, output.as_mut(), &mut stats)?;

            if stats.lines_read % METRICS_INTERVAL == 0 {
                observability::record_pool_state(&dispatcher.worker_states());
                observability::record_dispatcher_snapshot(
                    &dispatcher.metrics(),
                    dispatcher.pending(),
                );
                debug!(lines = stats.lines_read, "Pipeline progress");
            }
        }

        let flush_timeout = dispatcher.config().flush_timeout;
        let remaining = dispatcher
            .flush(flush_timeout)
            .context("Failed to drain dispatcher")?;
        observability::record_backlog_delivered(remaining.len());
        for event in &remaining {
            self.emit(event, output.as_mut(), &mut stats)?;
        }
        output.flush().context("Failed to flush output")?;

        stats.dispatcher = dispatcher.metrics();
        observability::record_dispatcher_snapshot(&stats.dispatcher, dispatcher.pending());
        dispatcher
            .shutdown()
            .context("Failed to stop filter workers")?;

        stats.duration = start_time.elapsed();
        info!(
            received = stats.dispatcher.received,
            accepted = stats.dispatcher.accepted,
            written = stats.events_written,
            "Pipeline finished"
        );
        Ok(stats)
    }

    fn dispatch(
        &self,
        dispatcher: &mut EventDispatcher,
        event: Event,
        output: &mut dyn Write,
        stats: &mut PipelineStats,
    ) -> Result<()> {
        let source = self.source_name(event.source_id).to_string();
        let started = Instant::now();
        let outcome = dispatcher.process_event(event)?;
        stats
            .filter
            .record_received(&source, started.elapsed().as_secs_f64() * 1e6);
        observability::record_dispatch_latency_us(started.elapsed().as_secs_f64() * 1e6);

        match outcome {
            DispatchOutcome::Accepted(event) => {
                observability::record_dispatch_outcome(&source, "accepted");
                self.emit(&event, output, stats)?;
            }
            DispatchOutcome::Rejected => {
                observability::record_dispatch_outcome(&source, "rejected")
            }
            DispatchOutcome::Pending => observability::record_dispatch_outcome(&source, "pending"),
        }

        let mut delivered = 0;
        while let Some(event) = dispatcher.get_event_from_backlog() {
            self.emit(&event, output, stats)?;
            delivered += 1;
        }
        observability::record_backlog_delivered(delivered);
        Ok(())
    }

    fn emit(&self, event: &Event, output: &mut dyn Write, stats: &mut PipelineStats) -> Result<()> {
        write_event(output, event)?;
        stats.events_written += 1;
        stats.filter.record_accepted(self.source_name(event.source_id));
        Ok(())
    }

    fn source_name(&self, id: SourceId) -> &str {
        self.source_names
            .get(&id)
            .map(String::as_str)
            .unwrap_or(contracts::UNKNOWN_SOURCE)
    }
}
