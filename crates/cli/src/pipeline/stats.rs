//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::FilterStatsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Lines read from the event file
    pub lines_read: u64,

    /// Lines skipped because they could not be decoded
    pub malformed_lines: u64,

    /// Accepted events written to the output
    pub events_written: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Whether the run stopped early on a shutdown signal
    pub interrupted: bool,

    /// Final dispatcher counters
    pub dispatcher: MetricsSnapshot,

    /// Per-source aggregation
    pub filter: FilterStatsAggregator,
}

impl PipelineStats {
    /// Events per second throughput
    pub fn events_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.dispatcher.received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of dispatched events evaluated inline, as percentage
    pub fn fallback_rate(&self) -> f64 {
        if self.dispatcher.received > 0 {
            self.dispatcher.sync_fallbacks as f64 / self.dispatcher.received as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Lines read: {}", self.lines_read);
        println!("   ├─ Malformed lines: {}", self.malformed_lines);
        println!("   ├─ Events written: {}", self.events_written);
        println!("   ├─ Throughput: {:.2} events/s", self.events_per_sec());
        println!("   └─ Interrupted: {}", self.interrupted);

        let d = &self.dispatcher;
        println!("\n⚙️  Dispatcher");
        println!("   ├─ Received: {}", d.received);
        println!("   ├─ Async dispatched: {}", d.async_dispatched);
        println!(
            "   ├─ Inline fallbacks: {} ({:.2}%)",
            d.sync_fallbacks,
            self.fallback_rate()
        );
        println!("   ├─ Accepted / rejected: {} / {}", d.accepted, d.rejected);
        println!("   ├─ Evaluation failures: {}", d.eval_failures);
        println!("   ├─ Registry lookups: {}", d.registry_lookups);
        println!("   └─ Unknown sources: {}", d.unknown_sources);

        let summary = self.filter.summary();
        println!("\n📈 Filter");
        println!("   ├─ Accept rate: {:.2}%", summary.accept_rate);
        println!("   └─ Dispatch latency (us): {}", summary.latency_us);

        if !summary.per_source.is_empty() {
            println!("\n🔌 Sources (accepted / received)");
            for (source, tally) in &summary.per_source {
                println!("   ├─ {}: {} / {}", source, tally.accepted, tally.received);
            }
        }

        println!();
    }
}
