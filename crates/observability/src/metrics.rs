//! 事件过滤指标收集模块
//!
//! 基于 dispatcher 的计数快照和 worker 状态记录运行指标。

use std::collections::BTreeMap;

use dispatcher::{MetricsSnapshot, WorkerState};
use metrics::{counter, gauge, histogram};

/// 记录一次分发结果
///
/// `outcome` 为 `accepted` / `rejected` / `pending`。
pub fn record_dispatch_outcome(source: &str, outcome: &'static str) {
    counter!(
        "evt_filter_events_total",
        "source" => source.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// 记录从 backlog 交付的事件
pub fn record_backlog_delivered(count: usize) {
    if count > 0 {
        counter!("evt_filter_backlog_delivered_total").increment(count as u64);
    }
}

/// 记录 worker 池状态分布
pub fn record_pool_state(states: &[WorkerState]) {
    let mut ready = 0usize;
    let mut working = 0usize;
    let mut has_result = 0usize;
    for state in states {
        match state {
            WorkerState::Ready => ready += 1,
            WorkerState::Working => working += 1,
            WorkerState::HasResult => has_result += 1,
        }
    }

    gauge!("evt_filter_workers", "state" => "ready").set(ready as f64);
    gauge!("evt_filter_workers", "state" => "working").set(working as f64);
    gauge!("evt_filter_workers", "state" => "has_result").set(has_result as f64);
}

/// 从 dispatcher 快照记录累计指标
pub fn record_dispatcher_snapshot(snapshot: &MetricsSnapshot, pending: usize) {
    gauge!("evt_filter_received").set(snapshot.received as f64);
    gauge!("evt_filter_async_dispatched").set(snapshot.async_dispatched as f64);
    gauge!("evt_filter_sync_fallbacks").set(snapshot.sync_fallbacks as f64);
    gauge!("evt_filter_accepted").set(snapshot.accepted as f64);
    gauge!("evt_filter_rejected").set(snapshot.rejected as f64);
    gauge!("evt_filter_eval_failures").set(snapshot.eval_failures as f64);
    gauge!("evt_filter_registry_lookups").set(snapshot.registry_lookups as f64);
    gauge!("evt_filter_unknown_sources").set(snapshot.unknown_sources as f64);
    gauge!("evt_filter_pending").set(pending as f64);
}

/// 记录单个事件的处理耗时 (微秒)
pub fn record_dispatch_latency_us(latency_us: f64) {
    histogram!("evt_filter_dispatch_latency_us").record(latency_us);
}

/// 过滤指标聚合器
///
/// 在内存中按事件源聚合，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct FilterStatsAggregator {
    /// 按事件源统计
    pub per_source: BTreeMap<String, SourceTally>,

    /// 单事件处理耗时 (微秒)
    pub latency_us: RunningStats,
}

/// 单个事件源的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceTally {
    pub received: u64,
    pub accepted: u64,
}

impl FilterStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录收到的事件
    pub fn record_received(&mut self, source: &str, latency_us: f64) {
        self.tally(source).received += 1;
        self.latency_us.push(latency_us);
    }

    /// 记录通过过滤的事件
    pub fn record_accepted(&mut self, source: &str) {
        self.tally(source).accepted += 1;
    }

    fn tally(&mut self, source: &str) -> &mut SourceTally {
        self.per_source.entry(source.to_string()).or_default()
    }

    /// 生成摘要
    pub fn summary(&self) -> FilterSummary {
        let received: u64 = self.per_source.values().map(|t| t.received).sum();
        let accepted: u64 = self.per_source.values().map(|t| t.accepted).sum();

        FilterSummary {
            received,
            accepted,
            accept_rate: if received > 0 {
                accepted as f64 / received as f64 * 100.0
            } else {
                0.0
            },
            latency_us: StatsSummary::from(&self.latency_us),
            per_source: self.per_source.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 过滤指标摘要
#[derive(Debug, Clone, Default)]
pub struct FilterSummary {
    pub received: u64,
    pub accepted: u64,
    pub accept_rate: f64,
    pub latency_us: StatsSummary,
    pub per_source: BTreeMap<String, SourceTally>,
}

impl std::fmt::Display for FilterSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Filter Summary ===")?;
        writeln!(f, "Received: {}", self.received)?;
        writeln!(f, "Accepted: {} ({:.2}%)", self.accepted, self.accept_rate)?;
        writeln!(f, "Dispatch latency (us): {}", self.latency_us)?;

        if !self.per_source.is_empty() {
            writeln!(f, "Per source:")?;
            for (source, tally) in &self.per_source {
                writeln!(f, "  {}: {}/{}", source, tally.accepted, tally.received)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// 在线统计计算器 (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [2.0, 4.0, 6.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 3);
        assert!((stats.mean() - 4.0).abs() < 1e-10);
        assert!((stats.variance() - 4.0).abs() < 1e-10);

        let summary = StatsSummary::from(&stats);
        assert!((summary.min - 2.0).abs() < 1e-10);
        assert!((summary.max - 6.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_per_source() {
        let mut aggregator = FilterStatsAggregator::new();
        aggregator.record_received("k8saudit", 10.0);
        aggregator.record_received("k8saudit", 20.0);
        aggregator.record_received("syscall", 5.0);
        aggregator.record_accepted("k8saudit");

        let summary = aggregator.summary();
        assert_eq!(summary.received, 3);
        assert_eq!(summary.accepted, 1);
        assert_eq!(
            summary.per_source.get("k8saudit"),
            Some(&SourceTally {
                received: 2,
                accepted: 1
            })
        );
        assert_eq!(summary.latency_us.count, 3);

        aggregator.reset();
        assert_eq!(aggregator.summary().received, 0);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = FilterStatsAggregator::new();
        aggregator.record_received("k8saudit", 1.0);
        aggregator.record_accepted("k8saudit");

        let output = aggregator.summary().to_string();
        assert!(output.contains("Received: 1"));
        assert!(output.contains("100.00%"));
        assert!(output.contains("k8saudit: 1/1"));
    }

    #[test]
    fn test_recorders_without_installed_exporter() {
        // the facade is a no-op until a recorder is installed
        record_dispatch_outcome("k8saudit", "accepted");
        record_backlog_delivered(3);
        record_pool_state(&[WorkerState::Ready, WorkerState::Working]);
        record_dispatcher_snapshot(&MetricsSnapshot::default(), 0);
        record_dispatch_latency_us(12.5);
    }
}
