//! # Dispatcher
//!
//! 事件过滤分发模块。
//!
//! 负责：
//! - 将事件分配给空闲的异步 worker，池耗尽时回退到同步 worker
//! - 缓存在途事件源的描述信息，避免重复查询注册表
//! - 按提交顺序交付通过过滤的事件

mod backlog;
mod completion;
pub mod dispatcher;
pub mod error;
mod inflight;
pub mod metrics;
pub mod worker;

#[cfg(test)]
mod testing;

pub use contracts::{Event, FilterPredicate, SourceRegistry};
pub use dispatcher::{
    DispatchOutcome, DispatcherBuilder, DispatcherConfig, EventDispatcher, create_dispatcher,
};
pub use error::DispatcherError;
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
pub use worker::{FilterWorker, WorkerMode, WorkerState, WorkerStats, WorkerStatsSnapshot};
