//! PipelineBlueprint - Config Loader 输出
//!
//! 描述完整的过滤管道配置：过滤表达式、工作线程池、已注册的事件源。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::SourceId;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的管道配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 过滤表达式
    #[validate(nested)]
    pub filter: FilterConfig,

    /// 分发器设置
    #[serde(default)]
    #[validate(nested)]
    pub dispatcher: DispatcherSettings,

    /// 插件事件源列表
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// 过滤配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FilterConfig {
    /// 过滤表达式文本 (由 FilterCompiler 编译)
    #[validate(length(min = 1, message = "filter expression cannot be empty"))]
    pub expression: String,
}

/// 分发器设置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatcherSettings {
    /// 异步工作线程数量 (不含同步 worker)
    #[serde(default = "default_async_workers")]
    #[validate(range(min = 1, max = 64, message = "async_workers must be within 1..=64"))]
    pub async_workers: usize,

    /// 工作线程名前缀
    #[serde(default = "default_thread_name_prefix")]
    #[validate(length(min = 1, message = "thread_name_prefix cannot be empty"))]
    pub thread_name_prefix: String,

    /// flush 等待上限 (毫秒)
    #[serde(default = "default_flush_timeout_ms")]
    #[validate(range(min = 1, message = "flush_timeout_ms must be > 0"))]
    pub flush_timeout_ms: u64,
}

impl DispatcherSettings {
    /// flush 等待上限
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            async_workers: default_async_workers(),
            thread_name_prefix: default_thread_name_prefix(),
            flush_timeout_ms: default_flush_timeout_ms(),
        }
    }
}

fn default_async_workers() -> usize {
    4
}

fn default_thread_name_prefix() -> String {
    "flt-worker".to_string()
}

fn default_flush_timeout_ms() -> u64 {
    5000
}

/// 事件源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// 事件源 ID (事件中携带的 plugin id)
    pub id: SourceId,

    /// 插件名称
    pub name: String,

    /// 事件源标签 (缺省与 name 相同)
    #[serde(default)]
    pub event_source: Option<String>,

    /// 描述
    #[serde(default)]
    pub description: Option<String>,

    /// 插件可提取的字段
    #[serde(default)]
    pub fields: Vec<String>,
}
