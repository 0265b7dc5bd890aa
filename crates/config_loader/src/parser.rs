//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, PipelineBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<PipelineBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<PipelineBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<PipelineBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_defaults() {
        let content = r#"
[filter]
expression = "evt.num > 0"
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.filter.expression, "evt.num > 0");
        assert_eq!(bp.dispatcher.async_workers, 4);
        assert_eq!(bp.dispatcher.thread_name_prefix, "flt-worker");
        assert!(bp.sources.is_empty());
    }

    #[test]
    fn test_parse_json() {
        let content = r#"{
            "filter": { "expression": "json.verb = create" },
            "dispatcher": { "async_workers": 2 },
            "sources": [ { "id": 3, "name": "k8saudit", "event_source": "k8s_audit" } ]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.dispatcher.async_workers, 2);
        assert_eq!(bp.dispatcher.flush_timeout_ms, 5000);
        assert_eq!(bp.sources[0].event_source.as_deref(), Some("k8s_audit"));
    }

    #[test]
    fn test_parse_missing_filter_section() {
        let err = parse_toml("[dispatcher]\nasync_workers = 2\n").unwrap_err();
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
