//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (validator derive): async_workers 1..=64, 表达式非空等
//! - 过滤表达式不能只含空白
//! - source id 唯一
//! - source name / event_source 非空

use std::collections::HashSet;

use contracts::{ContractError, PipelineBlueprint};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|errors| first_violation("", &errors))?;
    validate_filter(blueprint)?;
    validate_source_ids(blueprint)?;
    validate_source_names(blueprint)?;
    Ok(())
}

/// 将 validator 的嵌套错误展开为第一个字段路径
fn first_violation(prefix: &str, errors: &ValidationErrors) -> ContractError {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(error) = list.first() {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    return ContractError::config_validation(path, message);
                }
            }
            ValidationErrorsKind::Struct(nested) => return first_violation(&path, nested),
            ValidationErrorsKind::List(items) => {
                if let Some((index, nested)) = items.iter().next() {
                    return first_violation(&format!("{path}[{index}]"), nested);
                }
            }
        }
    }

    ContractError::config_validation(prefix, "invalid value")
}

/// 校验过滤表达式
fn validate_filter(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.filter.expression.trim().is_empty() {
        return Err(ContractError::config_validation(
            "filter.expression",
            "filter expression cannot be blank",
        ));
    }
    Ok(())
}

/// 校验 source id 唯一性
fn validate_source_ids(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for source in &blueprint.sources {
        if !seen.insert(source.id) {
            return Err(ContractError::config_validation(
                format!("sources[id={}]", source.id),
                "duplicate source id",
            ));
        }
    }
    Ok(())
}

/// 校验 source 名称
fn validate_source_names(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    for (idx, source) in blueprint.sources.iter().enumerate() {
        if source.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sources[{idx}].name"),
                "source name cannot be empty",
            ));
        }
        if source
            .event_source
            .as_deref()
            .is_some_and(|tag| tag.trim().is_empty())
        {
            return Err(ContractError::config_validation(
                format!("sources[{idx}].event_source"),
                "event_source cannot be empty when set",
            ));
        }
    }
    Ok(())
}
