//! Layered error definitions
//!
//! Categorized by source: config / filter / evaluation

use thiserror::Error;

use crate::SourceId;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Filter Errors =====
    /// Malformed filter text
    #[error("filter syntax error at offset {position}: {message}")]
    FilterSyntax { position: usize, message: String },

    // ===== Evaluation Errors =====
    /// Event payload could not be decoded for field extraction
    #[error("payload parse error for event {event_num} (source {source_id}): {message}")]
    PayloadParse {
        event_num: u64,
        source_id: SourceId,
        message: String,
    },

    /// Field value could not be compared with the filter operand
    #[error("type mismatch on field '{field}': {message}")]
    TypeMismatch { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create filter syntax error
    pub fn filter_syntax(position: usize, message: impl Into<String>) -> Self {
        Self::FilterSyntax {
            position,
            message: message.into(),
        }
    }

    /// Create payload parse error
    pub fn payload_parse(event_num: u64, source_id: SourceId, message: impl Into<String>) -> Self {
        Self::PayloadParse {
            event_num,
            source_id,
            message: message.into(),
        }
    }

    /// Create type mismatch error
    pub fn type_mismatch(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            message: message.into(),
        }
    }
}
