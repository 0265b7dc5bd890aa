//! SourceRegistry trait - plugin event source lookup
//!
//! Decouples the dispatcher from however plugins are loaded and registered.
//! The dispatcher only ever asks "which source produced id N?".

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::SourceConfig;

/// Numeric plugin source identifier
pub type SourceId = u32;

/// Metadata describing a registered event source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Source id (as carried by every event from this source)
    pub id: SourceId,

    /// Plugin name
    pub name: String,

    /// Event source tag (e.g. "k8s_audit", "aws_cloudtrail")
    pub event_source: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Field names the plugin can extract from its payloads
    #[serde(default)]
    pub fields: Vec<String>,
}

impl SourceDescriptor {
    /// Create a descriptor with no description or field list
    pub fn new(id: SourceId, name: impl Into<String>, event_source: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            event_source: event_source.into(),
            description: String::new(),
            fields: Vec::new(),
        }
    }
}

impl From<&SourceConfig> for SourceDescriptor {
    fn from(config: &SourceConfig) -> Self {
        Self {
            id: config.id,
            name: config.name.clone(),
            event_source: config
                .event_source
                .clone()
                .unwrap_or_else(|| config.name.clone()),
            description: config.description.clone().unwrap_or_default(),
            fields: config.fields.clone(),
        }
    }
}

/// Source registry trait
///
/// Lookups may be called from the dispatcher's coordinator thread on the hot path,
/// implementations should be cheap and must not block for long.
pub trait SourceRegistry: Send + Sync {
    /// Resolve a source id, `None` if no such source is registered
    fn lookup(&self, id: SourceId) -> Option<Arc<SourceDescriptor>>;

    /// Number of registered sources
    fn len(&self) -> usize;

    /// Whether no source is registered
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory registry populated once at startup
#[derive(Debug, Clone, Default)]
pub struct StaticSourceRegistry {
    sources: HashMap<SourceId, Arc<SourceDescriptor>>,
}

impl StaticSourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configured sources
    pub fn from_configs(configs: &[SourceConfig]) -> Self {
        let mut registry = Self::new();
        for config in configs {
            registry.register(SourceDescriptor::from(config));
        }
        registry
    }

    /// Register a source, replacing any previous descriptor with the same id
    pub fn register(&mut self, descriptor: SourceDescriptor) {
        self.sources.insert(descriptor.id, Arc::new(descriptor));
    }

    /// Iterate registered descriptors (unordered)
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<SourceDescriptor>> {
        self.sources.values()
    }
}

impl SourceRegistry for StaticSourceRegistry {
    fn lookup(&self, id: SourceId) -> Option<Arc<SourceDescriptor>> {
        self.sources.get(&id).cloned()
    }

    fn len(&self) -> usize {
        self.sources.len()
    }
}
