//! Event - one plugin-produced instrumentation record
//!
//! The raw payload travels as [`Bytes`] so handing an event to a worker never
//! copies it. Extracted fields are parsed lazily, at most once per event.

use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::{ContractError, SourceDescriptor, SourceId};

/// Name reported for events whose source id is not registered
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Lazily extracted payload fields
#[derive(Debug, Clone, Default)]
pub enum EventFields {
    /// Payload not inspected yet
    #[default]
    Unparsed,
    /// Payload decoded as a JSON object
    Parsed(Map<String, Value>),
    /// Payload is not a JSON object
    Invalid(String),
}

/// Plugin event
#[derive(Debug, Clone)]
pub struct Event {
    /// Monotonic event number assigned at capture
    pub num: u64,

    /// Id of the source (plugin) that produced the event
    pub source_id: SourceId,

    /// Capture timestamp (ns)
    pub ts: u64,

    /// Raw payload (zero-copy)
    pub payload: Bytes,

    /// Source descriptor bound by the dispatcher before evaluation
    source_info: Option<Arc<SourceDescriptor>>,

    fields: EventFields,
}

impl Event {
    /// Create a new event
    pub fn new(num: u64, source_id: SourceId, payload: impl Into<Bytes>) -> Self {
        Self {
            num,
            source_id,
            ts: 0,
            payload: payload.into(),
            source_info: None,
            fields: EventFields::Unparsed,
        }
    }

    /// Set the capture timestamp
    pub fn with_timestamp(mut self, ts: u64) -> Self {
        self.ts = ts;
        self
    }

    /// Bind the source descriptor resolved for this event's source id
    pub fn bind_source(&mut self, info: Option<Arc<SourceDescriptor>>) {
        self.source_info = info;
    }

    /// Descriptor bound by the dispatcher, if the source is registered
    pub fn source_info(&self) -> Option<&Arc<SourceDescriptor>> {
        self.source_info.as_ref()
    }

    /// Source name, or `"unknown"` for unregistered sources
    pub fn source_name(&self) -> &str {
        self.source_info
            .as_deref()
            .map(|info| info.name.as_str())
            .unwrap_or(UNKNOWN_SOURCE)
    }

    /// Payload as text (lossy UTF-8)
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Extracted payload fields
    ///
    /// Decodes the payload as a JSON object on first access and caches the result.
    ///
    /// # Errors
    /// Returns [`ContractError::PayloadParse`] if the payload is not a JSON object.
    pub fn fields(&mut self) -> Result<&Map<String, Value>, ContractError> {
        if matches!(self.fields, EventFields::Unparsed) {
            self.fields = match serde_json::from_slice::<Value>(&self.payload) {
                Ok(Value::Object(map)) => EventFields::Parsed(map),
                Ok(other) => EventFields::Invalid(format!("expected JSON object, got {other}")),
                Err(e) => EventFields::Invalid(e.to_string()),
            };
        }

        match &self.fields {
            EventFields::Parsed(map) => Ok(map),
            EventFields::Invalid(message) => Err(ContractError::payload_parse(
                self.num,
                self.source_id,
                message.clone(),
            )),
            EventFields::Unparsed => Err(ContractError::payload_parse(
                self.num,
                self.source_id,
                "payload not extracted",
            )),
        }
    }

    /// Whether payload fields have already been extracted
    pub fn fields_extracted(&self) -> bool {
        !matches!(self.fields, EventFields::Unparsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_parsed_once() {
        let mut event = Event::new(1, 3, r#"{"verb":"create","count":2}"#);
        assert!(!event.fields_extracted());

        let fields = event.fields().unwrap();
        assert_eq!(fields.get("verb").and_then(Value::as_str), Some("create"));
        assert!(event.fields_extracted());
    }

    #[test]
    fn test_malformed_payload_is_reported() {
        let mut event = Event::new(7, 3, "not json");
        let err = event.fields().unwrap_err();
        assert!(matches!(
            err,
            ContractError::PayloadParse {
                event_num: 7,
                source_id: 3,
                ..
            }
        ));
        // cached failure is still an error on second access
        assert!(event.fields().is_err());
    }

    #[test]
    fn test_non_object_payload_is_invalid() {
        let mut event = Event::new(1, 1, "[1,2,3]");
        assert!(event.fields().is_err());
    }

    #[test]
    fn test_source_name_defaults_to_unknown() {
        let mut event = Event::new(1, 9, "x");
        assert_eq!(event.source_name(), UNKNOWN_SOURCE);

        event.bind_source(Some(Arc::new(SourceDescriptor::new(9, "dummy", "dummy"))));
        assert_eq!(event.source_name(), "dummy");
    }
}
