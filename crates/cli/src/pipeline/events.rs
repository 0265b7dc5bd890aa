//! JSON-lines event codec.
//!
//! Input: `{"source_id":1,"num":7,"ts":0,"payload":{..}|"text"}` per line.
//! Output: accepted events with the resolved source name.

use std::io::Write;

use contracts::{Event, SourceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CliError;

#[derive(Debug, Deserialize)]
struct EventRecord {
    source_id: SourceId,
    #[serde(default)]
    num: Option<u64>,
    #[serde(default)]
    ts: u64,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Serialize)]
struct AcceptedRecord<'a> {
    num: u64,
    source_id: SourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    ts: u64,
    payload: Value,
}

/// Decode one line; `line` (1-based) doubles as the event number when `num` is absent
pub fn parse_event_line(text: &str, line: usize) -> Result<Event, CliError> {
    let record: EventRecord =
        serde_json::from_str(text).map_err(|e| CliError::event_parse(line, e.to_string()))?;

    let payload = match record.payload {
        Value::String(s) => s.into_bytes(),
        Value::Null => Vec::new(),
        other => other.to_string().into_bytes(),
    };

    Ok(Event::new(record.num.unwrap_or(line as u64), record.source_id, payload)
        .with_timestamp(record.ts))
}

/// Write an accepted event as one JSON line
pub fn write_event(out: &mut dyn Write, event: &Event) -> Result<(), CliError> {
    let payload = serde_json::from_slice(&event.payload)
        .unwrap_or_else(|_| Value::String(event.payload_str().into_owned()));

    let record = AcceptedRecord {
        num: event.num,
        source_id: event.source_id,
        source: event.source_info().map(|info| info.name.as_str()),
        ts: event.ts,
        payload,
    };

    serde_json::to_writer(&mut *out, &record)
        .map_err(|e| CliError::pipeline_execution(format!("failed to encode event: {e}")))?;
    out.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SourceDescriptor;
    use std::sync::Arc;

    #[test]
    fn test_parse_object_payload() {
        let event =
            parse_event_line(r#"{"source_id":1,"num":7,"ts":42,"payload":{"verb":"create"}}"#, 1)
                .unwrap();
        assert_eq!(event.num, 7);
        assert_eq!(event.source_id, 1);
        assert_eq!(event.ts, 42);
        assert_eq!(event.payload_str(), r#"{"verb":"create"}"#);
    }

    #[test]
    fn test_parse_text_payload_and_default_num() {
        let event = parse_event_line(r#"{"source_id":2,"payload":"raw text"}"#, 9).unwrap();
        assert_eq!(event.num, 9);
        assert_eq!(event.ts, 0);
        assert_eq!(event.payload.as_ref(), b"raw text");
    }

    #[test]
    fn test_parse_rejects_missing_source() {
        let err = parse_event_line(r#"{"payload":"x"}"#, 3).unwrap_err();
        assert!(matches!(err, CliError::EventParse { line: 3, .. }));
    }

    #[test]
    fn test_write_event() {
        let mut event = Event::new(5, 1, r#"{"verb":"get"}"#).with_timestamp(10);
        event.bind_source(Some(Arc::new(SourceDescriptor::new(1, "k8saudit", "k8s_audit"))));

        let mut out = Vec::new();
        write_event(&mut out, &event).unwrap();
        write_event(&mut out, &Event::new(6, 9, "not json")).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["source"], "k8saudit");
        assert_eq!(lines[0]["payload"]["verb"], "get");
        assert!(lines[1].get("source").is_none());
        assert_eq!(lines[1]["payload"], "not json");
    }
}
