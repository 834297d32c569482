//! Decoding of the instrumentation channel
//!
//! The request-capture extension publishes every XHR/fetch/form observation
//! as a DOM node carrying one of three marker classes, with the event in
//! the node's inner HTML. The marker class names are a wire format shared
//! with the extension and must not change.

use crate::browser::driver::ConsoleEntry;
use chrono::{DateTime, Utc};
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Requests sent without a body
pub const EXCHANGE_TOKEN_REQ_WITHOUT_DATA: &str = "EXCHANGE_TOKEN_REQ_WITHOUT_DATA";

/// Requests sent with a body (form data, JSON, ...)
pub const EXCHANGE_TOKEN_REQ_WITH_DATA: &str = "EXCHANGE_TOKEN_REQ_WITH_DATA";

/// Requests answered with a 2xx status
pub const EXCHANGE_TOKEN_REQ_SUCC: &str = "EXCHANGE_TOKEN_REQ_SUCC";

/// Kind of an instrumentation event, in query order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WithoutData,
    WithData,
    Succ,
}

impl EventKind {
    /// Fixed query order of the marker classes
    pub const ALL: [EventKind; 3] = [Self::WithoutData, Self::WithData, Self::Succ];

    pub fn marker_class(&self) -> &'static str {
        match self {
            Self::WithoutData => EXCHANGE_TOKEN_REQ_WITHOUT_DATA,
            Self::WithData => EXCHANGE_TOKEN_REQ_WITH_DATA,
            Self::Succ => EXCHANGE_TOKEN_REQ_SUCC,
        }
    }
}

/// Raw inner HTML of the marker nodes, grouped by class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerSnapshot {
    pub without_data: Vec<String>,
    pub with_data: Vec<String>,
    pub succ: Vec<String>,
}

impl MarkerSnapshot {
    pub fn slot_mut(&mut self, kind: EventKind) -> &mut Vec<String> {
        match kind {
            EventKind::WithoutData => &mut self.without_data,
            EventKind::WithData => &mut self.with_data,
            EventKind::Succ => &mut self.succ,
        }
    }
}

/// An event payload: structured when the marker held JSON, raw otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Structured(Value),
    Raw(String),
}

impl EventPayload {
    pub fn as_object(&self) -> Option<&serde_json::Map<String, Value>> {
        match self {
            Self::Structured(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// The partitioned event bundle written as `events.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBundle {
    pub without_data: Vec<EventPayload>,
    pub with_data: Vec<EventPayload>,
    pub succ: Vec<EventPayload>,
}

impl EventBundle {
    pub fn len(&self) -> usize {
        self.without_data.len() + self.with_data.len() + self.succ.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decodes one marker node's inner HTML
///
/// Entities introduced by the DOM serializer are decoded first. A JSON
/// string that itself holds a JSON object or array is unwrapped one level,
/// since the extension may stringify twice. Anything that is not JSON is
/// kept verbatim; that is not an error.
pub fn decode_payload(inner_html: &str) -> EventPayload {
    let text = unescape_inner_html(inner_html);

    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::String(inner)) => match serde_json::from_str::<Value>(inner.trim()) {
            Ok(nested @ (Value::Object(_) | Value::Array(_))) => EventPayload::Structured(nested),
            _ => EventPayload::Structured(Value::String(inner)),
        },
        Ok(value) => EventPayload::Structured(value),
        Err(_) => EventPayload::Raw(inner_html.to_string()),
    }
}

/// Decodes the three marker classes into a bundle
///
/// Document order is kept within each class. The classes are independent:
/// a request may appear in both `with_data` and `succ`.
pub fn decode_markers(markers: &MarkerSnapshot) -> EventBundle {
    let decode_all =
        |nodes: &[String]| -> Vec<EventPayload> { nodes.iter().map(|n| decode_payload(n)).collect() };

    EventBundle {
        without_data: decode_all(&markers.without_data),
        with_data: decode_all(&markers.with_data),
        succ: decode_all(&markers.succ),
    }
}

/// `source` tag carried by every line the event-logger extension writes
pub const EVENT_LOGGER_SOURCE: &str = "event-logger";

/// A decoded console line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleRecord {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub source: String,
    /// Set when the line was emitted by one of the installed extensions
    pub from_extension: bool,
    pub message: EventPayload,
}

/// Decodes the console log
///
/// Every entry yields one record, in chronological order; decoding never
/// drops entries. Messages that are JSON become structured payloads.
pub fn decode_console(entries: &[ConsoleEntry]) -> Vec<ConsoleRecord> {
    let mut records: Vec<ConsoleRecord> = entries
        .iter()
        .map(|entry| {
            let message = match serde_json::from_str::<Value>(entry.text.trim()) {
                Ok(value @ (Value::Object(_) | Value::Array(_))) => EventPayload::Structured(value),
                _ => EventPayload::Raw(entry.text.clone()),
            };
            ConsoleRecord {
                timestamp: entry.timestamp,
                level: entry.level.clone(),
                source: entry.source.clone(),
                from_extension: is_extension_line(entry, &message),
                message,
            }
        })
        .collect();

    // stable: entries with equal timestamps keep their arrival order
    records.sort_by_key(|r| r.timestamp);
    records
}

/// Lines the event-logger writes from the page's main world carry
/// `"source": "event-logger"`; browser log entries raised by an extension
/// are prefixed with its `chrome-extension://` URL.
fn is_extension_line(entry: &ConsoleEntry, message: &EventPayload) -> bool {
    if entry.text.starts_with("chrome-extension://") {
        return true;
    }
    entry.source == "console-api"
        && message
            .as_object()
            .and_then(|map| map.get("source"))
            .and_then(Value::as_str)
            == Some(EVENT_LOGGER_SOURCE)
}

/// One captured request joined with its success event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSummary {
    pub request_id: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub with_data: bool,
    pub request_body: Option<Value>,
    /// True when a `succ` event with the same request id exists
    pub accepted: bool,
    pub status: Option<u16>,
}

/// Joins `without_data`/`with_data` requests to `succ` events by `requestId`
///
/// Payloads that are not JSON objects are skipped; the raw events remain in
/// `events.json`.
pub fn summarize_requests(bundle: &EventBundle) -> Vec<RequestSummary> {
    let mut statuses: HashMap<String, Option<u16>> = HashMap::new();
    for event in &bundle.succ {
        if let Some(map) = event.as_object() {
            if let Some(id) = map.get("requestId").and_then(id_string) {
                let status = map
                    .get("status")
                    .or_else(|| map.get("statusCode"))
                    .and_then(Value::as_u64)
                    .and_then(|s| u16::try_from(s).ok());
                statuses.entry(id).or_insert(status);
            }
        }
    }

    let requests = bundle
        .without_data
        .iter()
        .map(|e| (e, false))
        .chain(bundle.with_data.iter().map(|e| (e, true)));

    requests
        .filter_map(|(event, with_data)| {
            let map = event.as_object()?;
            let request_id = map.get("requestId").and_then(id_string);
            let succ = request_id.as_ref().and_then(|id| statuses.get(id));

            Some(RequestSummary {
                url: map.get("url").and_then(Value::as_str).map(str::to_string),
                method: map.get("method").and_then(Value::as_str).map(str::to_string),
                with_data,
                request_body: if with_data {
                    map.get("requestBody").cloned()
                } else {
                    None
                },
                accepted: succ.is_some(),
                status: succ.copied().flatten(),
                request_id,
            })
        })
        .collect()
}

/// Request ids are strings in Chrome but are compared as text either way
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reverses the entity escaping the DOM applies to text in `innerHTML`
fn unescape_inner_html(raw: &str) -> String {
    if !raw.contains('&') || raw.contains('<') {
        return raw.to_string();
    }
    let fragment = Html::parse_fragment(raw);
    fragment.root_element().text().collect()
}
