use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// A typed, dotted-namespace event carried on the bus.
///
/// `event_type` is the routing key (e.g. `dialogue.user_message`); `data`
/// carries the payload as a JSON object so producers and consumers don't
/// need to share a compiled type.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: String,
    pub data: Map<String, Value>,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: Map<String, Value>, source: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            source: source.into(),
            timestamp: Utc::now(),
        }
    }

    /// Builds an event from any serializable payload, flattening it into the
    /// `data` map. Non-object payloads are wrapped under a `"value"` key.
    pub fn with_payload(
        event_type: impl Into<String>,
        source: impl Into<String>,
        payload: impl serde::Serialize,
    ) -> Self {
        let value = serde_json::to_value(payload).unwrap_or(Value::Null);
        let data = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self::new(event_type, data, source)
    }
}
