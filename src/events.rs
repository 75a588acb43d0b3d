use std::borrow::Cow;

use serde::de::{Deserialize, Deserializer};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const UNKNOWN_SOURCE: &str = "Unknown Source";
pub const UNKNOWN_DETAIL_TYPE: &str = "Unknown DetailType";
pub const NO_DETAILS: &str = "No details provided.";

/// The raw invocation payload. Any JSON is accepted; only objects carry
/// fields, anything else behaves like an empty event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvocationEvent(Map<String, Value>);

impl<'de> Deserialize<'de> for InvocationEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw_value: Value = Deserialize::deserialize(deserializer)?;
        debug!("raw_value: {:?}", raw_value);
        Ok(InvocationEvent::from(raw_value))
    }
}

impl From<Value> for InvocationEvent {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => InvocationEvent(map),
            other => {
                warn!("event payload is not a JSON object, treating it as empty: {other}");
                InvocationEvent::default()
            }
        }
    }
}

/// Fields the notification is built from, with placeholders substituted.
/// Values keep their JSON type so malformed inputs pass through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFields {
    pub source: Value,
    pub detail_type: Value,
    pub message: Value,
}

impl InvocationEvent {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn fields(&self) -> EventFields {
        let or = |value: Option<&Value>, placeholder: &str| {
            value
                .cloned()
                .unwrap_or_else(|| Value::String(placeholder.to_string()))
        };

        let message = self
            .get("detail")
            .and_then(Value::as_object)
            .and_then(|detail| detail.get("message"))
            .filter(|v| !v.is_null());

        EventFields {
            source: or(self.get("source"), UNKNOWN_SOURCE),
            detail_type: or(self.get("detail-type"), UNKNOWN_DETAIL_TYPE),
            message: or(message, NO_DETAILS),
        }
    }
}

/// Renders a field for human-readable text: strings verbatim, anything else
/// as compact JSON.
pub fn display_value(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}
