//! Splunk webhook payload.
//!
//! Splunk alert actions post arbitrary JSON, so the event is kept as an
//! ordered field map and every lookup returns an absent marker instead of
//! failing.

use serde_json::{Map, Value};

/// Field name used when the body is not a JSON object.
pub const RAW_BODY_FIELD: &str = "raw_body";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplunkEvent {
    fields: Map<String, Value>,
}

impl SplunkEvent {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Decodes a raw request body.
    ///
    /// An empty body is an empty event; anything that is not a JSON object is
    /// wrapped as `{"raw_body": <text>}`.
    pub fn from_body(body: &[u8]) -> Self {
        if body.is_empty() {
            return Self::default();
        }
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => Self { fields },
            _ => {
                let mut fields = Map::new();
                fields.insert(
                    RAW_BODY_FIELD.to_string(),
                    Value::String(String::from_utf8_lossy(body).into_owned()),
                );
                Self { fields }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the field as a non-empty trimmed string, if it is one.
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Plain-text form of a JSON value: strings without quotes, everything else
/// as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
