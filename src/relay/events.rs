//! Relay wire format
//!
//! Frames are JSON envelopes: `{"event": "<name>", "data": {...}}` in both
//! directions. Outbound frames are stamped with a server timestamp when the
//! caller did not supply one.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound/outbound frame
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn parse(text: &str) -> Option<Envelope> {
        serde_json::from_str(text).ok()
    }
}

/// Serialize an outbound frame
pub fn emit(event: &str, data: Value) -> String {
    serde_json::json!({ "event": event, "data": data }).to_string()
}

/// Error frame, addressed only to the offending sender
pub fn emit_error(message: &str) -> String {
    emit("error", serde_json::json!({ "message": message }))
}

/// Server-side event timestamp
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The caller's timestamp when present, otherwise the server's
pub fn timestamp_or_now(data: &Value) -> String {
    data.get("timestamp")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(now_iso)
}

/// Extract a required/optional string field
pub fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Clone a field through untouched (Null when absent)
pub fn passthrough(data: &Value, key: &str) -> Value {
    data.get(key).cloned().unwrap_or(Value::Null)
}

/// Whether a field is present and non-null
pub fn has_field(data: &Value, key: &str) -> bool {
    matches!(data.get(key), Some(v) if !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_roundtrip() {
        let text = emit("project:joined", json!({ "projectId": "p1" }));
        let envelope = Envelope::parse(&text).unwrap();
        assert_eq!(envelope.event, "project:joined");
        assert_eq!(envelope.data["projectId"], "p1");
    }

    #[test]
    fn test_missing_data_defaults_to_null() {
        let envelope = Envelope::parse(r#"{"event":"user:join"}"#).unwrap();
        assert!(envelope.data.is_null());
    }

    #[test]
    fn test_timestamp_prefers_caller() {
        let data = json!({ "timestamp": "2025-05-01T00:00:00Z" });
        assert_eq!(timestamp_or_now(&data), "2025-05-01T00:00:00Z");
        assert!(timestamp_or_now(&json!({})).ends_with('Z'));
    }

    #[test]
    fn test_has_field_ignores_null() {
        let data = json!({ "amount": 10, "reason": null });
        assert!(has_field(&data, "amount"));
        assert!(!has_field(&data, "reason"));
        assert!(!has_field(&data, "missing"));
    }
}
