use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A generic event for `POST /events`: `{"type": "...", ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flattened_fields() {
        let event: EventPayload =
            serde_json::from_str(r#"{"type":"trade","symbol":"EUR/USD","volume":2000000}"#).unwrap();
        assert_eq!(event.event_type, "trade");
        assert_eq!(event.fields.len(), 2);
        assert!(!event.fields.contains_key("type"));
    }
}
