use serde_json::Value;

use crate::{
    domain::events::{AuditEvent, FraudAlert},
    shared::errors::DetectionError,
};

pub fn decode(payload: &[u8]) -> Result<AuditEvent, DetectionError> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| DetectionError::Decode(format!("invalid JSON: {e}")))?;

    // serde would happily read a struct out of a JSON array; only objects count.
    if !value.is_object() {
        return Err(DetectionError::Decode(format!(
            "expected a JSON object, found {}",
            kind(&value)
        )));
    }

    serde_json::from_value(value).map_err(|e| DetectionError::Decode(e.to_string()))
}

pub fn encode(alert: &FraudAlert) -> Vec<u8> {
    // A struct of strings and a timestamp cannot fail to serialize.
    serde_json::to_vec(alert).unwrap_or_default()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
