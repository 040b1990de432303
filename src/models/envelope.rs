//! The uniform result shape returned by every operation.

use crate::error::DbError;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// Success with data, success with only a message, or failure with an error.
///
/// Serializes flat: `{"success": .., "error"?: .., "message"?: .., ...payload}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, JsonValue>,
}

impl ResultEnvelope {
    /// Wrap a handler's output. A top-level `message` field is lifted out of the
    /// payload; everything else is carried as is.
    pub fn from_output<T: Serialize>(output: &T) -> Self {
        match serde_json::to_value(output) {
            Ok(JsonValue::Object(mut payload)) => {
                let message = match payload.remove("message") {
                    Some(JsonValue::String(m)) => Some(m),
                    Some(JsonValue::Null) | None => None,
                    Some(other) => {
                        payload.insert("message".to_string(), other);
                        None
                    }
                };
                Self {
                    success: true,
                    error: None,
                    message,
                    payload,
                }
            }
            Ok(other) => {
                let mut payload = Map::new();
                payload.insert("result".to_string(), other);
                Self {
                    success: true,
                    error: None,
                    message: None,
                    payload,
                }
            }
            Err(e) => Self::failure(&DbError::internal(format!(
                "Failed to serialize result: {e}"
            ))),
        }
    }

    /// A failure describing `err`. Server errors also carry their SQLSTATE,
    /// and a `suggestion` is added whenever the error has one.
    pub fn failure(err: &DbError) -> Self {
        let mut payload = Map::new();
        if let Some(code) = err.sql_state() {
            payload.insert("sql_state".to_string(), JsonValue::from(code));
        }
        if let Some(suggestion) = err.suggestion() {
            payload.insert("suggestion".to_string(), JsonValue::from(suggestion));
        }
        Self {
            success: false,
            error: Some(err.to_string()),
            message: None,
            payload,
        }
    }

    /// Look up a payload field.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.payload.get(key)
    }

    /// Render as indented JSON text, the form handed back to callers.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!(r#"{{"success": false, "error": "Failed to serialize result: {e}"}}"#)
        })
    }
}
