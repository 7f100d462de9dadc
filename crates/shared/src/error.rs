use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error body the colorize service returns alongside a non-success status.
///
/// `detail` is usually a plain string, but validation failures carry a list
/// of objects, so it is kept as raw JSON and rendered on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceErrorBody {
    pub detail: Value,
}

impl ServiceErrorBody {
    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Error)]
#[error("malformed service payload: {message}")]
pub struct ProtocolException {
    pub message: String,
}

impl ProtocolException {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ProtocolException {
    fn from(value: serde_json::Error) -> Self {
        Self::new(value.to_string())
    }
}
