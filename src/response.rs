//! Recorded response snapshot

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::request::body_base64;
use crate::{Result, TapedeckError};

/// HTTP response served on playback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Response body
    #[serde(default, with = "body_base64")]
    pub body: Vec<u8>,
    /// Whether the body was delivered with chunked transfer encoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunked: Option<bool>,
}

impl Response {
    /// Create a response with no headers and an empty body
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            chunked: None,
        }
    }

    /// Append a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Plain record suitable for persistence
    #[must_use]
    pub fn to_record(&self) -> Value {
        let mut record = json!({
            "status": self.status,
            "headers": self.headers,
            "body": body_base64::encode(&self.body),
        });
        if let Some(chunked) = self.chunked {
            record["chunked"] = Value::Bool(chunked);
        }
        record
    }

    /// Rebuild a response from a record produced by [`Response::to_record`]
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if a required field is absent or has the
    /// wrong shape
    pub fn from_record(record: &Value) -> Result<Self> {
        Self::deserialize(record)
            .map_err(|e| TapedeckError::MalformedRecord(format!("response: {e}")))
    }
}
