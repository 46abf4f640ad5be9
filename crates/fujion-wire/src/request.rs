use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{codec::split_preamble, WireError, WireResult};

/// Reserved data key of the raw bytes that follow a binary frame's preamble.
///
/// JSON cannot carry the bytes, so they are exposed through
/// [`RequestEnvelope::blob`] and the key is always absent from `data`. A
/// preamble that supplies its own `blob` entry cannot shadow the payload.
pub const BLOB_KEY: &str = "blob";

/// A decoded client request before it is bound to a session.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub pid: String,
    pub request_type: String,
    pub data: Map<String, Value>,
    pub blob: Option<Bytes>,
}

#[derive(Deserialize)]
struct RawEnvelope {
    pid: String,
    #[serde(rename = "type")]
    request_type: String,
    #[serde(default)]
    data: Option<Map<String, Value>>,
}

impl RequestEnvelope {
    pub fn new(pid: impl Into<String>, request_type: impl Into<String>) -> Self {
        Self {
            pid: pid.into(),
            request_type: request_type.into(),
            data: Map::new(),
            blob: None,
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn from_value(value: Value) -> WireResult<Self> {
        if !value.is_object() {
            return Err(WireError::NotAnObject);
        }
        let raw: RawEnvelope = serde_json::from_value(value)?;
        let mut data = raw.data.unwrap_or_default();
        data.remove(BLOB_KEY);
        Ok(Self {
            pid: raw.pid,
            request_type: raw.request_type,
            data,
            blob: None,
        })
    }

    /// Decodes a complete text message.
    pub fn decode_text(text: &str) -> WireResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Decodes a complete binary message: JSON preamble line, then blob bytes.
    pub fn decode_binary(bytes: &[u8], max_preamble: usize) -> WireResult<Self> {
        let (preamble, rest) = split_preamble(bytes, max_preamble)?;
        let value: Value = serde_json::from_slice(&preamble)?;
        let mut envelope = Self::from_value(value)?;
        envelope.blob = Some(Bytes::copy_from_slice(rest));
        Ok(envelope)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}
