use std::sync::Arc;

use bytes::Bytes;
use fujion_page::Page;
use fujion_wire::RequestEnvelope;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::session::Session;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("missing request parameter `{0}`")]
    MissingParameter(String),
    #[error("invalid request parameter `{name}`: {source}")]
    InvalidParameter {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("session {0} is not bound to a page")]
    NoPage(String),
}

/// A decoded request bound to the session it arrived on.
#[derive(Clone)]
pub struct ClientRequest {
    session: Arc<Session>,
    envelope: RequestEnvelope,
}

impl std::fmt::Debug for ClientRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRequest")
            .field("session", &self.session.id())
            .field("pid", &self.envelope.pid)
            .field("type", &self.envelope.request_type)
            .finish_non_exhaustive()
    }
}

impl ClientRequest {
    pub fn new(session: Arc<Session>, envelope: RequestEnvelope) -> Self {
        Self { session, envelope }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn page(&self) -> Option<Arc<Page>> {
        self.session.page()
    }

    /// The bound page, or an error when the session has none.
    pub fn require_page(&self) -> Result<Arc<Page>, RequestError> {
        self.page()
            .ok_or_else(|| RequestError::NoPage(self.session.id().to_string()))
    }

    pub fn pid(&self) -> &str {
        &self.envelope.pid
    }

    pub fn request_type(&self) -> &str {
        &self.envelope.request_type
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.envelope.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.envelope.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Bytes that followed the preamble of a binary message. This is the
    /// value of the reserved `blob` key, which `get` never returns.
    pub fn blob(&self) -> Option<&Bytes> {
        self.envelope.blob.as_ref()
    }

    /// Deserializes an optional parameter. `null` counts as absent.
    pub fn param<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RequestError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| RequestError::InvalidParameter {
                    name: key.to_string(),
                    source,
                }),
        }
    }

    pub fn required<T: DeserializeOwned>(&self, key: &str) -> Result<T, RequestError> {
        self.param(key)?
            .ok_or_else(|| RequestError::MissingParameter(key.to_string()))
    }
}
