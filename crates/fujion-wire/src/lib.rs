//! Wire contract between the Fujion server and the browser runtime.
//!
//! Client to server: a JSON object carrying at least `pid` and `type`, either
//! as a text frame or as a binary frame whose first line is the JSON preamble
//! and whose remaining bytes form the request blob.
//!
//! Server to client: one serialized [`ClientInvocation`] per frame, or a JSON
//! array of invocations for a batch.

mod codec;
mod fragment;
mod invocation;
mod request;

pub use codec::{encode_batch, encode_invocation, split_preamble};
pub use fragment::{BinaryAssembler, Fragment, FragmentAssembler, TextAssembler};
pub use invocation::{ClientInvocation, ALERT_FUNCTION};
pub use request::{RequestEnvelope, BLOB_KEY};

use thiserror::Error;

/// Upper bound for the JSON preamble of a binary frame.
pub const DEFAULT_MAX_PREAMBLE_BYTES: usize = 64 * 1024;
/// Upper bound for a reassembled inbound message.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid request payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("request payload must be a JSON object")]
    NotAnObject,
    #[error("binary preamble exceeds {0} bytes")]
    PreambleTooLarge(usize),
    #[error("message exceeds {limit} bytes")]
    MessageTooLarge { limit: usize },
}

pub type WireResult<T> = Result<T, WireError>;
