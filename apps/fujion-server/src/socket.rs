use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use fujion_wire::{BinaryAssembler, TextAssembler, WireResult};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::session::Session;

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("socket {0} is closed")]
    Closed(String),
}

/// One client connection as seen by the protocol engine.
pub trait Socket: Send + Sync {
    fn id(&self) -> &str;

    /// Queues a text frame for delivery to the client.
    fn send_text(&self, payload: String) -> Result<(), SocketError>;

    fn attributes(&self) -> &SocketAttributes;

    fn is_open(&self) -> bool;

    fn close(&self);
}

/// Per-socket state: the owning session and partially received messages.
#[derive(Default)]
pub struct SocketAttributes {
    session: Mutex<Option<Weak<Session>>>,
    text: Mutex<Option<TextAssembler>>,
    binary: Mutex<Option<BinaryAssembler>>,
}

impl fmt::Debug for SocketAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketAttributes")
            .field("has_session", &self.has_session())
            .field("pending_fragments", &self.has_pending_fragments())
            .finish()
    }
}

impl SocketAttributes {
    pub fn attach_session(&self, session: &Arc<Session>) {
        *self.session.lock() = Some(Arc::downgrade(session));
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Removes the session reference. Returns whether one was present.
    pub fn detach_session(&self) -> bool {
        self.session.lock().take().is_some()
    }

    pub fn has_session(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Buffers a text fragment and returns the whole message on the last one.
    pub fn push_text_fragment(
        &self,
        fragment: &str,
        is_last: bool,
        max_bytes: usize,
    ) -> WireResult<Option<String>> {
        let mut slot = self.text.lock();
        let assembler = slot.get_or_insert_with(|| TextAssembler::new(max_bytes));
        let result = assembler.push(fragment, is_last);
        if !matches!(result, Ok(None)) {
            slot.take();
        }
        result
    }

    /// Buffers a binary fragment and returns the whole message on the last one.
    pub fn push_binary_fragment(
        &self,
        fragment: &[u8],
        is_last: bool,
        max_bytes: usize,
    ) -> WireResult<Option<Vec<u8>>> {
        let mut slot = self.binary.lock();
        let assembler = slot.get_or_insert_with(|| BinaryAssembler::new(max_bytes));
        let result = assembler.push(fragment, is_last);
        if !matches!(result, Ok(None)) {
            slot.take();
        }
        result
    }

    pub fn has_pending_fragments(&self) -> bool {
        self.text.lock().is_some() || self.binary.lock().is_some()
    }

    pub fn clear_fragments(&self) {
        self.text.lock().take();
        self.binary.lock().take();
    }
}

/// Socket backed by an unbounded channel drained by a connection writer task.
pub struct ChannelSocket {
    id: String,
    sender: mpsc::UnboundedSender<String>,
    attributes: SocketAttributes,
    open: AtomicBool,
}

impl ChannelSocket {
    pub fn new(id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let socket = Self {
            id: id.into(),
            sender,
            attributes: SocketAttributes::default(),
            open: AtomicBool::new(true),
        };
        (socket, receiver)
    }
}

impl Socket for ChannelSocket {
    fn id(&self) -> &str {
        &self.id
    }

    fn send_text(&self, payload: String) -> Result<(), SocketError> {
        if !self.is_open() {
            return Err(SocketError::Closed(self.id.clone()));
        }
        self.sender
            .send(payload)
            .map_err(|_| SocketError::Closed(self.id.clone()))
    }

    fn attributes(&self) -> &SocketAttributes {
        &self.attributes
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.sender.is_closed()
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}
