use std::sync::Weak;

use fujion_page::InvocationSink;
use fujion_wire::ClientInvocation;
use parking_lot::{Mutex, ReentrantMutex};
use tracing::debug;

use crate::{session::Session, websocket::WebSocketHandler};

#[derive(Debug, Default)]
struct QueueState {
    depth: usize,
    pending: Vec<ClientInvocation>,
}

/// Outbound invocation path of a session. While queueing, invocations are
/// held back and flushed as one batch when the outermost bracket closes.
///
/// `send` is taken before `queue` and held across the socket write, so
/// frames reach the socket in the order their invocations were made.
#[derive(Debug)]
pub struct Synchronizer {
    session: Weak<Session>,
    queue: Mutex<QueueState>,
    send: ReentrantMutex<()>,
}

impl Synchronizer {
    pub(crate) fn new(session: Weak<Session>) -> Self {
        Self {
            session,
            queue: Mutex::new(QueueState::default()),
            send: ReentrantMutex::new(()),
        }
    }

    pub fn start_queueing(&self) {
        self.queue.lock().depth += 1;
    }

    /// Closes one queueing bracket, sending everything queued once none
    /// remain open.
    pub fn stop_queueing(&self) {
        let _send = self.send.lock();
        let batch = {
            let mut queue = self.queue.lock();
            queue.depth = queue.depth.saturating_sub(1);
            if queue.depth > 0 || queue.pending.is_empty() {
                return;
            }
            std::mem::take(&mut queue.pending)
        };
        match self.session.upgrade() {
            Some(session) => WebSocketHandler::send_all(&session, &batch),
            None => debug!(
                dropped = batch.len(),
                "session released before queued invocations were sent"
            ),
        }
    }

    pub fn is_queueing(&self) -> bool {
        self.queue.lock().depth > 0
    }

    /// Discards queued invocations without sending them.
    pub fn clear(&self) {
        self.queue.lock().pending.clear();
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().pending.len()
    }
}

impl InvocationSink for Synchronizer {
    fn invoke(&self, invocation: ClientInvocation) {
        let _send = self.send.lock();
        {
            let mut queue = self.queue.lock();
            if queue.depth > 0 {
                queue.pending.push(invocation);
                return;
            }
        }
        match self.session.upgrade() {
            Some(session) => WebSocketHandler::send(&session, &invocation),
            None => debug!(
                function = invocation.function(),
                "session released; dropping invocation"
            ),
        }
    }
}
