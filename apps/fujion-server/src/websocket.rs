use std::{error::Error as StdError, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};
use fujion_page::PageRegistry;
use fujion_wire::{encode_batch, encode_invocation, ClientInvocation, RequestEnvelope, WireResult};
use metrics::{counter, gauge};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::MessageLimits,
    context,
    handlers::RequestHandler,
    request::ClientRequest,
    session::Session,
    sessions::{LifecycleEvent, Sessions},
    socket::Socket,
    telemetry::{
        METRIC_INVOCATIONS_SENT_TOTAL, METRIC_REQUESTS_TOTAL, METRIC_REQUEST_FAILURES_TOTAL,
        METRIC_SESSIONS_ACTIVE,
    },
};

pub const ERROR_TITLE: &str = "Unexpected Error";
pub const ERROR_FLAVOR: &str = "danger";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("a handler for request type `{0}` is already registered")]
    DuplicateHandler(String),
    #[error("no handler registered for request type `{0}`")]
    UnknownRequestType(String),
}

/// Drives the request/response protocol for every connected socket.
pub struct WebSocketHandler {
    sessions: Arc<Sessions>,
    pages: Arc<PageRegistry>,
    handlers: DashMap<String, Arc<dyn RequestHandler>>,
    limits: MessageLimits,
}

impl WebSocketHandler {
    pub fn new(sessions: Arc<Sessions>, pages: Arc<PageRegistry>, limits: MessageLimits) -> Self {
        Self {
            sessions,
            pages,
            handlers: DashMap::new(),
            limits,
        }
    }

    pub fn sessions(&self) -> &Arc<Sessions> {
        &self.sessions
    }

    pub fn pages(&self) -> &Arc<PageRegistry> {
        &self.pages
    }

    pub fn limits(&self) -> MessageLimits {
        self.limits
    }

    pub fn register_handler(&self, handler: Arc<dyn RequestHandler>) -> Result<(), ProtocolError> {
        match self.handlers.entry(handler.request_type().to_string()) {
            Entry::Occupied(entry) => Err(ProtocolError::DuplicateHandler(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(request_type = %entry.key(), "registered request handler");
                entry.insert(handler);
                Ok(())
            }
        }
    }

    pub fn has_handler(&self, request_type: &str) -> bool {
        self.handlers.contains_key(request_type)
    }

    /// Creates the session for a new socket and records it on the socket.
    pub fn after_connection_established(&self, socket: Arc<dyn Socket>) -> Arc<Session> {
        let session = Session::new(Arc::clone(&socket), Arc::clone(&self.pages));
        socket.attributes().attach_session(&session);
        self.sessions.register(Arc::clone(&session));
        gauge!(METRIC_SESSIONS_ACTIVE, self.sessions.len() as f64);
        info!(
            session_id = %session.id(),
            socket_id = %socket.id(),
            "websocket session established"
        );
        session
    }

    pub fn after_connection_closed(&self, socket: &dyn Socket) {
        socket.attributes().clear_fragments();
        let Some(session) = socket.attributes().session() else {
            debug!(socket_id = %socket.id(), "closed socket had no session");
            return;
        };
        if let Err(err) = self
            .sessions
            .notify_lifecycle(&session, LifecycleEvent::Destroyed)
        {
            warn!(session_id = %session.id(), error = %err, "lifecycle listener failed on close");
        }
        session.destroy();
        self.sessions.unregister(session.id());
        gauge!(METRIC_SESSIONS_ACTIVE, self.sessions.len() as f64);
        info!(
            session_id = %session.id(),
            socket_id = %socket.id(),
            "websocket session closed"
        );
    }

    pub fn handle_text_message(&self, socket: &dyn Socket, fragment: &str, is_last: bool) {
        match socket.attributes().push_text_fragment(
            fragment,
            is_last,
            self.limits.max_message_bytes,
        ) {
            Ok(Some(message)) => self.dispatch(socket, || RequestEnvelope::decode_text(&message)),
            Ok(None) => {}
            Err(err) => self.reject(socket, &err),
        }
    }

    pub fn handle_binary_message(&self, socket: &dyn Socket, fragment: &[u8], is_last: bool) {
        match socket.attributes().push_binary_fragment(
            fragment,
            is_last,
            self.limits.max_message_bytes,
        ) {
            Ok(Some(message)) => self.dispatch(socket, || {
                RequestEnvelope::decode_binary(&message, self.limits.max_preamble_bytes)
            }),
            Ok(None) => {}
            Err(err) => self.reject(socket, &err),
        }
    }

    fn dispatch(&self, socket: &dyn Socket, decode: impl FnOnce() -> WireResult<RequestEnvelope>) {
        let Some(session) = socket.attributes().session() else {
            warn!(socket_id = %socket.id(), "message received on a socket without a session");
            return;
        };
        session.touch();
        match decode() {
            Ok(envelope) => self.process(&session, envelope),
            Err(err) => {
                counter!(METRIC_REQUEST_FAILURES_TOTAL, 1, "type" => "undecodable");
                warn!(session_id = %session.id(), error = %err, "undecodable client message");
                Self::send_error(&session, &err);
            }
        }
    }

    fn reject(&self, socket: &dyn Socket, err: &(dyn StdError + 'static)) {
        warn!(socket_id = %socket.id(), error = %err, "inbound message rejected");
        if let Some(session) = socket.attributes().session() {
            Self::send_error(&session, err);
        }
    }

    /// Runs one decoded request through its handler and then drains the
    /// page's event queue. Failures are reported to the client.
    pub fn process(&self, session: &Arc<Session>, envelope: RequestEnvelope) {
        let request = ClientRequest::new(Arc::clone(session), envelope);
        let request_type = request.request_type().to_string();
        counter!(METRIC_REQUESTS_TOTAL, 1, "type" => request_type.clone());

        if let Err(err) = self.try_process(&request) {
            if let Some(page) = session.page() {
                page.clear_event_queue();
            }
            counter!(METRIC_REQUEST_FAILURES_TOTAL, 1, "type" => request_type.clone());
            warn!(
                session_id = %session.id(),
                request_type = %request_type,
                error = %format!("{err:#}"),
                "client request failed"
            );
            Self::send_error(session, &*err);
        }
    }

    fn try_process(&self, request: &ClientRequest) -> anyhow::Result<()> {
        let session = request.session();
        session.init(request.pid())?;
        let handler = self
            .handlers
            .get(request.request_type())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ProtocolError::UnknownRequestType(request.request_type().to_string()))?;

        let _scope = context::enter(request.clone());
        handler.handle(request)?;
        session.notify_request(request);
        if let Some(page) = session.page() {
            page.process_event_queue()?;
        }
        Ok(())
    }

    /// Sends one invocation to the session's client.
    pub fn send(session: &Session, invocation: &ClientInvocation) {
        let payload = encode_invocation(invocation);
        Self::write(session, payload, std::slice::from_ref(invocation));
    }

    /// Sends invocations as a single batch frame. Nothing is sent for an
    /// empty batch.
    pub fn send_all<'a, I>(session: &Session, invocations: I)
    where
        I: IntoIterator<Item = &'a ClientInvocation>,
    {
        let invocations: Vec<&ClientInvocation> = invocations.into_iter().collect();
        let Some(payload) = encode_batch(invocations.iter().copied()) else {
            return;
        };
        Self::write(session, payload, invocations.iter().copied());
    }

    fn write<'a>(
        session: &Session,
        payload: String,
        invocations: impl IntoIterator<Item = &'a ClientInvocation>,
    ) {
        match session.socket().send_text(payload) {
            Ok(()) => {
                session.touch();
                let mut sent = 0u64;
                for invocation in invocations {
                    session.notify_invocation(invocation);
                    sent += 1;
                }
                counter!(METRIC_INVOCATIONS_SENT_TOTAL, sent);
            }
            Err(err) => warn!(
                session_id = %session.id(),
                error = %err,
                "failed to send invocations"
            ),
        }
    }

    /// Shows the error's root cause and chain in a client alert.
    pub fn send_error(session: &Session, error: &(dyn StdError + 'static)) {
        let alert = ClientInvocation::alert(render_error(error), ERROR_TITLE, ERROR_FLAVOR);
        if let Err(err) = session.socket().send_text(encode_invocation(&alert)) {
            warn!(
                session_id = %session.id(),
                error = %err,
                "failed to report error to client"
            );
        }
    }
}

fn render_error(error: &(dyn StdError + 'static)) -> String {
    let chain: Vec<String> = std::iter::successors(Some(error), |&err| err.source())
        .map(ToString::to_string)
        .collect();
    let root = chain.last().cloned().unwrap_or_default();
    if chain.len() == 1 {
        return root;
    }
    let mut rendered = root;
    rendered.push_str("\n\n");
    rendered.push_str(&chain[0]);
    for cause in &chain[1..] {
        rendered.push_str("\ncaused by: ");
        rendered.push_str(cause);
    }
    rendered
}
