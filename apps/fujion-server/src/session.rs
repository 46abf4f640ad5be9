use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use fujion_page::{Page, PageRegistry};
use fujion_wire::ClientInvocation;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    executor::{ExecutorError, SessionExecutor},
    request::ClientRequest,
    socket::Socket,
    synchronizer::Synchronizer,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("page `{0}` is not registered")]
    UnknownPage(String),
    #[error("session is bound to page `{bound}`, not `{requested}`")]
    PageMismatch { bound: String, requested: String },
    #[error("session {0} has been destroyed")]
    Destroyed(String),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Initialized,
    Destroyed,
}

/// Observer of one session's traffic. Failures are logged and never reach
/// the client.
pub trait SessionListener: Send + Sync {
    fn on_request(&self, _session: &Session, _request: &ClientRequest) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_invocation(
        &self,
        _session: &Session,
        _invocation: &ClientInvocation,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_destroy(&self, _session: &Session) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Server-side state of one websocket connection and the page it drives.
pub struct Session {
    id: String,
    created_at: OffsetDateTime,
    last_activity: AtomicU64,
    socket: Arc<dyn Socket>,
    synchronizer: Arc<Synchronizer>,
    executor: SessionExecutor,
    pages: Arc<PageRegistry>,
    page: RwLock<Option<Arc<Page>>>,
    state: Mutex<SessionState>,
    listeners: RwLock<Vec<Arc<dyn SessionListener>>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("socket", &self.socket.id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(socket: Arc<dyn Socket>, pages: Arc<PageRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|session| Session {
            id: socket.id().to_string(),
            created_at: OffsetDateTime::now_utc(),
            last_activity: AtomicU64::new(now_millis()),
            socket,
            synchronizer: Arc::new(Synchronizer::new(session.clone())),
            executor: SessionExecutor::new(),
            pages,
            page: RwLock::new(None),
            state: Mutex::new(SessionState::Created),
            listeners: RwLock::new(Vec::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn creation_time(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Milliseconds since the epoch of the last inbound or outbound message.
    pub fn last_activity(&self) -> u64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    pub fn touch(&self) {
        self.last_activity.fetch_max(now_millis(), Ordering::Relaxed);
    }

    pub fn socket(&self) -> &Arc<dyn Socket> {
        &self.socket
    }

    pub fn synchronizer(&self) -> &Arc<Synchronizer> {
        &self.synchronizer
    }

    pub fn page(&self) -> Option<Arc<Page>> {
        self.page.read().clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Binds the session to page `pid` on first use. Returns `true` when this
    /// call performed the binding; repeats with the same id return `false`.
    pub fn init(&self, pid: &str) -> Result<bool, SessionError> {
        let mut state = self.state.lock();
        match *state {
            SessionState::Destroyed => Err(SessionError::Destroyed(self.id.clone())),
            SessionState::Initialized => {
                let bound = self.page.read().as_ref().map(|page| page.id().to_string());
                match bound {
                    Some(bound) if bound == pid => Ok(false),
                    Some(bound) => Err(SessionError::PageMismatch {
                        bound,
                        requested: pid.to_string(),
                    }),
                    None => Err(SessionError::UnknownPage(pid.to_string())),
                }
            }
            SessionState::Created => {
                let page = self
                    .pages
                    .get(pid)
                    .ok_or_else(|| SessionError::UnknownPage(pid.to_string()))?;
                page.bind(self.synchronizer.clone());
                *self.page.write() = Some(page);
                *state = SessionState::Initialized;
                info!(session_id = %self.id, page_id = %pid, "session bound to page");
                Ok(true)
            }
        }
    }

    /// Tears the session down. Safe to call more than once.
    pub fn destroy(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), SessionState::Destroyed);
        match previous {
            SessionState::Destroyed => {}
            SessionState::Created => {
                self.socket.attributes().detach_session();
                self.executor.shutdown_now();
                debug!(session_id = %self.id, "uninitialized session destroyed");
            }
            SessionState::Initialized => {
                self.synchronizer.start_queueing();
                if let Some(page) = self.page() {
                    page.destroy();
                    self.pages.unregister(page.id());
                }
                self.socket.attributes().detach_session();
                self.executor.shutdown_now();
                self.page.write().take();
                for listener in self.listeners() {
                    if let Err(err) = listener.on_destroy(self) {
                        warn!(session_id = %self.id, error = %err, "session listener failed on destroy");
                    }
                }
                info!(session_id = %self.id, "session destroyed");
            }
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.state() == SessionState::Destroyed
    }

    pub fn spawn<F>(&self, future: F) -> Result<(), SessionError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Ok(self.executor.spawn(future)?)
    }

    pub fn execute<F>(&self, job: F) -> Result<(), SessionError>
    where
        F: FnOnce() + Send + 'static,
    {
        Ok(self.executor.execute(job)?)
    }

    pub fn executor(&self) -> &SessionExecutor {
        &self.executor
    }

    pub fn add_session_listener(&self, listener: Arc<dyn SessionListener>) {
        self.listeners.write().push(listener);
    }

    /// Removes a listener previously added. Returns whether it was found.
    pub fn remove_session_listener(&self, listener: &Arc<dyn SessionListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
        listeners.len() != before
    }

    pub(crate) fn notify_request(&self, request: &ClientRequest) {
        for listener in self.listeners() {
            if let Err(err) = listener.on_request(self, request) {
                warn!(session_id = %self.id, error = %err, "session listener failed on request");
            }
        }
    }

    pub(crate) fn notify_invocation(&self, invocation: &ClientInvocation) {
        for listener in self.listeners() {
            if let Err(err) = listener.on_invocation(self, invocation) {
                warn!(session_id = %self.id, error = %err, "session listener failed on invocation");
            }
        }
    }

    fn listeners(&self) -> Vec<Arc<dyn SessionListener>> {
        self.listeners.read().clone()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
