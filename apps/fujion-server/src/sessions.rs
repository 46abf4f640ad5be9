use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::warn;

use crate::session::Session;

/// Raised by a lifecycle listener to veto a session during initialization.
#[derive(Debug, Error)]
#[error("session initialization rejected: {reason}")]
pub struct SessionInitError {
    reason: String,
}

impl SessionInitError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Init(#[from] SessionInitError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Created,
    Destroyed,
}

/// Application-wide observer of session creation and destruction.
pub trait SessionLifecycle: Send + Sync {
    fn on_session_create(&self, _session: &Arc<Session>) -> Result<(), LifecycleError> {
        Ok(())
    }

    fn on_session_destroy(&self, _session: &Arc<Session>) -> Result<(), LifecycleError> {
        Ok(())
    }
}

/// Live sessions by id, plus the lifecycle listeners notified about them.
#[derive(Default)]
pub struct Sessions {
    sessions: DashMap<String, Arc<Session>>,
    listeners: RwLock<Vec<Arc<dyn SessionLifecycle>>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: Arc<Session>) {
        self.sessions.insert(session.id().to_string(), session);
    }

    pub fn unregister(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn all(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn add_lifecycle_listener(&self, listener: Arc<dyn SessionLifecycle>) {
        self.listeners.write().push(listener);
    }

    pub fn remove_lifecycle_listener(&self, listener: &Arc<dyn SessionLifecycle>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
        listeners.len() != before
    }

    /// Notifies every lifecycle listener. Only an initialization veto raised
    /// during creation is returned; anything else is logged.
    pub fn notify_lifecycle(
        &self,
        session: &Arc<Session>,
        event: LifecycleEvent,
    ) -> Result<(), SessionInitError> {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            let result = match event {
                LifecycleEvent::Created => listener.on_session_create(session),
                LifecycleEvent::Destroyed => listener.on_session_destroy(session),
            };
            match result {
                Ok(()) => {}
                Err(LifecycleError::Init(err)) if event == LifecycleEvent::Created => {
                    return Err(err)
                }
                Err(err) => warn!(
                    session_id = %session.id(),
                    event = ?event,
                    error = %err,
                    "session lifecycle listener failed"
                ),
            }
        }
        Ok(())
    }
}
