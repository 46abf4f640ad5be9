//! Per-thread record of the request currently being dispatched.
//!
//! Handlers run synchronously on the connection task, so code reached from a
//! handler can look up its request without having it passed down.

use std::{cell::RefCell, marker::PhantomData, sync::Arc};

use crate::{request::ClientRequest, session::Session};

thread_local! {
    static CURRENT: RefCell<Option<ExecutionContext>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    request: ClientRequest,
    processing: bool,
}

impl ExecutionContext {
    pub fn request(&self) -> &ClientRequest {
        &self.request
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }
}

/// Clears the context when dropped. Not `Send`: it must stay on the thread
/// that entered it.
#[must_use = "the execution context is cleared when the scope is dropped"]
pub struct ExecutionScope {
    _not_send: PhantomData<*const ()>,
}

impl Drop for ExecutionScope {
    fn drop(&mut self) {
        CURRENT.with(|current| current.borrow_mut().take());
    }
}

/// Replaces whatever context the thread held with one for `request`.
pub fn enter(request: ClientRequest) -> ExecutionScope {
    CURRENT.with(|current| {
        *current.borrow_mut() = Some(ExecutionContext {
            request,
            processing: true,
        });
    });
    ExecutionScope {
        _not_send: PhantomData,
    }
}

pub fn current() -> Option<ExecutionContext> {
    CURRENT.with(|current| current.borrow().clone())
}

pub fn current_session() -> Option<Arc<Session>> {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .map(|context| Arc::clone(context.request.session()))
    })
}

pub fn is_processing() -> bool {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .map(ExecutionContext::is_processing)
            .unwrap_or(false)
    })
}
