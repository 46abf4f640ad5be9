use std::future::Future;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::{runtime::Handle, task::JoinSet};
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("session executor has been shut down")]
    Shutdown,
    #[error("no tokio runtime is available to run session work")]
    NoRuntime,
}

/// Background work owned by one session. Shutting down aborts whatever is
/// still running.
#[derive(Debug)]
pub struct SessionExecutor {
    tasks: Mutex<Option<JoinSet<()>>>,
}

impl Default for SessionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionExecutor {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Some(JoinSet::new())),
        }
    }

    pub fn spawn<F>(&self, future: F) -> Result<(), ExecutorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;
        let mut guard = self.tasks.lock();
        let tasks = guard.as_mut().ok_or(ExecutorError::Shutdown)?;
        reap_finished(tasks);
        tasks.spawn_on(future, &handle);
        Ok(())
    }

    /// Runs blocking work on the runtime's blocking pool.
    pub fn execute<F>(&self, job: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;
        let mut guard = self.tasks.lock();
        let tasks = guard.as_mut().ok_or(ExecutorError::Shutdown)?;
        reap_finished(tasks);
        tasks.spawn_blocking_on(job, &handle);
        Ok(())
    }

    /// Tasks spawned and not yet finished.
    pub fn outstanding(&self) -> usize {
        self.tasks
            .lock()
            .as_mut()
            .map(|tasks| {
                reap_finished(tasks);
                tasks.len()
            })
            .unwrap_or(0)
    }

    /// Aborts outstanding work and refuses new work. Returns the number of
    /// tasks that had not finished.
    pub fn shutdown_now(&self) -> usize {
        let Some(mut tasks) = self.tasks.lock().take() else {
            return 0;
        };
        reap_finished(&mut tasks);
        let outstanding = tasks.len();
        tasks.abort_all();
        debug!(outstanding, "session executor shut down");
        outstanding
    }

    pub fn is_shutdown(&self) -> bool {
        self.tasks.lock().is_none()
    }
}

fn reap_finished(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(err) = result {
            if err.is_panic() {
                debug!(error = %err, "session task panicked");
            }
        }
    }
}
