//! # Runners
//!
//! A [`Runner`] executes the background work behind deferred calls. Two flavours exist, and
//! the flavour decides what cancellation can do:
//!
//! * **[`TaskRunner`]**: spawns the work as a tokio task and hands back its [`JoinHandle`],
//!   so deferred handles can abort it.
//! * **[`DetachedRunner`]**: fire-and-forget. The work reports its own completion and there is
//!   nothing to cancel.
//!
//! Tokio tasks never keep the process alive on their own, so neither runner blocks shutdown.
use futures_util::future::BoxFuture;
use std::{fmt, sync::Arc};
use tokio::{
    runtime::{Handle, TryCurrentError},
    task::JoinHandle,
};

/// A unit of background work.
pub type Work = BoxFuture<'static, ()>;

/// What a runner hands back for a submitted unit of work.
#[derive(Debug)]
pub enum Submission {
    /// The work runs as a task that can be aborted.
    Task(JoinHandle<()>),
    /// The work was handed off with no way to reach it again.
    Detached,
}

/// Executes units of work in the background.
pub trait Runner: Send + Sync + 'static {
    fn submit(&self, work: Work) -> Submission;
}

/// Spawns work on a tokio runtime and keeps the task handle.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    handle: Handle,
}

impl TaskRunner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl Runner for TaskRunner {
    fn submit(&self, work: Work) -> Submission {
        Submission::Task(self.handle.spawn(work))
    }
}

/// Fire-and-forget execution through an arbitrary executor function.
#[derive(Clone)]
pub struct DetachedRunner {
    execute: Arc<dyn Fn(Work) + Send + Sync>,
}

impl DetachedRunner {
    pub fn new(execute: impl Fn(Work) + Send + Sync + 'static) -> Self {
        Self {
            execute: Arc::new(execute),
        }
    }

    /// Spawns onto a tokio runtime and drops the task handle.
    pub fn spawning_on(handle: Handle) -> Self {
        Self::new(move |work| {
            handle.spawn(work);
        })
    }

    /// Uses the runtime the caller is running on.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::spawning_on)
    }
}

impl Runner for DetachedRunner {
    fn submit(&self, work: Work) -> Submission {
        (self.execute)(work);
        Submission::Detached
    }
}

impl fmt::Debug for DetachedRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetachedRunner").finish_non_exhaustive()
    }
}

/// Either runner, chosen at runtime (e.g. from configuration).
#[derive(Debug, Clone)]
pub enum AnyRunner {
    Task(TaskRunner),
    Detached(DetachedRunner),
}

impl Runner for AnyRunner {
    fn submit(&self, work: Work) -> Submission {
        match self {
            AnyRunner::Task(runner) => runner.submit(work),
            AnyRunner::Detached(runner) => runner.submit(work),
        }
    }
}
