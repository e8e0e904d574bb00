//! # Deferred Results
//!
//! A [`DeferredHandle`] is what a method declared as `Deferred<T>` returns: a shared handle to
//! a result that is produced in the background by a [`Runner`].
//!
//! ## States
//!
//! ```text
//! Pending ──▶ Completed(value)
//!    │  ╰───▶ Failed(error)
//!    ╰──────▶ Cancelled
//! ```
//!
//! A handle settles at most once. The first terminal state wins and every later attempt to
//! settle it is ignored, so a settled value is cached and [`DeferredHandle::get`] never runs
//! the work again.
//!
//! ## Cancellation
//!
//! Only handles backed by a task ([`Submission::Task`]) can be cancelled. Handles whose work was
//! handed to a fire-and-forget runner report `false` from [`DeferredHandle::cancel`].
use crate::{
    rest::transport::TransportError,
    runner::{Runner, Submission},
};
use futures_util::FutureExt;
use serde_json::Value;
use std::{
    any::Any,
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::sync::watch;

/// The state of a deferred result.
#[derive(Debug, Clone)]
pub enum DeferredState<T> {
    Pending,
    Completed(T),
    Failed(Arc<WorkFailure>),
    Cancelled,
}

impl<T> DeferredState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, DeferredState::Pending)
    }
}

/// Why the background work of a deferred call did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum WorkFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Deferred work panicked: '{0}'")]
    Panicked(String),
    #[error("Deferred work was dropped before it completed")]
    Abandoned,
}

/// Errors returned when reading a deferred result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeferredError {
    #[error("The deferred handle was never submitted for execution, run it through a client first")]
    NotStarted,
    #[error("Deferred work failed: '{0}'")]
    Execution(#[source] Arc<WorkFailure>),
    #[error("Deferred work was cancelled")]
    Cancelled,
    #[error("Timed out after {0:?} waiting for deferred work")]
    Timeout(Duration),
}

struct Shared<T> {
    state: watch::Sender<DeferredState<T>>,
    submission: OnceLock<Submission>,
}

/// A result that is being produced in the background.
///
/// Cloning the handle is cheap and every clone observes the same state.
pub struct DeferredHandle<T = Value> {
    shared: Arc<Shared<T>>,
}

impl<T> DeferredHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a handle that has not been submitted to any runner.
    ///
    /// Reading from it fails with [`DeferredError::NotStarted`].
    pub fn new() -> Self {
        let (state, _) = watch::channel(DeferredState::Pending);
        Self {
            shared: Arc::new(Shared {
                state,
                submission: OnceLock::new(),
            }),
        }
    }

    /// Submits `work` to `runner` and returns the handle tracking its result.
    ///
    /// Failures and panics of the work are recorded in the handle instead of surfacing on the
    /// runner.
    pub fn submit<R, F, E>(runner: &R, work: F) -> Self
    where
        R: Runner + ?Sized,
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<WorkFailure>,
    {
        let handle = Self::new();
        let completer = Completer {
            shared: Arc::clone(&handle.shared),
        };

        let work = async move {
            let state = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(value)) => DeferredState::Completed(value),
                Ok(Err(err)) => DeferredState::Failed(Arc::new(err.into())),
                Err(panic) => DeferredState::Failed(Arc::new(WorkFailure::Panicked(
                    panic_message(panic.as_ref()),
                ))),
            };
            completer.settle(state);
        }
        .boxed();

        let submission = runner.submit(work);
        // The lock was created above and nobody else can have filled it.
        let _ = handle.shared.submission.set(submission);
        handle
    }

    /// Attempts to cancel the work.
    ///
    /// Returns `true` if the handle moved from pending to cancelled. When `interrupt_if_running`
    /// is set the backing task is also aborted; otherwise it runs to completion and its result
    /// is discarded.
    pub fn cancel(&self, interrupt_if_running: bool) -> bool {
        let Some(Submission::Task(task)) = self.shared.submission.get() else {
            return false;
        };

        let cancelled = settle(&self.shared.state, DeferredState::Cancelled);
        if cancelled && interrupt_if_running {
            task.abort();
        }
        cancelled
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(*self.shared.state.borrow(), DeferredState::Cancelled)
    }

    /// Whether the handle settled, by completing, failing or being cancelled.
    pub fn is_done(&self) -> bool {
        !self.shared.state.borrow().is_pending()
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> DeferredState<T> {
        self.shared.state.borrow().clone()
    }

    /// Reads the result without waiting. `Ok(None)` means the work is still pending.
    pub fn try_get(&self) -> Result<Option<T>, DeferredError> {
        self.ensure_submitted()?;
        settled(&self.shared.state.borrow()).transpose()
    }

    /// Waits for the result.
    pub async fn get(&self) -> Result<T, DeferredError> {
        self.ensure_submitted()?;
        let mut rx = self.shared.state.subscribe();
        loop {
            if let Some(outcome) = settled(&rx.borrow_and_update()) {
                return outcome;
            }
            rx.changed()
                .await
                .map_err(|_| DeferredError::Execution(Arc::new(WorkFailure::Abandoned)))?;
        }
    }

    /// Waits for the result for at most `timeout`.
    pub async fn get_timeout(&self, timeout: Duration) -> Result<T, DeferredError> {
        self.ensure_submitted()?;
        tokio::time::timeout(timeout, self.get())
            .await
            .map_err(|_| DeferredError::Timeout(timeout))?
    }

    fn ensure_submitted(&self) -> Result<(), DeferredError> {
        match self.shared.submission.get() {
            Some(_) => Ok(()),
            None => Err(DeferredError::NotStarted),
        }
    }
}

impl<T> Default for DeferredHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for DeferredHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DeferredHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredHandle")
            .field("state", &*self.shared.state.borrow())
            .field("submission", &self.shared.submission.get())
            .finish()
    }
}

/// The worker's side of a handle. Dropping it before settling marks the work abandoned.
struct Completer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Completer<T> {
    fn settle(&self, state: DeferredState<T>) {
        settle(&self.shared.state, state);
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        settle(
            &self.shared.state,
            DeferredState::Failed(Arc::new(WorkFailure::Abandoned)),
        );
    }
}

/// Moves a pending state to `next`. Returns whether the transition happened.
fn settle<T>(state: &watch::Sender<DeferredState<T>>, next: DeferredState<T>) -> bool {
    state.send_if_modified(|current| {
        if current.is_pending() {
            *current = next;
            true
        } else {
            false
        }
    })
}

/// The outcome a settled state delivers, `None` while pending.
fn settled<T: Clone>(state: &DeferredState<T>) -> Option<Result<T, DeferredError>> {
    match state {
        DeferredState::Pending => None,
        DeferredState::Completed(value) => Some(Ok(value.clone())),
        DeferredState::Failed(failure) => {
            Some(Err(DeferredError::Execution(Arc::clone(failure))))
        }
        DeferredState::Cancelled => Some(Err(DeferredError::Cancelled)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{DetachedRunner, TaskRunner};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    fn task_runner() -> TaskRunner {
        TaskRunner::current().unwrap()
    }

    #[tokio::test]
    async fn unsubmitted_handle_reports_not_started() {
        let handle: DeferredHandle<u32> = DeferredHandle::new();

        assert!(matches!(handle.get().await, Err(DeferredError::NotStarted)));
        assert!(matches!(handle.try_get(), Err(DeferredError::NotStarted)));
        assert!(matches!(
            handle.get_timeout(Duration::from_millis(10)).await,
            Err(DeferredError::NotStarted)
        ));
        assert!(!handle.cancel(true));
        assert!(!handle.is_done());
    }

    #[tokio::test]
    async fn completed_value_is_cached() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let handle = DeferredHandle::submit(&task_runner(), async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TransportError>(5)
        });

        assert_eq!(handle.get().await.unwrap(), 5);
        assert_eq!(handle.get().await.unwrap(), 5);
        assert_eq!(handle.try_get().unwrap(), Some(5));
        assert!(handle.is_done());
        assert!(!handle.is_cancelled());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_reported_on_get() {
        let handle: DeferredHandle<u32> = DeferredHandle::submit(&task_runner(), async {
            Err(TransportError::Custom("boom".into()))
        });

        match handle.get().await {
            Err(DeferredError::Execution(failure)) => {
                assert!(matches!(*failure, WorkFailure::Transport(_)));
                assert!(failure.to_string().contains("boom"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(handle.is_done());
    }

    #[tokio::test]
    async fn pending_handle_polls_as_none() {
        let (tx, rx) = oneshot::channel::<u32>();
        let handle = DeferredHandle::submit(&task_runner(), async move {
            rx.await.map_err(|e| TransportError::Custom(e.into()))
        });

        assert_eq!(handle.try_get().unwrap(), None);
        assert!(!handle.is_done());

        tx.send(9).unwrap();
        assert_eq!(handle.get().await.unwrap(), 9);
    }

    #[tokio::test]
    async fn cancel_interrupts_task() {
        let handle: DeferredHandle<u32> = DeferredHandle::submit(&task_runner(), async {
            std::future::pending::<Result<u32, TransportError>>().await
        });

        assert!(handle.cancel(true));
        assert!(handle.is_cancelled());
        assert!(handle.is_done());
        assert!(matches!(handle.get().await, Err(DeferredError::Cancelled)));
        assert!(!handle.cancel(true));
    }

    #[tokio::test]
    async fn cancel_without_interrupt_discards_result() {
        let (tx, rx) = oneshot::channel::<u32>();
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let handle = DeferredHandle::submit(&task_runner(), async move {
            let value = rx.await.map_err(|e| TransportError::Custom(e.into()));
            let _ = done_tx.send(());
            value
        });

        assert!(handle.cancel(false));
        tx.send(3).unwrap();
        done_rx.await.unwrap();

        assert!(matches!(handle.get().await, Err(DeferredError::Cancelled)));
    }

    #[tokio::test]
    async fn completed_handle_cannot_be_cancelled() {
        let handle = DeferredHandle::submit(&task_runner(), async { Ok::<_, TransportError>(1) });
        handle.get().await.unwrap();

        assert!(!handle.cancel(true));
        assert!(!handle.is_cancelled());
        assert_eq!(handle.get().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn detached_handle_completes_but_cannot_cancel() {
        let runner = DetachedRunner::current().unwrap();
        let (tx, rx) = oneshot::channel::<u32>();
        let handle = DeferredHandle::submit(&runner, async move {
            rx.await.map_err(|e| TransportError::Custom(e.into()))
        });

        assert!(!handle.cancel(true));
        assert!(!handle.is_cancelled());

        tx.send(4).unwrap();
        assert_eq!(handle.get().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn get_timeout_expires_on_pending_work() {
        let handle: DeferredHandle<u32> = DeferredHandle::submit(&task_runner(), async {
            std::future::pending::<Result<u32, TransportError>>().await
        });

        let err = handle
            .get_timeout(Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, DeferredError::Timeout(_)));
        assert!(!handle.is_done());
    }

    #[tokio::test]
    async fn panics_are_captured() {
        let handle: DeferredHandle<u32> = DeferredHandle::submit(&task_runner(), async {
            if true {
                panic!("worker exploded");
            }
            Ok::<_, TransportError>(0)
        });

        match handle.get().await {
            Err(DeferredError::Execution(failure)) => {
                assert!(matches!(&*failure, WorkFailure::Panicked(msg) if msg == "worker exploded"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_work_is_abandoned() {
        let runner = DetachedRunner::new(drop);
        let handle = DeferredHandle::submit(&runner, async { Ok::<_, TransportError>(1) });

        match handle.get().await {
            Err(DeferredError::Execution(failure)) => {
                assert!(matches!(*failure, WorkFailure::Abandoned));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
