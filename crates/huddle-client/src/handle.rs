//! Disposer for callback-style subscriptions.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::task::JoinHandle;
use tracing::trace;

/// Owns a spawned subscription loop.
///
/// [`dispose`](Self::dispose) stops callback delivery immediately: the loop
/// checks the shared flag before every callback, and the task is aborted so
/// the underlying store subscription is released. Disposing twice, or
/// dropping after disposal, is a no-op. Dropping an active handle disposes
/// it, so a screen cannot leak a subscription by forgetting the handle.
#[derive(Debug)]
pub struct SubscriptionHandle {
    active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Spawn `run` on the current runtime. `run` receives the active flag and
    /// must check it before each callback.
    pub(crate) fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(run(Arc::clone(&active)));
        Self { active, task: Some(task) }
    }

    /// Stop delivery and release the subscription. Idempotent.
    pub fn dispose(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
            trace!("subscription disposed");
        }
    }

    /// Whether the subscription still delivers batches.
    ///
    /// Becomes false after disposal and after the store ends the stream;
    /// callers resubscribe on next focus in the latter case.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Whether a loop may deliver another batch.
pub(crate) fn still_active(active: &AtomicBool) -> bool {
    active.load(Ordering::Acquire)
}
