//! Live subscription handle returned by the store.

use std::fmt;

use tokio::sync::mpsc;

type Disposer = Box<dyn FnOnce() + Send + 'static>;

/// Stream of full snapshots plus a disposer.
///
/// Each item replaces the previous one; nothing is ever a diff. Items are
/// delivered in the order the underlying data changed. After
/// [`dispose`](Self::dispose) no further item is yielded, and the store
/// releases its side of the subscription. Dropping the subscription disposes
/// it.
pub struct Subscription<T> {
    receiver: mpsc::UnboundedReceiver<T>,
    disposer: Option<Disposer>,
}

impl<T> Subscription<T> {
    /// Wrap a snapshot channel. `disposer` runs at most once.
    pub fn new(
        receiver: mpsc::UnboundedReceiver<T>,
        disposer: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self { receiver, disposer: Some(Box::new(disposer)) }
    }

    /// Next snapshot. `None` once disposed or when the store ends the stream.
    pub async fn next(&mut self) -> Option<T> {
        if self.disposer.is_none() {
            return None;
        }
        self.receiver.recv().await
    }

    /// Stop delivery and release the store-side watcher. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            self.receiver.close();
            disposer();
        }
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposer.is_none()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("disposed", &self.is_disposed()).finish()
    }
}
