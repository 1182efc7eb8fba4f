//! Per-connection request multiplexer.
//!
//! Every submitted unit of work runs as its own tokio task, so a slow call
//! never holds up a fast one. Results come out in completion order, either
//! pulled with [`Multiplexer::next`] / the `Stream` impl, or pushed to a
//! [`CompletionSink`] in auto-draining mode.
//!
//! [`Multiplexer::close`] aborts without waiting. An aborted task only stops
//! at its next suspension point, so callers that must know no task is still
//! touching shared state use [`Multiplexer::shutdown`], which also awaits the
//! aborted tasks.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Receives each result as soon as its task completes.
#[async_trait]
pub trait CompletionSink<T: Send + 'static>: Send + Sync {
    /// Deliver one completed result.
    async fn deliver(&self, item: T);
}

enum Drain<T: Send + 'static> {
    Queue {
        tx: mpsc::UnboundedSender<T>,
        rx: mpsc::UnboundedReceiver<T>,
    },
    Sink(Arc<dyn CompletionSink<T>>),
}

enum Delivery<T: Send + 'static> {
    Queue(mpsc::UnboundedSender<T>),
    Sink(Arc<dyn CompletionSink<T>>),
}

impl<T: Send + 'static> Delivery<T> {
    async fn send(self, item: T) {
        match self {
            Self::Queue(tx) => {
                let _ = tx.send(item);
            }
            Self::Sink(sink) => sink.deliver(item).await,
        }
    }
}

/// Runs submitted futures concurrently and yields their outputs in
/// completion order.
pub struct Multiplexer<T: Send + 'static> {
    in_flight: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
    aborted: Vec<JoinHandle<()>>,
    next_task: u64,
    drain: Drain<T>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> Multiplexer<T> {
    /// Results are pulled with [`next`](Self::next).
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self::with_drain(Drain::Queue { tx, rx })
    }

    /// Results are pushed to `sink` as they complete.
    pub fn auto_draining(sink: impl CompletionSink<T> + 'static) -> Self {
        Self::with_drain(Drain::Sink(Arc::new(sink)))
    }

    fn with_drain(drain: Drain<T>) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            aborted: Vec::new(),
            next_task: 0,
            drain,
            cancel: CancellationToken::new(),
        }
    }

    /// Start `work` immediately as an independent task.
    ///
    /// Work submitted after [`close`](Self::close) is dropped.
    pub fn submit<F>(&mut self, work: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            debug!("multiplexer closed; dropping submitted work");
            return;
        }

        let task_id = self.next_task;
        self.next_task += 1;

        let delivery = match &self.drain {
            Drain::Queue { tx, .. } => Delivery::Queue(tx.clone()),
            Drain::Sink(sink) => Delivery::Sink(Arc::clone(sink)),
        };
        let in_flight = Arc::clone(&self.in_flight);
        let cancel = self.cancel.clone();

        // Held across spawn so the task cannot deregister before it is registered.
        let mut registry = self.in_flight.lock();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = async {
                    let output = work.await;
                    let _ = in_flight.lock().remove(&task_id);
                    delivery.send(output).await;
                } => {}
            }
        });
        let _ = registry.insert(task_id, handle);
    }

    /// Number of tasks still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Next result in completion order.
    ///
    /// Waits until some task completes; resolves to `None` only in
    /// auto-draining mode, where results never come back here.
    pub async fn next(&mut self) -> Option<T> {
        match &mut self.drain {
            Drain::Queue { rx, .. } => rx.recv().await,
            Drain::Sink(_) => None,
        }
    }

    /// Cancel and abort every running task without waiting for them.
    pub fn close(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = self.in_flight.lock().drain().map(|(_, h)| h).collect();
        for task in &tasks {
            task.abort();
        }
        if let Drain::Queue { rx, .. } = &mut self.drain {
            rx.close();
        }
        debug!(aborted = tasks.len(), "multiplexer closed");
        self.aborted.extend(tasks);
    }

    /// [`close`](Self::close), then wait until every aborted task has
    /// actually stopped running.
    pub async fn shutdown(&mut self) {
        self.close();
        for task in std::mem::take(&mut self.aborted) {
            let _ = task.await;
        }
    }
}

impl<T: Send + 'static> Default for Multiplexer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Drop for Multiplexer<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
        for (_, task) in self.in_flight.lock().drain() {
            task.abort();
        }
    }
}

impl<T: Send + 'static> Unpin for Multiplexer<T> {}

impl<T: Send + 'static> Stream for Multiplexer<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        match &mut self.get_mut().drain {
            Drain::Queue { rx, .. } => rx.poll_recv(cx),
            Drain::Sink(_) => Poll::Ready(None),
        }
    }
}
