//! Watch handles and the relay task behind `watch_channel`
//!
//! Each handle owns exactly one relay task. The relay forwards backend
//! notifications to the handle, translating them into [`RemoteResponse`]s,
//! until one of these happens:
//!
//! - the handle is stopped, cancelled or dropped
//! - the handle's receiver is closed
//! - the backend stream ends
//!
//! On exit the relay always signals stop to the backend watch.

use super::traits::RemoteResponse;
use remote_config_backends::ConfigManager;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A live change stream for one remote configuration source
pub struct WatchHandle {
    receiver: mpsc::Receiver<RemoteResponse>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("stopped", &self.stop.is_none())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl WatchHandle {
    /// Receive the next notification
    ///
    /// Returns `None` once the watch has stopped.
    pub async fn recv(&mut self) -> Option<RemoteResponse> {
        self.receiver.recv().await
    }

    /// Signal the relay to stop without waiting for it
    ///
    /// Notifications already queued are discarded; `recv` returns `None`
    /// afterwards.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
    }

    /// Stop the relay and wait until it has exited
    pub async fn cancel(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Watch relay ended abnormally");
            }
        }
    }

    /// Whether the relay task has exited
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

/// Decrements the live-watch counter when the relay exits
struct ActiveWatch(Arc<AtomicUsize>);

impl ActiveWatch {
    fn register(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveWatch {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Open a backend watch on `path` and spawn the relay that feeds the handle
pub(crate) fn spawn_relay(
    manager: Box<dyn ConfigManager>,
    path: &str,
    active: Arc<AtomicUsize>,
) -> WatchHandle {
    let (backend_stop, backend_stop_rx) = oneshot::channel();
    let mut backend = manager.watch(path, backend_stop_rx);
    drop(manager);

    let (tx, receiver) = mpsc::channel(1);
    let (stop, mut stop_rx) = oneshot::channel::<()>();
    let guard = ActiveWatch::register(active);
    let path = path.to_string();

    let task = tokio::spawn(async move {
        let _guard = guard;
        tracing::debug!(path = %path, "Watch relay started");

        loop {
            let next = tokio::select! {
                _ = &mut stop_rx => break,
                next = backend.recv() => next,
            };
            let Some(response) = next else {
                tracing::debug!(path = %path, "Backend watch ended");
                break;
            };

            let response = RemoteResponse::from(response);
            tracing::trace!(
                path = %path,
                bytes = response.value.len(),
                error = response.error.is_some(),
                "Forwarding watch notification"
            );

            tokio::select! {
                _ = &mut stop_rx => break,
                sent = tx.send(response) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }

        let _ = backend_stop.send(());
        tracing::debug!(path = %path, "Watch relay stopped");
    });

    WatchHandle {
        receiver,
        stop: Some(stop),
        task: Some(task),
    }
}
