//! Shared watch loop for the HTTP backends

use crate::error::BackendResult;
use crate::traits::{BackendResponse, StopSignal};
use std::time::Duration;
use tokio::sync::mpsc;

/// One step of a backend watch
///
/// `Ok(Some(value))` is a change to emit, `Ok(None)` means nothing changed
/// and the loop should poll again.
#[async_trait::async_trait]
pub(crate) trait WatchSource: Send + 'static {
    fn backend(&self) -> &'static str;

    async fn next_value(&mut self) -> BackendResult<Option<Vec<u8>>>;
}

/// Drive `source` on a background task until `stop` fires
///
/// Failed polls are reported on the stream and retried after `retry_delay`.
/// The stop signal is honoured while polling, sending and sleeping.
pub(crate) fn spawn_watch<S: WatchSource>(
    mut source: S,
    mut stop: StopSignal,
    retry_delay: Duration,
) -> mpsc::Receiver<BackendResponse> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let backend = source.backend();
        loop {
            let next = tokio::select! {
                _ = &mut stop => break,
                next = source.next_value() => next,
            };

            let (response, failed) = match next {
                Ok(Some(value)) => (BackendResponse::value(value), false),
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(backend, error = %e, "Watch request failed, retrying");
                    (BackendResponse::error(e), true)
                }
            };

            tokio::select! {
                _ = &mut stop => break,
                sent = tx.send(response) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }

            if failed {
                tokio::select! {
                    _ = &mut stop => break,
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }
        }
        tracing::debug!(backend, "Backend watch stopped");
    });

    rx
}
