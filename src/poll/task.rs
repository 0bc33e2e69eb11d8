use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A self-rescheduling loop: run the body, sleep for the delay it returns,
/// repeat. The next run is only scheduled once the previous one settled, so
/// runs never overlap and latency stretches the effective period.
///
/// Cancellation is best-effort. Cancelling the token ends a pending sleep at
/// once; a body that is mid-await keeps running to completion and is handed
/// the token so it can check `is_cancelled` before acting on what it got.
pub struct PeriodicTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn the loop. The body returns `None` to end the loop on its own.
    pub fn spawn<F, Fut>(name: &'static str, token: CancellationToken, mut body: F) -> Self
    where
        F: FnMut(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Option<Duration>> + Send + 'static,
    {
        let handle = tokio::spawn({
            let token = token.clone();
            async move {
                while !token.is_cancelled() {
                    let Some(delay) = body(token.clone()).await else {
                        break;
                    };
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = token.cancelled() => break,
                    }
                }
                debug!(task = name, "periodic task finished");
            }
        });

        Self { token, handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_alive(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
