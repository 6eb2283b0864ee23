//! Warmup Prober: a single best-effort `GET /warmup` at startup so the
//! backend can load its model before the user's first real submission.
//!
//! Readiness is advisory only. A failed or timed-out probe still flips the
//! status to ready: the prober never blocks the user from submitting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::ScoringBackend;

/// Cold model loads on the backend can take this long.
pub const DEFAULT_WARMUP_BOUND: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupStatus {
    pub probing: bool,
    pub ready: bool,
}

impl Default for WarmupStatus {
    fn default() -> Self {
        Self {
            probing: true,
            ready: false,
        }
    }
}

impl WarmupStatus {
    /// Advisory line for the hosting view.
    pub fn hint(&self) -> &'static str {
        if self.ready {
            "Backend is ready."
        } else {
            "Warming up the scoring model. The first request can take several minutes."
        }
    }
}

pub struct WarmupProber {
    backend: Arc<dyn ScoringBackend>,
    bound: Duration,
    cancel: CancellationToken,
    started: AtomicBool,
    status: Arc<watch::Sender<WarmupStatus>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WarmupProber {
    /// `parent` is the owning scope's token; cancelling it abandons the probe.
    pub fn new(
        backend: Arc<dyn ScoringBackend>,
        bound: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let (status, _) = watch::channel(WarmupStatus::default());
        Self {
            backend,
            bound,
            cancel: parent.child_token(),
            started: AtomicBool::new(false),
            status: Arc::new(status),
            task: Mutex::new(None),
        }
    }

    /// Spawns the probe. Returns `false` if it was already started.
    pub fn start(&self) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Warmup probe already started; ignoring");
            return false;
        }

        let backend = Arc::clone(&self.backend);
        let status = Arc::clone(&self.status);
        let cancel = self.cancel.clone();
        let bound = self.bound;

        let handle = tokio::spawn(async move {
            info!(bound_secs = bound.as_secs(), "Probing backend readiness");
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Warmup probe cancelled before it resolved");
                }
                outcome = tokio::time::timeout(bound, backend.warmup()) => {
                    match outcome {
                        Ok(Ok(_)) => info!("Backend reported ready"),
                        Ok(Err(e)) => warn!(error = %e, "Warmup probe failed; not blocking submissions"),
                        Err(_) => warn!(bound_secs = bound.as_secs(), "Warmup probe exceeded its bound; not blocking submissions"),
                    }
                    status.send_replace(WarmupStatus {
                        probing: false,
                        ready: true,
                    });
                }
            }
        });

        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        true
    }

    pub fn status(&self) -> WarmupStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WarmupStatus> {
        self.status.subscribe()
    }

    /// Resolves once the status is ready, or `None` if the probe was cancelled first.
    pub async fn wait_ready(&self) -> Option<WarmupStatus> {
        let mut rx = self.subscribe();
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            status = rx.wait_for(|s| s.ready) => status.ok().map(|s| *s),
        }
    }
}

impl Drop for WarmupProber {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_utils::{FakeBackend, Reply};
    use crate::backend::TransportError;
    use serde_json::json;
    use tokio::time::sleep;

    fn prober(backend: Arc<FakeBackend>, root: &CancellationToken) -> WarmupProber {
        WarmupProber::new(backend, DEFAULT_WARMUP_BOUND, root)
    }

    #[test]
    fn test_initial_status_is_probing_not_ready() {
        assert_eq!(
            WarmupStatus::default(),
            WarmupStatus {
                probing: true,
                ready: false
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_probe_sets_ready() {
        let backend = Arc::new(FakeBackend::with_warmup(Reply::after(
            Duration::from_secs(90),
            Ok(json!({"model": "loaded"})),
        )));
        let root = CancellationToken::new();
        let prober = prober(backend, &root);
        assert!(prober.start());

        let status = prober.wait_ready().await.unwrap();
        assert_eq!(
            status,
            WarmupStatus {
                probing: false,
                ready: true
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_still_reports_ready() {
        let backend = Arc::new(FakeBackend::with_warmup(Reply::now(Err(
            TransportError::Unreachable("refused".into()),
        ))));
        let root = CancellationToken::new();
        let prober = prober(backend, &root);
        prober.start();

        let status = prober.wait_ready().await.unwrap();
        assert!(status.ready);
        assert!(!status.probing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_exceeding_bound_reports_ready() {
        let backend = Arc::new(FakeBackend::with_warmup(Reply::after(
            Duration::from_secs(30 * 60),
            Ok(json!({})),
        )));
        let root = CancellationToken::new();
        let prober = prober(backend, &root);
        prober.start();

        sleep(DEFAULT_WARMUP_BOUND - Duration::from_secs(1)).await;
        assert!(prober.status().probing);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(
            prober.status(),
            WarmupStatus {
                probing: false,
                ready: true
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_runs_at_most_once() {
        let backend = Arc::new(FakeBackend::default());
        let root = CancellationToken::new();
        let prober = prober(Arc::clone(&backend), &root);

        assert!(prober.start());
        assert!(!prober.start());
        prober.wait_ready().await;
        assert!(!prober.start());
        assert_eq!(backend.warmups(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_pending_probe() {
        let backend = Arc::new(FakeBackend::with_warmup(Reply::after(
            Duration::from_secs(60),
            Ok(json!({})),
        )));
        let root = CancellationToken::new();
        let prober = prober(backend, &root);
        let rx = prober.subscribe();
        prober.start();

        root.cancel();
        assert!(prober.wait_ready().await.is_none());

        sleep(Duration::from_secs(120)).await;
        assert_eq!(*rx.borrow(), WarmupStatus::default());
    }
}
