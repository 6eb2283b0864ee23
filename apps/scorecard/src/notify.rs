//! Notification Scheduler: one transient toast at a time, auto-dismissed
//! after a fixed duration. Knows nothing about submissions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastMessage {
    pub text: String,
    pub visible_until: DateTime<Utc>,
}

struct Inner {
    duration: Duration,
    toast: watch::Sender<Option<ToastMessage>>,
    /// Bumped on every show/dismiss; a timer only clears the toast it was armed for.
    generation: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn replace_timer(&self, next: Option<JoinHandle<()>>) {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        *timer = next;
    }
}

/// Owns the toast slot. Dropping it cancels any pending auto-dismiss.
pub struct Notifier {
    inner: Arc<Inner>,
}

impl Notifier {
    pub fn new(duration: Duration) -> Self {
        let (toast, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                duration,
                toast,
                generation: AtomicU64::new(0),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Replaces any visible toast and restarts the dismiss timer.
    /// Must be called from within a tokio runtime.
    pub fn show(&self, text: impl Into<String>) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let visible_until = chrono::Duration::from_std(self.inner.duration)
            .ok()
            .and_then(|duration| Utc::now().checked_add_signed(duration))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let message = ToastMessage {
            text: text.into(),
            visible_until,
        };
        debug!(generation, text = %message.text, "Showing toast");
        self.inner.toast.send_replace(Some(message));

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let duration = self.inner.duration;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(inner) = weak.upgrade() {
                if inner.generation.load(Ordering::SeqCst) == generation {
                    debug!(generation, "Toast expired");
                    inner.toast.send_replace(None);
                }
            }
        });
        self.inner.replace_timer(Some(timer));
    }

    pub fn dismiss(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.replace_timer(None);
        self.inner.toast.send_replace(None);
    }

    #[allow(dead_code)]
    pub fn current(&self) -> Option<ToastMessage> {
        self.inner.toast.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ToastMessage>> {
        self.inner.toast.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_DURATION)
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.inner.replace_timer(None);
    }
}
