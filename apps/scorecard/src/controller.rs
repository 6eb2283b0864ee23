//! Submission Controller: owns the form, drives one submission at a time
//! through validate → upload → classify → transition, and publishes an
//! immutable `Snapshot` after every mutation.
//!
//! ```text
//! Idle ⇄ Warming          (advisory, follows the warmup probe)
//! Idle | Warming | Succeeded | Failed ──submit──▶ Submitting ──▶ Succeeded | Failed
//! ```
//!
//! Observers (the renderer, the CLI) subscribe to the snapshot channel and are
//! pure functions of the latest value.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{ScoringBackend, UploadRequest};
use crate::classify::{classify_response, classify_transport};
use crate::errors::{ErrorReport, FormLocked};
use crate::models::score::ScoreResult;
use crate::notify::Notifier;
use crate::warmup::WarmupStatus;

/// Client-side bound on a single upload; cold starts can take 5-15 minutes.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

pub const NO_FILE_MESSAGE: &str = "Please select a file.";
pub const NO_DESCRIPTION_MESSAGE: &str = "Please add a job description.";

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionForm {
    pub selected_file: Option<SelectedFile>,
    pub description: String,
}

impl SubmissionForm {
    /// Builds the upload payload, or the validation error to surface.
    pub fn validate(&self) -> Result<UploadRequest, ErrorReport> {
        let file = self
            .selected_file
            .as_ref()
            .ok_or_else(|| ErrorReport::validation(NO_FILE_MESSAGE))?;
        if self.description.trim().is_empty() {
            return Err(ErrorReport::validation(NO_DESCRIPTION_MESSAGE));
        }
        Ok(UploadRequest {
            file_name: file.name.clone(),
            file_bytes: file.bytes.clone(),
            description: self.description.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionState {
    Idle,
    /// Idle while the warmup probe is still running.
    Warming,
    Submitting,
    Succeeded(Arc<ScoreResult>),
    Failed(ErrorReport),
}

/// Immutable view of the controller after one mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Number of the most recent submission attempt (0 before the first).
    pub attempt: u64,
    pub state: SubmissionState,
    /// Form inputs and the submit control are disabled while set.
    pub busy: bool,
    pub score_view_open: bool,
    /// Last rejected submit; cleared by the next accepted one.
    pub validation: Option<ErrorReport>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            attempt: 0,
            state: SubmissionState::Idle,
            busy: false,
            score_view_open: false,
            validation: None,
        }
    }
}

/// What a call to `submit` did.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Another submission was in flight; nothing happened.
    Ignored,
    /// Local validation failed; no request was sent.
    Rejected(ErrorReport),
    /// The attempt settled into `Succeeded` or `Failed`.
    Settled(SubmissionState),
    /// The attempt settled but had already been superseded; state untouched.
    Discarded,
}

pub struct SubmissionController {
    backend: Arc<dyn ScoringBackend>,
    timeout: Duration,
    notifier: Notifier,
    form: Mutex<SubmissionForm>,
    snapshot: watch::Sender<Snapshot>,
    busy: AtomicBool,
    attempt: AtomicU64,
    in_flight: Mutex<Option<CancellationToken>>,
    shutdown: CancellationToken,
}

/// Held for the whole of a submission; releasing it clears the busy flag on
/// every exit path, including the submit future being dropped.
struct BusyGuard<'a> {
    controller: &'a SubmissionController,
    /// Set once the attempt has entered `Submitting`.
    attempt: Option<u64>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let controller = self.controller;
        let attempt = self.attempt;
        controller
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        controller.snapshot.send_if_modified(|s| {
            let mut changed = s.busy;
            s.busy = false;
            // Abandoned before it settled: Submitting never outlives busy.
            if attempt == Some(s.attempt) && s.state == SubmissionState::Submitting {
                warn!(attempt = s.attempt, "Submission abandoned before it settled");
                s.state = SubmissionState::Failed(ErrorReport::timed_out());
                changed = true;
            }
            changed
        });
        controller.busy.store(false, Ordering::SeqCst);
    }
}

impl SubmissionController {
    pub fn new(
        backend: Arc<dyn ScoringBackend>,
        timeout: Duration,
        notifier: Notifier,
        parent: &CancellationToken,
    ) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::default());
        Self {
            backend,
            timeout,
            notifier,
            form: Mutex::new(SubmissionForm::default()),
            snapshot,
            busy: AtomicBool::new(false),
            attempt: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            shutdown: parent.child_token(),
        }
    }

    // ── form ────────────────────────────────────────────────────────────────

    fn edit_form(&self, edit: impl FnOnce(&mut SubmissionForm)) -> Result<(), FormLocked> {
        if self.busy.load(Ordering::SeqCst) {
            return Err(FormLocked);
        }
        edit(&mut self.form.lock().unwrap_or_else(PoisonError::into_inner));
        Ok(())
    }

    pub fn select_file(&self, name: impl Into<String>, bytes: Bytes) -> Result<(), FormLocked> {
        let file = SelectedFile {
            name: name.into(),
            bytes,
        };
        self.edit_form(|form| form.selected_file = Some(file))
    }

    #[allow(dead_code)]
    pub fn clear_file(&self) -> Result<(), FormLocked> {
        self.edit_form(|form| form.selected_file = None)
    }

    pub fn set_description(&self, text: impl Into<String>) -> Result<(), FormLocked> {
        let text = text.into();
        self.edit_form(|form| form.description = text)
    }

    pub fn form(&self) -> SubmissionForm {
        self.form
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── observation ─────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// The current result, if the last attempt succeeded.
    pub fn result(&self) -> Option<Arc<ScoreResult>> {
        match &self.snapshot.borrow().state {
            SubmissionState::Succeeded(result) => Some(Arc::clone(result)),
            _ => None,
        }
    }

    /// Mirrors the warmup probe into the advisory `Warming` phase.
    pub fn observe_warmup(&self, status: WarmupStatus) {
        self.snapshot.send_if_modified(|s| {
            let next = match (&s.state, status.probing) {
                (SubmissionState::Idle, true) => SubmissionState::Warming,
                (SubmissionState::Warming, false) => SubmissionState::Idle,
                _ => return false,
            };
            s.state = next;
            true
        });
    }

    // ── score view ──────────────────────────────────────────────────────────

    /// Opens the score view. Only possible while a result exists.
    pub fn open_score_view(&self) -> bool {
        self.snapshot.send_if_modified(|s| {
            if matches!(s.state, SubmissionState::Succeeded(_)) && !s.score_view_open {
                s.score_view_open = true;
                true
            } else {
                false
            }
        });
        self.snapshot.borrow().score_view_open
    }

    #[allow(dead_code)]
    pub fn close_score_view(&self) {
        self.snapshot.send_if_modified(|s| {
            let was_open = s.score_view_open;
            s.score_view_open = false;
            was_open
        });
    }

    // ── submission ──────────────────────────────────────────────────────────

    fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard {
                controller: self,
                attempt: None,
            })
    }

    pub async fn submit(&self) -> SubmitOutcome {
        let Some(mut guard) = self.try_acquire() else {
            debug!("Submission already in flight; ignoring submit");
            return SubmitOutcome::Ignored;
        };

        let request = match self.form().validate() {
            Ok(request) => request,
            Err(report) => {
                info!(reason = %report.message, "Submission rejected by form validation");
                self.snapshot
                    .send_modify(|s| s.validation = Some(report.clone()));
                return SubmitOutcome::Rejected(report);
            }
        };

        let attempt = self.attempt.fetch_add(1, Ordering::SeqCst) + 1;
        let submission_id = Uuid::new_v4();
        let cancel = self.shutdown.child_token();
        *self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(cancel.clone());

        self.snapshot.send_modify(|s| {
            s.attempt = attempt;
            s.state = SubmissionState::Submitting;
            s.busy = true;
            s.score_view_open = false;
            s.validation = None;
        });
        guard.attempt = Some(attempt);
        info!(
            %submission_id,
            attempt,
            file = %request.file_name,
            bytes = request.file_bytes.len(),
            "Submitting résumé for scoring"
        );

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                warn!(%submission_id, "Submission cancelled");
                Err(ErrorReport::timed_out())
            }
            settled = tokio::time::timeout(self.timeout, self.backend.upload(&request)) => {
                match settled {
                    Err(_) => {
                        cancel.cancel();
                        warn!(%submission_id, timeout_secs = self.timeout.as_secs(), "Submission timed out");
                        Err(ErrorReport::timed_out())
                    }
                    Ok(Ok(response)) => classify_response(response),
                    Ok(Err(e)) => Err(classify_transport(e, self.backend.base_url())),
                }
            }
        };

        let state = match outcome {
            Ok(result) => {
                info!(%submission_id, filename = %result.filename, score = ?result.overall_score, "Submission scored");
                SubmissionState::Succeeded(Arc::new(result))
            }
            Err(report) => {
                warn!(%submission_id, kind = %report.kind, message = %report.message, "Submission failed");
                SubmissionState::Failed(report)
            }
        };

        let applied = self.settle(attempt, state.clone());
        drop(guard);

        if !applied {
            debug!(%submission_id, attempt, "Discarding settlement of a superseded attempt");
            return SubmitOutcome::Discarded;
        }

        if let SubmissionState::Succeeded(result) = &state {
            self.notifier.show(format!(
                "Successfully uploaded: {} (Name: {})",
                result.filename, result.candidate_name
            ));
        }
        SubmitOutcome::Settled(state)
    }

    /// Writes a settled state, unless `attempt` is no longer the one in progress.
    fn settle(&self, attempt: u64, state: SubmissionState) -> bool {
        self.snapshot.send_if_modified(|s| {
            if s.attempt != attempt || s.state != SubmissionState::Submitting {
                return false;
            }
            s.state = state;
            s.busy = false;
            true
        })
    }

    /// Cancels the in-flight submission, if any. It settles as `TimedOut`.
    pub fn cancel(&self) -> bool {
        match self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Teardown: cancels any in-flight submission and clears the toast.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.notifier.dismiss();
    }
}

impl Drop for SubmissionController {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
