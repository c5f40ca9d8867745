use std::sync::Arc;

use ::time::{format_description::well_known, OffsetDateTime};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::client::{ScanBackend, ServiceResponse};
use crate::error::{Result, SCAN_FAILED_NOTICE};
use crate::history::ScanHistory;
use crate::progress::ProgressAnimator;
use crate::score::compliance_score;
use crate::types::{ScanReport, ScanRequest, SessionSnapshot, SessionState};

/// Outcome of handing a request to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The scan ran to completion; holds the state it settled in.
    Finished(SessionState),
    /// A scan was already in flight, so this request was dropped.
    Dropped,
    /// The response arrived after the session moved on and was discarded.
    Stale,
}

/// Proof that a request was accepted. Completing it consumes the ticket.
///
/// Dropping a ticket that was never completed (a cancelled or timed-out caller)
/// moves the session to `Failed` so it does not stay in `Scanning`.
#[derive(Debug)]
pub struct ScanTicket {
    seq: u64,
    file_name: String,
    guard: Option<AbandonGuard>,
}

impl ScanTicket {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

#[derive(Debug)]
struct AbandonGuard {
    inner: Arc<RwLock<SessionInner>>,
    progress: Arc<watch::Sender<u8>>,
}

impl Drop for ScanTicket {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let seq = self.seq;
        let file_name = std::mem::take(&mut self.file_name);

        if let Ok(mut inner) = guard.inner.try_write() {
            abandon(&mut inner, &guard.progress, seq, &file_name);
            return;
        }
        // Lock is busy: finish the reset once it frees up.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let mut inner = guard.inner.write().await;
                abandon(&mut inner, &guard.progress, seq, &file_name);
            });
        }
    }
}

fn abandon(inner: &mut SessionInner, progress: &watch::Sender<u8>, seq: u64, file_name: &str) {
    if inner.seq != seq || !inner.state.is_scanning() {
        return;
    }
    warn!(file = %file_name, seq, "scan abandoned before the service responded");
    progress.send_replace(0);
    inner.state = SessionState::Failed {
        notice: SCAN_FAILED_NOTICE.to_string(),
        reason: "scan abandoned before the service responded".to_string(),
    };
}

#[derive(Debug, Default)]
struct SessionInner {
    state: SessionState,
    history: ScanHistory,
    seq: u64,
    animator: Option<ProgressAnimator>,
}

/// Drives the scan workflow: `Idle -> Scanning -> Displaying | Failed -> Scanning ..`.
///
/// - Single-flight: while `Scanning`, new requests are dropped, not queued.
/// - Every accepted request gets a sequence number; a completion whose number is
///   no longer current is discarded.
/// - The displayed progress value lives in a watch channel. It is reset to 0 when
///   a scan starts or fails and animated up to the score when one succeeds.
pub struct ScanSession<B: ?Sized> {
    backend: Arc<B>,
    inner: Arc<RwLock<SessionInner>>,
    progress: Arc<watch::Sender<u8>>,
    animate: bool,
}

impl<B: ?Sized> Clone for ScanSession<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            inner: self.inner.clone(),
            progress: self.progress.clone(),
            animate: self.animate,
        }
    }
}

impl<B: ScanBackend + ?Sized> ScanSession<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (progress, _) = watch::channel(0u8);
        Self {
            backend,
            inner: Arc::new(RwLock::new(SessionInner::default())),
            progress: Arc::new(progress),
            animate: true,
        }
    }

    /// Show the score immediately instead of animating towards it.
    pub fn without_animation(mut self) -> Self {
        self.animate = false;
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> u8 {
        *self.progress.borrow()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state.clone()
    }

    pub async fn history(&self) -> Vec<String> {
        self.inner.read().await.history.entries()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read().await;
        SessionSnapshot {
            state: inner.state.clone(),
            progress: self.progress(),
            history: inner.history.entries(),
        }
    }

    /// Run one scan end to end.
    pub async fn scan(&self, request: ScanRequest) -> Submission {
        let Some(ticket) = self.begin(&request.file_name).await else {
            return Submission::Dropped;
        };
        let outcome = self.backend.submit(request).await;
        match self.complete(ticket, outcome).await {
            Some(state) => Submission::Finished(state),
            None => Submission::Stale,
        }
    }

    /// Enter `Scanning` for `file_name`, clearing whatever was displayed before.
    /// Returns `None` if a scan is already in flight or `file_name` is blank.
    pub async fn begin(&self, file_name: &str) -> Option<ScanTicket> {
        if file_name.trim().is_empty() {
            warn!("refusing scan request without a file name");
            return None;
        }
        let mut inner = self.inner.write().await;
        if inner.state.is_scanning() {
            warn!(file = %file_name, "scan already in progress; dropping request");
            return None;
        }

        if let Some(animator) = inner.animator.take() {
            animator.cancel();
        }
        self.progress.send_replace(0);

        inner.seq += 1;
        inner.state = SessionState::Scanning {
            file_name: file_name.to_string(),
        };
        info!(file = %file_name, seq = inner.seq, "scan started");

        Some(ScanTicket {
            seq: inner.seq,
            file_name: file_name.to_string(),
            guard: Some(AbandonGuard {
                inner: self.inner.clone(),
                progress: self.progress.clone(),
            }),
        })
    }

    /// Apply the service outcome for `ticket`. Returns the new state, or `None`
    /// when the ticket is no longer the current request.
    pub async fn complete(
        &self,
        mut ticket: ScanTicket,
        outcome: Result<ServiceResponse>,
    ) -> Option<SessionState> {
        let mut inner = self.inner.write().await;
        ticket.guard = None;
        let file_name = std::mem::take(&mut ticket.file_name);
        if inner.seq != ticket.seq || !inner.state.is_scanning() {
            debug!(
                file = %file_name,
                seq = ticket.seq,
                current = inner.seq,
                "discarding stale scan response"
            );
            return None;
        }

        match outcome {
            Ok(response) => {
                let reported_score = response.reported_score();
                let result = response.into_result();
                let score = compliance_score(&result);
                if let Some(reported) = reported_score {
                    debug!(reported, score, "service reported its own compliance score");
                }

                let report = ScanReport {
                    file_name: file_name.clone(),
                    violations: result.violation_details(),
                    detected: result.detected,
                    score,
                    reported_score,
                    completed_at: now_rfc3339(),
                };

                inner.history.record(file_name);
                if self.animate {
                    inner.animator = Some(ProgressAnimator::spawn(score, self.progress.clone()));
                } else {
                    self.progress.send_replace(score);
                }
                info!(
                    file = %report.file_name,
                    score,
                    detected = report.detected.len(),
                    violations = report.violations.len(),
                    "scan finished"
                );
                inner.state = SessionState::Displaying { report };
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "scan failed");
                self.progress.send_replace(0);
                inner.state = SessionState::Failed {
                    notice: SCAN_FAILED_NOTICE.to_string(),
                    reason: e.to_string(),
                };
            }
        }

        Some(inner.state.clone())
    }

    /// Feed the displayed progress for `report` to `on_value` until the animation
    /// reaches the score or the session moves on to another scan.
    pub async fn follow_progress(&self, report: &ScanReport, mut on_value: impl FnMut(u8)) {
        let mut rx = self.subscribe_progress();
        loop {
            if !self.is_displaying(report).await {
                return;
            }
            let value = *rx.borrow_and_update();
            on_value(value);
            if value == report.score || rx.changed().await.is_err() {
                return;
            }
        }
    }

    async fn is_displaying(&self, report: &ScanReport) -> bool {
        matches!(
            &self.inner.read().await.state,
            SessionState::Displaying { report: shown } if shown == report
        )
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
