//! Scan session lifecycle
//!
//! One `ScanSession` owns one exclusive pass at the camera: acquire the
//! frame feed, select a decoding backend once, then poll frames through
//! validation and the consensus window until the session ends in exactly
//! one of Confirmed or Stopped.
//!
//! The spawned worker task owns the feed, the backend, the window and the
//! grace deadline. Every exit path (confirmation, stop, fatal resource
//! loss) funnels through one disposal routine, so resources are released
//! at most once no matter how the session ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use scanfirm_common::events::{
    CandidateInfo, RejectReason, ScanEvent, ScanState, SessionErrorKind, Verification,
};
use scanfirm_common::{EventBus, ScanParams};

use super::backend::{Cadence, Decoder, DecoderBackend};
use super::consensus::ConsensusWindow;
use super::frame::{Frame, FrameFeed, FrameSource};
use super::symbology::{self, Verdict};
use crate::error::Result;

/// State shared between the session handle and its worker task
struct SessionShared {
    session_id: Uuid,
    state: RwLock<ScanState>,
    running: AtomicBool,
    bus: EventBus,
}

impl SessionShared {
    /// Move to a new state, emitting the transition if it changed anything
    async fn transition(&self, new_state: ScanState, candidate: Option<CandidateInfo>) {
        let old_state = {
            let mut state = self.state.write().await;
            let old = *state;
            *state = new_state;
            old
        };
        if old_state == new_state {
            return;
        }

        debug!(
            "Session {} state {} -> {}",
            self.session_id, old_state, new_state
        );
        self.bus.emit_lossy(ScanEvent::SessionStateChanged {
            session_id: self.session_id,
            old_state,
            new_state,
            candidate,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Fatal failure: terminate, then report exactly once
    async fn fail(&self, kind: SessionErrorKind, message: String) {
        self.running.store(false, Ordering::SeqCst);
        self.transition(ScanState::Stopped, None).await;
        warn!("Session {} failed: {}", self.session_id, message);
        self.bus.emit_lossy(ScanEvent::SessionError {
            session_id: self.session_id,
            kind,
            message,
            timestamp: chrono::Utc::now(),
        });
    }
}

/// A single scanning pass over the camera
///
/// Created by [`ScanSession::start`], which acquires the frame source and
/// selects a backend before any polling begins. The session stops itself on
/// confirmation or fatal error; callers stop it early with [`stop`].
///
/// [`stop`]: ScanSession::stop
pub struct ScanSession {
    shared: Arc<SessionShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stop_tx: watch::Sender<bool>,
}

impl ScanSession {
    /// Start a scan session
    ///
    /// Acquires the exclusive frame feed from `source` and selects a
    /// decoding backend (hardware preferred, software fallback). Both
    /// happen before this returns; failure of either is fatal, reported
    /// once through the bus, and returned as the error. There is no
    /// automatic retry.
    pub async fn start(
        source: &dyn FrameSource,
        hardware: Box<dyn Decoder>,
        software: Box<dyn Decoder>,
        params: ScanParams,
        bus: EventBus,
    ) -> Result<ScanSession> {
        params.validate()?;

        let session_id = Uuid::new_v4();
        let shared = Arc::new(SessionShared {
            session_id,
            state: RwLock::new(ScanState::Idle),
            running: AtomicBool::new(false),
            bus,
        });

        info!("Starting scan session {}", session_id);
        shared.transition(ScanState::Acquiring, None).await;

        let feed = match source.acquire() {
            Ok(feed) => feed,
            Err(e) => {
                shared.fail(SessionErrorKind::Resource, e.to_string()).await;
                return Err(e);
            }
        };

        let backend =
            match DecoderBackend::select(hardware, software, params.software_poll_interval()) {
                Ok(backend) => backend,
                Err(e) => {
                    feed.release();
                    shared
                        .fail(SessionErrorKind::BackendUnavailable, e.to_string())
                        .await;
                    return Err(e);
                }
            };

        info!("Session {} using {} backend", session_id, backend.kind());
        shared.bus.emit_lossy(ScanEvent::BackendSelected {
            session_id,
            backend: backend.kind(),
            timestamp: chrono::Utc::now(),
        });

        shared.running.store(true, Ordering::SeqCst);
        shared.transition(ScanState::Detecting, None).await;

        let (stop_tx, stop_rx) = watch::channel(false);
        let runtime = SessionRuntime {
            shared: Arc::clone(&shared),
            feed: Some(feed),
            backend,
            window: ConsensusWindow::new(params.window_size, params.min_consensus),
            grace: params.invalid_grace(),
            invalid_deadline: None,
            stop_rx,
        };
        let worker = tokio::spawn(runtime.run());

        Ok(ScanSession {
            shared,
            worker: Mutex::new(Some(worker)),
            stop_tx,
        })
    }

    /// This session's identifier
    pub fn id(&self) -> Uuid {
        self.shared.session_id
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ScanState {
        *self.shared.state.read().await
    }

    /// True between a successful start and the session's end
    pub fn is_active(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Stop the session and wait for its resources to be released
    ///
    /// Idempotent: stopping an already-ended session (including one that
    /// confirmed on its own) is a no-op. Never errors.
    pub async fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let _ = self.stop_tx.send(true);

        if let Some(worker) = self.worker.lock().await.take() {
            debug!("Waiting for session {} worker", self.shared.session_id);
            let _ = worker.await;
        }
    }
}

impl Drop for ScanSession {
    /// Owner teardown: signal the worker, which releases everything it owns
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let _ = self.stop_tx.send(true);
    }
}

/// How a worker run ended
enum Exit {
    Confirmed {
        code: String,
        verification: Verification,
    },
    Stopped,
    Lost(String),
}

/// Everything the worker task owns
struct SessionRuntime {
    shared: Arc<SessionShared>,
    feed: Option<FrameFeed>,
    backend: DecoderBackend,
    window: ConsensusWindow,
    grace: Duration,
    invalid_deadline: Option<Instant>,
    stop_rx: watch::Receiver<bool>,
}

impl SessionRuntime {
    async fn run(mut self) {
        let exit = match self.backend.cadence() {
            Cadence::FrameDriven => self.run_frame_driven().await,
            Cadence::Interval(period) => self.run_interval(period).await,
        };
        self.finish(exit).await;
    }

    /// Hardware cadence: poll every frame as the source produces it
    async fn run_frame_driven(&mut self) -> Exit {
        enum Wake {
            Stop,
            GraceElapsed,
            Frame(Option<Frame>),
        }

        loop {
            if !self.shared.running.load(Ordering::SeqCst) {
                return Exit::Stopped;
            }

            let deadline = self.invalid_deadline;
            let wake = {
                let feed = self.feed.as_mut().expect("feed held until disposal");
                tokio::select! {
                    _ = self.stop_rx.changed() => Wake::Stop,
                    _ = grace_wait(deadline) => Wake::GraceElapsed,
                    frame = feed.next_frame() => Wake::Frame(frame),
                }
            };

            match wake {
                Wake::Stop => return Exit::Stopped,
                Wake::GraceElapsed => self.recover_from_invalid().await,
                Wake::Frame(None) => return Exit::Lost("frame source closed".to_string()),
                Wake::Frame(Some(frame)) => {
                    if let Some(exit) = self.handle_frame(&frame).await {
                        return exit;
                    }
                }
            }
        }
    }

    /// Software cadence: fixed-interval polls over the newest pending frame
    async fn run_interval(&mut self, period: Duration) -> Exit {
        enum Wake {
            Stop,
            GraceElapsed,
            Tick,
        }

        let mut tick = interval(period);
        loop {
            if !self.shared.running.load(Ordering::SeqCst) {
                return Exit::Stopped;
            }

            let deadline = self.invalid_deadline;
            let wake = tokio::select! {
                _ = self.stop_rx.changed() => Wake::Stop,
                _ = grace_wait(deadline) => Wake::GraceElapsed,
                _ = tick.tick() => Wake::Tick,
            };

            match wake {
                Wake::Stop => return Exit::Stopped,
                Wake::GraceElapsed => self.recover_from_invalid().await,
                Wake::Tick => {
                    let frame = match self
                        .feed
                        .as_mut()
                        .expect("feed held until disposal")
                        .latest_frame()
                    {
                        Ok(frame) => frame,
                        Err(e) => return Exit::Lost(e.to_string()),
                    };
                    // No frame since the last tick is simply a quiet tick
                    if let Some(frame) = frame {
                        if let Some(exit) = self.handle_frame(&frame).await {
                            return exit;
                        }
                    }
                }
            }
        }
    }

    /// Decode and judge one frame; `Some(exit)` ends the session
    async fn handle_frame(&mut self, frame: &Frame) -> Option<Exit> {
        let read = self.backend.poll_once(frame)?;

        let outcome = symbology::validate(&read.value);
        match outcome.verdict {
            Verdict::Rejected(reason) => {
                self.note_rejection(outcome.value, reason).await;
                None
            }
            Verdict::Accepted(verification) => {
                self.note_acceptance(outcome.value, verification).await
            }
        }
    }

    /// An invalid read: enter (or stay in) Invalid and re-arm the grace
    /// deadline. The window keeps its votes until recovery.
    async fn note_rejection(&mut self, value: String, reason: RejectReason) {
        self.invalid_deadline = Some(Instant::now() + self.grace);
        self.shared.transition(ScanState::Invalid, None).await;
        self.shared.bus.emit_lossy(ScanEvent::ReadRejected {
            session_id: self.shared.session_id,
            value,
            reason,
            timestamp: chrono::Utc::now(),
        });
    }

    /// An accepted read: vote it, confirm on threshold, otherwise report
    /// progress
    async fn note_acceptance(
        &mut self,
        value: String,
        verification: Verification,
    ) -> Option<Exit> {
        if *self.shared.state.read().await == ScanState::Invalid {
            // Only the grace timer leaves Invalid; stray accepted reads
            // during the episode are discarded
            debug!(
                "Session {} discarding read during invalid grace: {}",
                self.shared.session_id, value
            );
            return None;
        }

        let push = self.window.push(value);
        let candidate = CandidateInfo {
            value: push.leading_value,
            count: push.leading_count,
            threshold: push.threshold,
        };

        if let Some(code) = push.consensus {
            // The confirming value is always the one just pushed: a push
            // only raises its own count, and eviction only lowers others
            return Some(Exit::Confirmed { code, verification });
        }

        self.shared
            .transition(ScanState::Verifying, Some(candidate.clone()))
            .await;
        self.shared.bus.emit_lossy(ScanEvent::ConsensusProgress {
            session_id: self.shared.session_id,
            candidate,
            timestamp: chrono::Utc::now(),
        });
        None
    }

    /// Grace period passed with no further invalid read: forget the old
    /// votes and scan fresh
    async fn recover_from_invalid(&mut self) {
        self.invalid_deadline = None;
        self.window.reset();
        debug!(
            "Session {} recovered from invalid read",
            self.shared.session_id
        );
        self.shared.transition(ScanState::Detecting, None).await;
    }

    /// Terminal bookkeeping for every exit path
    async fn finish(mut self, exit: Exit) {
        match exit {
            Exit::Confirmed { code, verification } => {
                // Inactive before any subscriber hears about it, so a
                // callback starting a new session cannot race this one
                self.shared.running.store(false, Ordering::SeqCst);
                self.shared.transition(ScanState::Confirmed, None).await;
                self.dispose();
                info!(
                    "Session {} confirmed {} ({})",
                    self.shared.session_id, code, verification
                );
                self.shared.bus.emit_lossy(ScanEvent::CodeConfirmed {
                    session_id: Some(self.shared.session_id),
                    code,
                    verification,
                    timestamp: chrono::Utc::now(),
                });
            }
            Exit::Stopped => {
                self.shared.running.store(false, Ordering::SeqCst);
                self.dispose();
                self.shared.transition(ScanState::Stopped, None).await;
                info!("Session {} stopped", self.shared.session_id);
            }
            Exit::Lost(message) => {
                self.dispose();
                self.shared.fail(SessionErrorKind::Resource, message).await;
            }
        }
    }

    /// The single teardown routine
    ///
    /// Poll cancellation already happened by leaving the loop. Releases the
    /// feed, closes the decoder, clears the window and the grace deadline,
    /// each at most once.
    fn dispose(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.release();
        }
        self.backend.close();
        self.window.reset();
        self.invalid_deadline = None;
    }
}

/// Pending-forever unless a grace deadline is armed
async fn grace_wait(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
