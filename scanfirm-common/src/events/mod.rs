//! Event types for the scanfirm event system
//!
//! Provides shared event definitions and the EventBus used by the engine
//! and any attached UI layer.

// Sub-modules (supporting types)
mod scan_types;

pub use scan_types::{
    BackendKind, CandidateInfo, RejectReason, ScanState, SessionErrorKind, Verification,
};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Scanfirm event types
///
/// Events are broadcast via EventBus and serialize as tagged JSON, ready
/// for SSE transmission to a browser overlay or any other consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    /// Session moved to a new lifecycle state
    ///
    /// Triggers:
    /// - UI: swap the scan overlay (reticle, progress ring, error frame)
    /// - Telemetry: record time spent per state
    SessionStateChanged {
        /// Session this transition belongs to
        session_id: Uuid,
        /// State before the transition
        old_state: ScanState,
        /// State after the transition
        new_state: ScanState,
        /// Leading-vote detail, present when entering Verifying
        candidate: Option<CandidateInfo>,
        /// When the transition happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Decoding backend chosen for the session
    ///
    /// Emitted once per session, between acquisition and the first poll.
    ///
    /// Triggers:
    /// - UI: show a "slow scanner" hint when the software fallback is active
    BackendSelected {
        /// Session the backend was selected for
        session_id: Uuid,
        /// The selected backend
        backend: BackendKind,
        /// When selection happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An accepted read was added to the consensus window without reaching
    /// the confirmation threshold
    ///
    /// Emitted on every below-threshold push, so consumers can render vote
    /// progress continuously.
    ///
    /// Triggers:
    /// - UI: update the "hold steady" progress indicator
    ConsensusProgress {
        /// Session accumulating votes
        session_id: Uuid,
        /// Current leading value with its vote count and threshold
        candidate: CandidateInfo,
        /// When the push happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A decoded read failed validation
    ///
    /// Non-fatal feedback; the session keeps scanning. Format and checksum
    /// failures are distinguished here for telemetry even though the scan
    /// surface treats them alike.
    ///
    /// Triggers:
    /// - UI: flash the invalid-read frame
    ReadRejected {
        /// Session that produced the read
        session_id: Uuid,
        /// The rejected string as decoded
        value: String,
        /// Why it was rejected
        reason: RejectReason,
        /// When the rejection happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A code was confirmed
    ///
    /// Emitted exactly once per session (or once per accepted manual
    /// submission, with no session id). The session is already inactive and
    /// its resources released when this event is observed.
    ///
    /// Triggers:
    /// - UI: dismiss the scanner, hand the code to product lookup
    CodeConfirmed {
        /// Originating session, None for manual entry
        session_id: Option<Uuid>,
        /// The confirmed code
        code: String,
        /// How the code earned trust
        verification: Verification,
        /// When confirmation happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A session ended with a fatal error
    ///
    /// Emitted at most once per session, after the transition to Stopped.
    /// Per-frame decode noise never produces this event.
    ///
    /// Triggers:
    /// - UI: show the camera/scanner error panel with a retry affordance
    SessionError {
        /// Session that failed
        session_id: Uuid,
        /// Failure category
        kind: SessionErrorKind,
        /// Human-readable detail
        message: String,
        /// When the failure was detected
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ScanEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            ScanEvent::SessionStateChanged { .. } => "SessionStateChanged",
            ScanEvent::BackendSelected { .. } => "BackendSelected",
            ScanEvent::ConsensusProgress { .. } => "ConsensusProgress",
            ScanEvent::ReadRejected { .. } => "ReadRejected",
            ScanEvent::CodeConfirmed { .. } => "CodeConfirmed",
            ScanEvent::SessionError { .. } => "SessionError",
        }
    }
}

/// Broadcast bus for scan events
///
/// Wraps `tokio::sync::broadcast` so every component talks to one shared
/// fan-out channel:
/// - Multiple producers (sessions, manual entry)
/// - Multiple subscribers (UI overlay, telemetry, tests)
/// - Lagged-subscriber detection via the broadcast error type
///
/// # Examples
///
/// ```
/// use scanfirm_common::events::{EventBus, ScanEvent, ScanState};
/// use std::sync::Arc;
///
/// let event_bus = Arc::new(EventBus::new(256));
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(ScanEvent::SessionStateChanged {
///     session_id: uuid::Uuid::new_v4(),
///     old_state: ScanState::Idle,
///     new_state: ScanState::Acquiring,
///     candidate: None,
///     timestamp: chrono::Utc::now(),
/// }).ok();
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// `capacity` is the number of events buffered before old events are
    /// dropped for slow subscribers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: ScanEvent) -> Result<usize, broadcast::error::SendError<ScanEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Used for feedback events where it is acceptable that no component is
    /// currently listening.
    pub fn emit_lossy(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_progress(session_id: Uuid) -> ScanEvent {
        ScanEvent::ConsensusProgress {
            session_id,
            candidate: CandidateInfo {
                value: "4006381333931".to_string(),
                count: 1,
                threshold: 2,
            },
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(10);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit(sample_progress(Uuid::new_v4()))
            .expect("emit should succeed");

        let received = rx.try_recv().expect("Should receive event");
        assert_eq!(received.event_type(), "ConsensusProgress");
    }

    #[test]
    fn test_eventbus_emit_lossy() {
        let bus = EventBus::new(2); // Small capacity
        let mut _rx = bus.subscribe(); // Subscribe but don't receive

        // Fill the channel past capacity
        for _ in 0..10 {
            bus.emit_lossy(sample_progress(Uuid::new_v4())); // Should not panic even when full
        }

        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        let session_id = Uuid::new_v4();
        bus.emit(ScanEvent::BackendSelected {
            session_id,
            backend: BackendKind::Software,
            timestamp: chrono::Utc::now(),
        })
        .expect("emit should succeed");

        let r1 = rx1.try_recv().expect("rx1 should receive");
        let r2 = rx2.try_recv().expect("rx2 should receive");
        assert_eq!(r1.event_type(), "BackendSelected");
        assert_eq!(r2.event_type(), "BackendSelected");
    }

    #[test]
    fn test_event_serialization_tagged() {
        let event = ScanEvent::CodeConfirmed {
            session_id: None,
            code: "012345678905".to_string(),
            verification: Verification::Manual,
            timestamp: chrono::Utc::now(),
        };

        assert_eq!(event.event_type(), "CodeConfirmed");

        let json = serde_json::to_string(&event).expect("Event serialization should succeed");
        assert!(json.contains("\"type\":\"CodeConfirmed\""));
        assert!(json.contains("\"verification\":\"manual\""));

        let deserialized: ScanEvent =
            serde_json::from_str(&json).expect("Event deserialization should succeed");
        match deserialized {
            ScanEvent::CodeConfirmed {
                code, verification, ..
            } => {
                assert_eq!(code, "012345678905");
                assert_eq!(verification, Verification::Manual);
            }
            _ => panic!("Wrong event type deserialized"),
        }
    }

    #[test]
    fn test_event_type_method() {
        let session_id = Uuid::new_v4();
        let events = vec![
            (
                ScanEvent::SessionStateChanged {
                    session_id,
                    old_state: ScanState::Idle,
                    new_state: ScanState::Acquiring,
                    candidate: None,
                    timestamp: chrono::Utc::now(),
                },
                "SessionStateChanged",
            ),
            (
                ScanEvent::ReadRejected {
                    session_id,
                    value: "4006381333930".to_string(),
                    reason: RejectReason::Checksum,
                    timestamp: chrono::Utc::now(),
                },
                "ReadRejected",
            ),
            (
                ScanEvent::SessionError {
                    session_id,
                    kind: SessionErrorKind::Resource,
                    message: "camera denied".to_string(),
                    timestamp: chrono::Utc::now(),
                },
                "SessionError",
            ),
        ];

        for (event, expected_type) in events {
            assert_eq!(event.event_type(), expected_type);
        }
    }
}
