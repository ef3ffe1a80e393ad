//! Decoding backend selection
//!
//! Every session is offered two decoder implementations: a
//! hardware-assisted one and a software fallback. Selection happens once
//! during acquisition and the chosen backend is immutable for the session
//! lifetime; there is no mid-session switching and no shared decoder state
//! between sessions.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use scanfirm_common::events::BackendKind;

use super::frame::Frame;
use crate::error::{Error, Result};

/// One decode attempt's output
#[derive(Debug, Clone)]
pub struct RawRead {
    /// The decoded string, unvalidated
    pub value: String,
    /// When the decode completed, on the tokio clock
    pub observed_at: Instant,
}

/// Single-frame decoder contract
///
/// Implementations never panic or error across this boundary: `probe`
/// answers capability, and `poll_once` maps every internal decode failure
/// to `None`, so a bad frame costs nothing but that frame.
pub trait Decoder: Send {
    /// Capability check, called once during backend selection
    fn probe(&self) -> bool;

    /// Attempt to decode one frame
    ///
    /// `None` means no detection, including internal decoder failure.
    fn poll_once(&mut self, frame: &Frame) -> Option<String>;

    /// Release decoder-held resources during session teardown
    fn close(&mut self) {}
}

/// How the poll loop paces decode attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Poll every frame as it arrives, at the source's native pace
    FrameDriven,
    /// Poll the newest pending frame on a fixed interval
    Interval(Duration),
}

/// The decoder selected for a session, with its polling cadence
pub struct DecoderBackend {
    kind: BackendKind,
    cadence: Cadence,
    decoder: Box<dyn Decoder>,
    closed: bool,
}

impl DecoderBackend {
    /// Probe the hardware decoder first, falling back to software
    ///
    /// The hardware path runs frame-driven; the software path runs on
    /// `software_interval` to bound CPU. Errors with `BackendUnavailable`
    /// when neither decoder probes OK.
    pub fn select(
        hardware: Box<dyn Decoder>,
        software: Box<dyn Decoder>,
        software_interval: Duration,
    ) -> Result<Self> {
        if hardware.probe() {
            debug!("Hardware-assisted decoder selected (frame-driven)");
            return Ok(Self {
                kind: BackendKind::HardwareAssisted,
                cadence: Cadence::FrameDriven,
                decoder: hardware,
                closed: false,
            });
        }

        if software.probe() {
            debug!(
                "Hardware decoder unavailable, software fallback selected ({:?} interval)",
                software_interval
            );
            return Ok(Self {
                kind: BackendKind::Software,
                cadence: Cadence::Interval(software_interval),
                decoder: software,
                closed: false,
            });
        }

        Err(Error::BackendUnavailable)
    }

    /// The selected backend kind
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// The polling cadence for this backend
    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// Decode one frame, stamping the observation time
    pub fn poll_once(&mut self, frame: &Frame) -> Option<RawRead> {
        self.decoder.poll_once(frame).map(|value| RawRead {
            value,
            observed_at: Instant::now(),
        })
    }

    /// Close the underlying decoder; later calls are no-ops
    pub fn close(&mut self) {
        if !self.closed {
            self.decoder.close();
            self.closed = true;
        }
    }
}
