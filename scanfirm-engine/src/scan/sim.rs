//! Scripted frame source and decoder
//!
//! The engine normally runs against camera hardware that development and
//! test environments do not have. The scripted pair closes the loop
//! deterministically: the camera emits frames whose payload is the decode
//! script (the bytes the decoder "sees"), and the scripted decoder reads
//! the payload straight back. The demo binary and the integration suite
//! both drive sessions through these.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

use super::backend::Decoder;
use super::frame::{Frame, FrameFeed, FrameSource};
use crate::error::{Error, Result};

/// What one scripted frame yields at the decoder
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// No barcode detected in this frame
    Nothing,
    /// Decoder reports this string
    Read(String),
}

impl ScriptStep {
    /// Shorthand for a detected read
    pub fn read(value: &str) -> Self {
        ScriptStep::Read(value.to_string())
    }
}

/// Parse a frame script from text, one step per line
///
/// `-` means no detection, `#` starts a comment, blank lines are skipped,
/// anything else is the decoded string for that frame.
pub fn parse_script(text: &str) -> Vec<ScriptStep> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            if line == "-" {
                ScriptStep::Nothing
            } else {
                ScriptStep::read(line)
            }
        })
        .collect()
}

struct CameraInner {
    script: Vec<ScriptStep>,
    frame_interval: Duration,
    close_when_exhausted: bool,
    deny: bool,
    acquired: AtomicBool,
    release_count: AtomicUsize,
}

/// Deterministic frame source driven by a script
///
/// Emits one frame per `frame_interval`. Once the script is exhausted it
/// keeps emitting empty frames, unless built with `closing_after`, in which
/// case the feed ends and the session sees the device as lost.
#[derive(Clone)]
pub struct ScriptedCamera {
    inner: Arc<CameraInner>,
}

impl ScriptedCamera {
    /// Camera that plays `script` then idles on empty frames
    pub fn new(script: Vec<ScriptStep>, frame_interval: Duration) -> Self {
        Self::build(script, frame_interval, false, false)
    }

    /// Camera that plays `script` then closes the feed (device lost)
    pub fn closing_after(script: Vec<ScriptStep>, frame_interval: Duration) -> Self {
        Self::build(script, frame_interval, true, false)
    }

    /// Camera that refuses acquisition (permission denied)
    pub fn denied() -> Self {
        Self::build(Vec::new(), Duration::from_millis(33), false, true)
    }

    fn build(
        script: Vec<ScriptStep>,
        frame_interval: Duration,
        close_when_exhausted: bool,
        deny: bool,
    ) -> Self {
        Self {
            inner: Arc::new(CameraInner {
                script,
                frame_interval,
                close_when_exhausted,
                deny,
                acquired: AtomicBool::new(false),
                release_count: AtomicUsize::new(0),
            }),
        }
    }

    /// How many times an acquired feed has been released
    pub fn release_count(&self) -> usize {
        self.inner.release_count.load(Ordering::SeqCst)
    }

    /// True while a feed is outstanding
    pub fn is_acquired(&self) -> bool {
        self.inner.acquired.load(Ordering::SeqCst)
    }
}

impl FrameSource for ScriptedCamera {
    fn acquire(&self) -> Result<FrameFeed> {
        if self.inner.deny {
            return Err(Error::Resource("camera permission denied".to_string()));
        }
        if self
            .inner
            .acquired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Resource(
                "camera already in use by another session".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(8);
        let producer_inner = Arc::clone(&self.inner);
        let producer = tokio::spawn(async move {
            let mut seq: u64 = 0;
            loop {
                let step = producer_inner.script.get(seq as usize);
                if step.is_none() && producer_inner.close_when_exhausted {
                    trace!("scripted camera out of frames, closing feed");
                    break;
                }

                let payload: Arc<[u8]> = match step {
                    Some(ScriptStep::Read(s)) => Arc::from(s.as_bytes().to_vec().into_boxed_slice()),
                    Some(ScriptStep::Nothing) | None => Arc::from(Vec::new().into_boxed_slice()),
                };
                let frame = Frame {
                    seq,
                    captured_at: Instant::now(),
                    data: payload,
                };
                if tx.send(frame).await.is_err() {
                    break; // feed dropped
                }
                seq += 1;
                tokio::time::sleep(producer_inner.frame_interval).await;
            }
        });

        let abort = producer.abort_handle();
        let release_inner = Arc::clone(&self.inner);
        Ok(FrameFeed::new(rx, move || {
            abort.abort();
            release_inner.acquired.store(false, Ordering::SeqCst);
            release_inner.release_count.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// Scripted decoder that reads frame payloads back as decode results
///
/// An empty payload is "no detection". A `fail_every` setting makes every
/// Nth poll fail internally, exercising the rule that decoder faults cost
/// one frame and nothing else.
pub struct ScriptedDecoder {
    available: bool,
    fail_every: Option<u64>,
    polls: Arc<AtomicU64>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedDecoder {
    /// Decoder that probes as available
    pub fn available() -> Self {
        Self {
            available: true,
            fail_every: None,
            polls: Arc::new(AtomicU64::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Decoder that probes as unavailable
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    /// Available decoder whose every `n`th poll fails internally
    pub fn failing_every(n: u64) -> Self {
        Self {
            fail_every: Some(n),
            ..Self::available()
        }
    }

    /// Counter handle for polls, usable after the decoder is boxed away
    pub fn poll_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.polls)
    }

    /// Counter handle for close calls
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

impl Decoder for ScriptedDecoder {
    fn probe(&self) -> bool {
        self.available
    }

    fn poll_once(&mut self, frame: &Frame) -> Option<String> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(every) = self.fail_every {
            if poll % every == 0 {
                // Internal decoder fault; maps to a missed frame
                trace!("scripted decoder fault on poll {}", poll);
                return None;
            }
        }

        if frame.data.is_empty() {
            return None;
        }
        std::str::from_utf8(&frame.data).ok().map(str::to_string)
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_script_handles_gaps_and_comments() {
        let script = parse_script("# warmup\n-\n73513537\n\n-\n73513537\n");
        assert_eq!(script.len(), 4);
        assert!(matches!(script[0], ScriptStep::Nothing));
        assert!(matches!(script[1], ScriptStep::Read(ref s) if s == "73513537"));
        assert!(matches!(script[3], ScriptStep::Read(ref s) if s == "73513537"));
    }

    #[tokio::test]
    async fn camera_is_exclusive_until_released() {
        let camera = ScriptedCamera::new(vec![ScriptStep::Nothing], Duration::from_millis(10));

        let feed = camera.acquire().expect("first acquire");
        assert!(camera.is_acquired());
        assert!(matches!(camera.acquire(), Err(Error::Resource(_))));

        feed.release();
        assert!(!camera.is_acquired());
        assert_eq!(camera.release_count(), 1);

        // Free again after release
        let feed2 = camera.acquire().expect("second acquire after release");
        feed2.release();
        assert_eq!(camera.release_count(), 2);
    }

    #[tokio::test]
    async fn denied_camera_refuses_acquire() {
        let camera = ScriptedCamera::denied();
        assert!(matches!(camera.acquire(), Err(Error::Resource(_))));
        assert_eq!(camera.release_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn camera_plays_script_in_order() {
        let camera = ScriptedCamera::new(
            vec![ScriptStep::read("one"), ScriptStep::Nothing, ScriptStep::read("two")],
            Duration::from_millis(10),
        );
        let mut feed = camera.acquire().unwrap();
        let mut decoder = ScriptedDecoder::available();

        let f0 = feed.next_frame().await.unwrap();
        assert_eq!(decoder.poll_once(&f0), Some("one".to_string()));

        let f1 = feed.next_frame().await.unwrap();
        assert_eq!(decoder.poll_once(&f1), None);

        let f2 = feed.next_frame().await.unwrap();
        assert_eq!(decoder.poll_once(&f2), Some("two".to_string()));

        // Script exhausted: camera idles with empty frames
        let f3 = feed.next_frame().await.unwrap();
        assert_eq!(decoder.poll_once(&f3), None);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_camera_ends_the_feed() {
        let camera =
            ScriptedCamera::closing_after(vec![ScriptStep::read("one")], Duration::from_millis(10));
        let mut feed = camera.acquire().unwrap();

        assert!(feed.next_frame().await.is_some());
        assert!(feed.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn failing_decoder_skips_every_nth_poll() {
        let mut decoder = ScriptedDecoder::failing_every(2);
        let frame = Frame {
            seq: 0,
            captured_at: Instant::now(),
            data: Arc::from(b"73513537".to_vec().into_boxed_slice()),
        };

        assert_eq!(decoder.poll_once(&frame), Some("73513537".to_string()));
        assert_eq!(decoder.poll_once(&frame), None); // fault
        assert_eq!(decoder.poll_once(&frame), Some("73513537".to_string()));
        assert_eq!(decoder.poll_counter().load(Ordering::SeqCst), 3);
    }
}
