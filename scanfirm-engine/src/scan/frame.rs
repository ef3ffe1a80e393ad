//! Frame source boundary
//!
//! The engine never touches a camera API directly. A `FrameSource` hands
//! out one exclusive `FrameFeed` at a time; the feed delivers opaque frames
//! over a channel and releases the device exactly once, on `release()` or
//! on drop, whichever comes first.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// One captured frame, opaque to the engine
///
/// Only decoder implementations interpret the payload.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic sequence number assigned by the source
    pub seq: u64,
    /// Capture time on the tokio clock
    pub captured_at: Instant,
    /// Raw frame payload
    pub data: Arc<[u8]>,
}

/// Source of frames, typically a camera
///
/// Implementations must refuse a second `acquire` while a feed is
/// outstanding: the device is exclusive to one session.
pub trait FrameSource: Send + Sync {
    /// Acquire exclusive use of the source
    ///
    /// Errors with `Error::Resource` when the device is unavailable,
    /// denied, or already held.
    fn acquire(&self) -> Result<FrameFeed>;
}

/// Exclusive stream of frames from an acquired source
///
/// Holding the feed holds the device.
pub struct FrameFeed {
    frames: mpsc::Receiver<Frame>,
    releaser: Option<Box<dyn FnOnce() + Send>>,
}

impl FrameFeed {
    /// Build a feed from a frame channel and a release action
    ///
    /// The release action runs at most once, from `release()` or drop.
    pub fn new(frames: mpsc::Receiver<Frame>, releaser: impl FnOnce() + Send + 'static) -> Self {
        Self {
            frames,
            releaser: Some(Box::new(releaser)),
        }
    }

    /// Wait for the next frame at the source's native pace
    ///
    /// Returns `None` when the source is gone (device lost or producer
    /// finished); the caller treats that as fatal resource loss.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }

    /// Take the newest pending frame, discarding older ones
    ///
    /// Interval-driven polling decodes at most one frame per tick, and
    /// anything older than the newest pending frame is already stale.
    /// `Ok(None)` means no frame arrived since the last tick.
    pub fn latest_frame(&mut self) -> Result<Option<Frame>> {
        use mpsc::error::TryRecvError;

        let mut newest = None;
        loop {
            match self.frames.try_recv() {
                Ok(frame) => newest = Some(frame),
                Err(TryRecvError::Empty) => return Ok(newest),
                Err(TryRecvError::Disconnected) => {
                    // Deliver a frame already in hand; the loss surfaces on
                    // the next tick
                    if newest.is_some() {
                        return Ok(newest);
                    }
                    return Err(Error::Resource("frame source closed".to_string()));
                }
            }
        }
    }

    /// Release the source explicitly
    pub fn release(mut self) {
        self.run_releaser();
    }

    fn run_releaser(&mut self) {
        if let Some(releaser) = self.releaser.take() {
            releaser();
        }
    }
}

impl Drop for FrameFeed {
    fn drop(&mut self) {
        self.run_releaser();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn frame(seq: u64) -> Frame {
        Frame {
            seq,
            captured_at: Instant::now(),
            data: Arc::from(Vec::new().into_boxed_slice()),
        }
    }

    #[tokio::test]
    async fn latest_frame_keeps_only_the_newest() {
        let (tx, rx) = mpsc::channel(8);
        let mut feed = FrameFeed::new(rx, || {});

        tx.send(frame(1)).await.unwrap();
        tx.send(frame(2)).await.unwrap();
        tx.send(frame(3)).await.unwrap();

        let newest = feed.latest_frame().unwrap();
        assert_eq!(newest.map(|f| f.seq), Some(3));

        // Channel drained; nothing pending now
        assert!(feed.latest_frame().unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_frame_reports_closed_source() {
        let (tx, rx) = mpsc::channel::<Frame>(8);
        let mut feed = FrameFeed::new(rx, || {});
        drop(tx);

        assert!(matches!(feed.latest_frame(), Err(Error::Resource(_))));
    }

    #[tokio::test]
    async fn next_frame_none_after_producer_ends() {
        let (tx, rx) = mpsc::channel(8);
        let mut feed = FrameFeed::new(rx, || {});
        tx.send(frame(1)).await.unwrap();
        drop(tx);

        assert_eq!(feed.next_frame().await.map(|f| f.seq), Some(1));
        assert!(feed.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn release_runs_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));

        let (_tx, rx) = mpsc::channel(1);
        let counter = Arc::clone(&count);
        let feed = FrameFeed::new(rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        feed.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drop_releases_when_not_released_explicitly() {
        let count = Arc::new(AtomicUsize::new(0));

        let (_tx, rx) = mpsc::channel(1);
        let counter = Arc::clone(&count);
        {
            let _feed = FrameFeed::new(rx, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
