//! Multi-frame consensus confirmation
//!
//! Optical decodes are noisy: a single frame can misread a digit and still
//! pass a checksum. The consensus window remembers the most recent accepted
//! reads and confirms a value only once it has been seen `min_consensus`
//! times within the window, trading a little latency for a large accuracy
//! gain.
//!
//! The window does not latch after confirming; the owning session stops
//! pushing on the first `Some(consensus)`, which keeps confirmation
//! exactly-once per session.

use std::collections::VecDeque;

/// Result of adding one accepted read to the window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    /// The confirmed value, once the leading count reaches the threshold
    pub consensus: Option<String>,
    /// Value currently holding the most votes
    pub leading_value: String,
    /// Votes the leading value holds
    pub leading_count: usize,
    /// Votes required for confirmation
    pub threshold: usize,
}

/// Bounded FIFO of recent accepted reads with majority-vote confirmation
///
/// Owned by exactly one scan session; never shared across sessions.
#[derive(Debug)]
pub struct ConsensusWindow {
    history: VecDeque<String>,
    window_size: usize,
    min_consensus: usize,
}

impl ConsensusWindow {
    /// Create a window holding at most `window_size` reads, confirming at
    /// `min_consensus` votes
    ///
    /// Bounds are validated upstream by `ScanParams::validate`.
    pub fn new(window_size: usize, min_consensus: usize) -> Self {
        debug_assert!(window_size >= 1, "window_size must be at least 1");
        debug_assert!(
            (1..=window_size).contains(&min_consensus),
            "min_consensus must be in [1, window_size]"
        );
        Self {
            history: VecDeque::with_capacity(window_size),
            window_size,
            min_consensus,
        }
    }

    /// Add an accepted read and re-evaluate the vote
    ///
    /// The oldest read is evicted first once the window is full; evicted
    /// reads no longer count toward any value. Returns the confirmed value
    /// when the leading count reaches the threshold, otherwise the leading
    /// candidate for progress feedback.
    pub fn push(&mut self, value: impl Into<String>) -> PushOutcome {
        self.history.push_back(value.into());
        while self.history.len() > self.window_size {
            self.history.pop_front();
        }

        let (leading_value, leading_count) = self.leading();
        let consensus = (leading_count >= self.min_consensus).then(|| leading_value.clone());

        PushOutcome {
            consensus,
            leading_value,
            leading_count,
            threshold: self.min_consensus,
        }
    }

    /// Leading value by vote count
    ///
    /// Ties break toward the value whose first occurrence in the current
    /// history is earliest, so the reported leader never flips between two
    /// equally-voted values as frames arrive.
    fn leading(&self) -> (String, usize) {
        let mut best: Option<(&String, usize)> = None;
        for (i, value) in self.history.iter().enumerate() {
            if self.history.iter().take(i).any(|v| v == value) {
                continue; // already counted at its first occurrence
            }
            let count = self.history.iter().filter(|v| *v == value).count();
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((value, count)),
            }
        }
        let (value, count) = best.expect("history is non-empty after push");
        (value.clone(), count)
    }

    /// Discard all remembered reads
    ///
    /// Called on the Invalid-to-Detecting recovery and during session
    /// teardown, so stale votes never carry across episodes.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Number of reads currently remembered
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// True when no reads are remembered
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
