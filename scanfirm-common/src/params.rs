//! Scan parameter management
//!
//! All engine tunables live in a single `ScanParams` struct. Every field has
//! a built-in default so the engine runs with no configuration at all; a
//! TOML `[scan]` section or CLI flags may override individual fields.
//!
//! Sessions take an owned copy at start. There is no global parameter state
//! and no mid-session reconfiguration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Engine tunables, one owned copy per session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanParams {
    /// Consensus window capacity (reads remembered)
    ///
    /// Valid range: [1, 64]
    /// Default: 4
    /// Older reads are evicted FIFO once the window is full.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Votes required to confirm a value
    ///
    /// Valid range: [1, window_size]
    /// Default: 2
    /// A value is confirmed when it holds this many votes in the window.
    #[serde(default = "default_min_consensus")]
    pub min_consensus: usize,

    /// Software-backend poll interval (ms)
    ///
    /// Valid range: [10, 1000]
    /// Default: 100 (10 polls/second)
    /// Bounds CPU when the software decoder is active; stale frames are
    /// skipped, only the newest pending frame is decoded per tick.
    #[serde(default = "default_software_poll_interval_ms")]
    pub software_poll_interval_ms: u64,

    /// Invalid-state recovery grace period (ms)
    ///
    /// Valid range: [100, 30000]
    /// Default: 1500
    /// Time without a further rejected read before the session returns to
    /// Detecting. Each rejection re-arms the deadline.
    #[serde(default = "default_invalid_grace_ms")]
    pub invalid_grace_ms: u64,

    /// Event bus channel capacity
    ///
    /// Valid range: [8, 4096]
    /// Default: 256
    /// Events buffered before slow subscribers start lagging.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_window_size() -> usize {
    4
}

fn default_min_consensus() -> usize {
    2
}

fn default_software_poll_interval_ms() -> u64 {
    100
}

fn default_invalid_grace_ms() -> u64 {
    1500
}

fn default_event_capacity() -> usize {
    256
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            min_consensus: default_min_consensus(),
            software_poll_interval_ms: default_software_poll_interval_ms(),
            invalid_grace_ms: default_invalid_grace_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl ScanParams {
    /// Validate all fields against their documented ranges
    ///
    /// Called after config merging and again by `ScanSession::start`.
    pub fn validate(&self) -> Result<()> {
        if !(1..=64).contains(&self.window_size) {
            return Err(Error::Config(format!(
                "window_size: value {} out of range [1, 64]",
                self.window_size
            )));
        }
        if self.min_consensus < 1 || self.min_consensus > self.window_size {
            return Err(Error::Config(format!(
                "min_consensus: value {} out of range [1, window_size={}]",
                self.min_consensus, self.window_size
            )));
        }
        if !(10..=1000).contains(&self.software_poll_interval_ms) {
            return Err(Error::Config(format!(
                "software_poll_interval_ms: value {} out of range [10, 1000]",
                self.software_poll_interval_ms
            )));
        }
        if !(100..=30000).contains(&self.invalid_grace_ms) {
            return Err(Error::Config(format!(
                "invalid_grace_ms: value {} out of range [100, 30000]",
                self.invalid_grace_ms
            )));
        }
        if !(8..=4096).contains(&self.event_capacity) {
            return Err(Error::Config(format!(
                "event_capacity: value {} out of range [8, 4096]",
                self.event_capacity
            )));
        }
        Ok(())
    }

    /// Software-backend poll interval as a Duration
    pub fn software_poll_interval(&self) -> Duration {
        Duration::from_millis(self.software_poll_interval_ms)
    }

    /// Invalid-state grace period as a Duration
    pub fn invalid_grace(&self) -> Duration {
        Duration::from_millis(self.invalid_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let params = ScanParams::default();

        assert_eq!(params.window_size, 4);
        assert_eq!(params.min_consensus, 2);
        assert_eq!(params.software_poll_interval_ms, 100);
        assert_eq!(params.invalid_grace_ms, 1500);
        assert_eq!(params.event_capacity, 256);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_duration_helpers() {
        let params = ScanParams::default();
        assert_eq!(params.software_poll_interval(), Duration::from_millis(100));
        assert_eq!(params.invalid_grace(), Duration::from_millis(1500));
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let params = ScanParams {
            window_size: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_consensus_above_window() {
        let params = ScanParams {
            window_size: 2,
            min_consensus: 3,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_min_consensus_of_one() {
        // Confirms on the first accepted read; unusual but permitted
        let params = ScanParams {
            min_consensus: 1,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_intervals() {
        let too_fast = ScanParams {
            software_poll_interval_ms: 5,
            ..Default::default()
        };
        assert!(too_fast.validate().is_err());

        let too_short = ScanParams {
            invalid_grace_ms: 50,
            ..Default::default()
        };
        assert!(too_short.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_toml_fills_defaults() {
        let toml_str = "window_size = 6";
        let params: ScanParams = toml::from_str(toml_str).unwrap();
        assert_eq!(params.window_size, 6);
        assert_eq!(params.min_consensus, 2);
        assert_eq!(params.software_poll_interval_ms, 100);
    }
}
