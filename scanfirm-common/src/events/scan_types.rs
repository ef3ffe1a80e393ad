//! Scan vocabulary shared between the engine and event consumers
//!
//! These types appear in `ScanEvent` payloads and in the engine's public
//! accessors. They are plain data: every enum here is `Copy` and serializes
//! to the same strings its `Display` impl produces.

use serde::{Deserialize, Serialize};

/// Scan session lifecycle state
///
/// Sessions move `Idle -> Acquiring -> Detecting <-> Verifying <-> Invalid
/// -> Confirmed`, with `Stopped` reachable from any state. `Confirmed` and
/// `Stopped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Acquiring,
    Detecting,
    Verifying,
    Invalid,
    Confirmed,
    Stopped,
}

impl ScanState {
    /// True for states that no transition ever leaves
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Confirmed | ScanState::Stopped)
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanState::Idle => write!(f, "idle"),
            ScanState::Acquiring => write!(f, "acquiring"),
            ScanState::Detecting => write!(f, "detecting"),
            ScanState::Verifying => write!(f, "verifying"),
            ScanState::Invalid => write!(f, "invalid"),
            ScanState::Confirmed => write!(f, "confirmed"),
            ScanState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Which decoding backend drives a session
///
/// Selected once during acquisition and immutable for the session lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Native decoder polled at the frame source's own pace
    HardwareAssisted,
    /// Library decoder polled on a fixed interval
    Software,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::HardwareAssisted => write!(f, "hardware-assisted"),
            BackendKind::Software => write!(f, "software"),
        }
    }
}

/// Why a decoded read was rejected
///
/// Rejections are feedback, not errors: the session surfaces them and keeps
/// scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectReason {
    /// Not a recognized length, or contains non-digits
    Format,
    /// Recognized symbology but the check digit does not match
    Checksum,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Format => write!(f, "format"),
            RejectReason::Checksum => write!(f, "checksum"),
        }
    }
}

/// How a confirmed code earned trust
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verification {
    /// EAN-13 check digit verified
    Ean13,
    /// EAN-8 check digit verified
    Ean8,
    /// UPC-A check digit verified
    UpcA,
    /// Plausible length and digits only; no check digit applied
    FormatOnly,
    /// Operator-typed entry, bypasses validation entirely
    Manual,
}

impl Verification {
    /// True when a symbology check digit was actually verified
    pub fn is_checksum_verified(&self) -> bool {
        matches!(
            self,
            Verification::Ean13 | Verification::Ean8 | Verification::UpcA
        )
    }
}

impl std::fmt::Display for Verification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verification::Ean13 => write!(f, "ean13"),
            Verification::Ean8 => write!(f, "ean8"),
            Verification::UpcA => write!(f, "upc-a"),
            Verification::FormatOnly => write!(f, "format-only"),
            Verification::Manual => write!(f, "manual"),
        }
    }
}

/// Fatal session failure categories
///
/// Only fatal failures are reported through `ScanEvent::SessionError`;
/// per-frame decode noise never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionErrorKind {
    /// Frame source denied, busy, or lost
    Resource,
    /// Neither decoding backend probed as available
    BackendUnavailable,
}

impl std::fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionErrorKind::Resource => write!(f, "resource"),
            SessionErrorKind::BackendUnavailable => write!(f, "backend-unavailable"),
        }
    }
}

/// Leading-vote progress detail attached to consensus feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInfo {
    /// Value currently holding the most votes in the window
    pub value: String,
    /// Number of votes the leading value holds
    pub count: usize,
    /// Votes required for confirmation
    pub threshold: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_state_serializes_lowercase() {
        let json = serde_json::to_string(&ScanState::Verifying).unwrap();
        assert_eq!(json, "\"verifying\"");
        let back: ScanState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ScanState::Verifying);
    }

    #[test]
    fn display_matches_serde_strings() {
        assert_eq!(ScanState::Acquiring.to_string(), "acquiring");
        assert_eq!(BackendKind::HardwareAssisted.to_string(), "hardware-assisted");
        assert_eq!(Verification::UpcA.to_string(), "upc-a");
        assert_eq!(SessionErrorKind::BackendUnavailable.to_string(), "backend-unavailable");
    }

    #[test]
    fn terminal_states() {
        assert!(ScanState::Confirmed.is_terminal());
        assert!(ScanState::Stopped.is_terminal());
        assert!(!ScanState::Verifying.is_terminal());
        assert!(!ScanState::Invalid.is_terminal());
    }

    #[test]
    fn verification_grades() {
        assert!(Verification::Ean8.is_checksum_verified());
        assert!(!Verification::FormatOnly.is_checksum_verified());
        assert!(!Verification::Manual.is_checksum_verified());
    }
}
