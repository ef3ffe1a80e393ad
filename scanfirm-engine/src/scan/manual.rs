//! Manual code entry
//!
//! Bypasses the camera pipeline entirely. A typed code passes a format
//! gate only (8 to 14 ASCII digits) and is then confirmed directly,
//! without checksum verification. That exception is deliberate: the user
//! is reading the number off the package, not a noisy frame.

use scanfirm_common::events::{ScanEvent, Verification};
use scanfirm_common::EventBus;
use tracing::info;

use crate::error::{Error, Result};

/// Confirm a manually entered code
///
/// Accepts 8 to 14 ASCII digits; anything else is [`Error::InvalidInput`]
/// and no event is emitted. On acceptance, emits `CodeConfirmed` with no
/// session id and [`Verification::Manual`], and returns the code.
pub fn confirm_manual_entry(bus: &EventBus, input: &str) -> Result<String> {
    if input.len() < 8 || input.len() > 14 || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidInput(format!(
            "manual entry must be 8 to 14 digits, got {:?}",
            input
        )));
    }

    let code = input.to_string();
    info!("Manual entry confirmed: {}", code);
    bus.emit_lossy(ScanEvent::CodeConfirmed {
        session_id: None,
        code: code.clone(),
        verification: Verification::Manual,
        timestamp: chrono::Utc::now(),
    });

    Ok(code)
}
