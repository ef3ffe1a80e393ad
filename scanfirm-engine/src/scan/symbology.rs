//! Check-digit validation for linear barcode symbologies
//!
//! Classifies a decoded string by length, verifies the GTIN check digit for
//! the symbologies that carry one (EAN-13, EAN-8, UPC-A), and falls back to
//! a length-and-digits plausibility test for everything else. Pure
//! functions, no state, never panics on any input.
//!
//! The fallback deliberately admits codes it cannot arithmetically verify
//! (UPC-E, digit-only Code 128/39): rejecting them outright would make those
//! symbologies unscannable. Consumers can tell the two grades apart through
//! `Verification::FormatOnly`.

use scanfirm_common::events::{RejectReason, Verification};

/// Fallback length bounds for digit strings without a verified check digit
const FALLBACK_MIN_LEN: usize = 6;
const FALLBACK_MAX_LEN: usize = 14;

/// Accept/reject decision for one decoded read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Read accepted, graded by how much verification it received
    Accepted(Verification),
    /// Read rejected; the session surfaces this as feedback and keeps going
    Rejected(RejectReason),
}

/// Outcome of validating one decoded read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// The read exactly as decoded
    pub value: String,
    /// The decision for this read
    pub verdict: Verdict,
}

impl ValidationOutcome {
    /// True when the read was accepted at any verification grade
    pub fn is_valid(&self) -> bool {
        matches!(self.verdict, Verdict::Accepted(_))
    }

    /// Verification grade for accepted reads
    pub fn verification(&self) -> Option<Verification> {
        match self.verdict {
            Verdict::Accepted(v) => Some(v),
            Verdict::Rejected(_) => None,
        }
    }

    /// Rejection reason for rejected reads
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self.verdict {
            Verdict::Accepted(_) => None,
            Verdict::Rejected(r) => Some(r),
        }
    }
}

/// Validate a decoded string against the supported symbologies
///
/// Rules are applied in order:
/// 1. 13 digits: EAN-13 check digit
/// 2. 8 digits: EAN-8 check digit
/// 3. 12 digits: UPC-A check digit
/// 4. 6 to 14 digits: accepted without a check digit (`FormatOnly`)
/// 5. anything else: rejected as `Format`
///
/// A 13-character string containing a non-digit is not "almost EAN-13"; it
/// falls through to rule 5 like any other malformed input.
pub fn validate(code: &str) -> ValidationOutcome {
    let verdict = match digits_of(code) {
        Some(digits) => match digits.len() {
            13 => check_digit_verdict(&digits, 1, 3, Verification::Ean13),
            8 => check_digit_verdict(&digits, 3, 1, Verification::Ean8),
            12 => check_digit_verdict(&digits, 3, 1, Verification::UpcA),
            len if (FALLBACK_MIN_LEN..=FALLBACK_MAX_LEN).contains(&len) => {
                Verdict::Accepted(Verification::FormatOnly)
            }
            _ => Verdict::Rejected(RejectReason::Format),
        },
        None => Verdict::Rejected(RejectReason::Format),
    };

    ValidationOutcome {
        value: code.to_string(),
        verdict,
    }
}

/// All-ASCII-digit parse; None if any character is not 0-9
fn digits_of(code: &str) -> Option<Vec<u32>> {
    code.chars().map(|c| c.to_digit(10)).collect()
}

fn check_digit_verdict(
    digits: &[u32],
    even_weight: u32,
    odd_weight: u32,
    grade: Verification,
) -> Verdict {
    if check_digit_matches(digits, even_weight, odd_weight) {
        Verdict::Accepted(grade)
    } else {
        Verdict::Rejected(RejectReason::Checksum)
    }
}

/// GTIN modulo-10 check: weighted payload sum, check digit is the amount
/// needed to reach the next multiple of ten
fn check_digit_matches(digits: &[u32], even_weight: u32, odd_weight: u32) -> bool {
    let (payload, check) = digits.split_at(digits.len() - 1);
    let sum: u32 = payload
        .iter()
        .enumerate()
        .map(|(i, d)| d * if i % 2 == 0 { even_weight } else { odd_weight })
        .sum();
    (10 - sum % 10) % 10 == check[0]
}
