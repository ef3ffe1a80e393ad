//! Scan pipeline: validation, consensus, backends and session control

pub mod backend;
pub mod consensus;
pub mod frame;
pub mod manual;
pub mod session;
pub mod sim;
pub mod symbology;

pub use backend::{Cadence, Decoder, DecoderBackend, RawRead};
pub use consensus::{ConsensusWindow, PushOutcome};
pub use frame::{Frame, FrameFeed, FrameSource};
pub use manual::confirm_manual_entry;
pub use session::ScanSession;
pub use symbology::{validate, ValidationOutcome, Verdict};
