//! # Scanfirm Scan Engine Library (scanfirm-engine)
//!
//! Barcode confirmation core: checksum verification, multi-frame
//! consensus voting, dual decoding backends and camera lifecycle control.
//!
//! **Purpose:** Turn a noisy per-frame stream of decoded barcode
//! candidates into a single verified product code, released cleanly no
//! matter how the scan ends.
//!
//! **Architecture:** One `ScanSession` per scan, owning its frame feed,
//! backend and consensus window inside a tokio worker task.

pub mod config;
pub mod error;
pub mod scan;

pub use error::{Error, Result};
pub use scan::ScanSession;
