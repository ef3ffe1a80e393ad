//! # Scanfirm Common Library
//!
//! Shared code for the scanfirm engine and its consumers including:
//! - Event types (ScanEvent enum) and the broadcast EventBus
//! - Scan vocabulary (states, backends, verification grades)
//! - Tunable scan parameters with built-in defaults

pub mod error;
pub mod events;
pub mod params;

pub use error::{Error, Result};
pub use events::{EventBus, ScanEvent};
pub use params::ScanParams;
