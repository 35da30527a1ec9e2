//! Common utilities for usb-power-gate
//!
//! This crate provides functionality shared between the gate library and the
//! daemon: error handling, logging setup, the monotonic clock abstraction and
//! human-readable duration parsing for configuration files.

pub mod clock;
pub mod duration;
pub mod error;
pub mod logging;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use duration::{format_duration, parse_duration};
pub use error::{Error, Result};
pub use logging::setup_logging;
