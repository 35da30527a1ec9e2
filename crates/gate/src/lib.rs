//! USB power gate
//!
//! Drives a GPIO line that switches power to a USB device. Every
//! [`PowerGate::mark_used`] call powers the device and re-arms an inactivity
//! timer; a background thread cuts power once the timer runs out.
//!
//! # Example
//!
//! ```
//! use common::MonotonicClock;
//! use gate::{GateSettings, MemoryPin, PowerGate};
//!
//! let pin = MemoryPin::new();
//! let gate = PowerGate::start(pin.clone(), MonotonicClock::new(), GateSettings::default())?;
//!
//! gate.mark_used();
//! assert!(pin.is_high());
//!
//! gate.stop();
//! assert!(!pin.is_high());
//! # Ok::<(), gate::GateError>(())
//! ```

pub mod controller;
pub mod error;
pub mod pin;
pub mod test_utils;

pub use controller::{
    DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, GateHandle, GateSettings, GateState, PowerGate,
};
pub use error::GateError;
pub use pin::{Inverted, MemoryPin, PinLevel, SwitchPin, SysfsPin};

#[cfg(target_os = "linux")]
pub use pin::CdevPin;
