//! Switch pin backends
//!
//! The gate only needs three things from the hardware: configure the line as
//! an output, drive it high, drive it low. [`SwitchPin`] captures that, and
//! each backend maps it onto one GPIO interface.

#[cfg(target_os = "linux")]
mod cdev;
mod memory;
mod sysfs;

#[cfg(target_os = "linux")]
pub use cdev::CdevPin;
pub use memory::MemoryPin;
pub use sysfs::SysfsPin;

use common::Result;

/// Logic level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    High,
    Low,
}

impl PinLevel {
    pub fn inverted(self) -> Self {
        match self {
            PinLevel::High => PinLevel::Low,
            PinLevel::Low => PinLevel::High,
        }
    }
}

/// Digital output driving the USB power switch
pub trait SwitchPin: Send + 'static {
    /// Claim the line as an output driven at `initial` from the first instant.
    /// Called once before any write.
    fn configure_output(&mut self, initial: PinLevel) -> Result<()>;

    fn set_high(&mut self) -> Result<()>;

    fn set_low(&mut self) -> Result<()>;
}

impl SwitchPin for Box<dyn SwitchPin> {
    fn configure_output(&mut self, initial: PinLevel) -> Result<()> {
        (**self).configure_output(initial)
    }

    fn set_high(&mut self) -> Result<()> {
        (**self).set_high()
    }

    fn set_low(&mut self) -> Result<()> {
        (**self).set_low()
    }
}

/// Active-low adapter: "high" means the physical line is driven low
///
/// For switch ICs whose enable input is inverted.
#[derive(Debug, Clone)]
pub struct Inverted<P>(pub P);

impl<P: SwitchPin> SwitchPin for Inverted<P> {
    fn configure_output(&mut self, initial: PinLevel) -> Result<()> {
        self.0.configure_output(initial.inverted())
    }

    fn set_high(&mut self) -> Result<()> {
        self.0.set_low()
    }

    fn set_low(&mut self) -> Result<()> {
        self.0.set_high()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_swaps_levels() {
        let raw = MemoryPin::new();
        let mut pin = Inverted(raw.clone());
        pin.configure_output(PinLevel::Low).unwrap();

        pin.set_high().unwrap();
        assert_eq!(raw.level(), Some(PinLevel::Low));

        pin.set_low().unwrap();
        assert_eq!(raw.level(), Some(PinLevel::High));
    }

    #[test]
    fn test_inverted_configures_inverse_initial_level() {
        let raw = MemoryPin::new();
        let mut pin = Inverted(raw.clone());
        pin.configure_output(PinLevel::Low).unwrap();

        assert_eq!(raw.initial_level(), Some(PinLevel::High));
        assert_eq!(raw.level(), Some(PinLevel::High));
        assert!(raw.writes().is_empty());
    }

    #[test]
    fn test_boxed_pin_forwards() {
        let raw = MemoryPin::new();
        let mut pin: Box<dyn SwitchPin> = Box::new(raw.clone());
        pin.configure_output(PinLevel::Low).unwrap();
        pin.set_high().unwrap();

        assert!(raw.is_configured());
        assert!(raw.is_high());
    }
}
