//! In-process pin that records every write

use super::{PinLevel, SwitchPin};
use common::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MemoryPinState {
    configured: bool,
    initial: Option<PinLevel>,
    level: Option<PinLevel>,
    writes: Vec<PinLevel>,
    fail_writes: bool,
}

/// Pin without hardware behind it
///
/// Clones share state, so one copy can be handed to the gate while another
/// inspects what was written. Used by tests and by the daemon's dry-run
/// backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryPin {
    state: Arc<Mutex<MemoryPinState>>,
}

impl MemoryPin {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryPinState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current level, `None` before the line is configured
    pub fn level(&self) -> Option<PinLevel> {
        self.lock().level
    }

    pub fn is_high(&self) -> bool {
        self.level() == Some(PinLevel::High)
    }

    pub fn is_configured(&self) -> bool {
        self.lock().configured
    }

    /// Level the line was configured with
    pub fn initial_level(&self) -> Option<PinLevel> {
        self.lock().initial
    }

    /// Every level written after configuration, oldest first
    pub fn writes(&self) -> Vec<PinLevel> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    /// Make subsequent writes fail, simulating a detached line
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn write(&self, level: PinLevel) -> Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(Error::Gpio("simulated write failure".to_string()));
        }
        if !state.configured {
            return Err(Error::Gpio("pin not configured as output".to_string()));
        }
        state.level = Some(level);
        state.writes.push(level);
        Ok(())
    }
}

impl SwitchPin for MemoryPin {
    fn configure_output(&mut self, initial: PinLevel) -> Result<()> {
        let mut state = self.lock();
        state.configured = true;
        state.initial = Some(initial);
        state.level = Some(initial);
        Ok(())
    }

    fn set_high(&mut self) -> Result<()> {
        self.write(PinLevel::High)
    }

    fn set_low(&mut self) -> Result<()> {
        self.write(PinLevel::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_before_configure_fails() {
        let mut pin = MemoryPin::new();
        assert!(pin.set_high().is_err());
        assert_eq!(pin.level(), None);
    }

    #[test]
    fn test_records_writes() {
        let mut pin = MemoryPin::new();
        pin.configure_output(PinLevel::Low).unwrap();
        pin.set_low().unwrap();
        pin.set_high().unwrap();
        pin.set_high().unwrap();

        assert_eq!(
            pin.writes(),
            vec![PinLevel::Low, PinLevel::High, PinLevel::High]
        );
        assert!(pin.is_high());
    }

    #[test]
    fn test_simulated_failure_keeps_level() {
        let mut pin = MemoryPin::new();
        pin.configure_output(PinLevel::Low).unwrap();
        pin.set_low().unwrap();

        pin.set_fail_writes(true);
        assert!(pin.set_high().is_err());
        assert_eq!(pin.level(), Some(PinLevel::Low));
        assert_eq!(pin.write_count(), 1);
    }
}
