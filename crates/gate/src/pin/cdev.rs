//! GPIO character device backend (`/dev/gpiochipN`)

use super::{PinLevel, SwitchPin};
use common::{Error, Result};
use embedded_hal::digital::{OutputPin as _, PinState};
use gpiocdev_embedded_hal::OutputPin;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A single line on a GPIO chip, requested as an output
///
/// The line is not requested until [`SwitchPin::configure_output`], and is
/// released when the pin is dropped.
pub struct CdevPin {
    chip: PathBuf,
    line: u32,
    output: Option<OutputPin>,
}

impl CdevPin {
    pub fn new(chip: impl AsRef<Path>, line: u32) -> Self {
        Self {
            chip: chip.as_ref().to_path_buf(),
            line,
            output: None,
        }
    }

    fn output(&mut self) -> Result<&mut OutputPin> {
        let line = self.line;
        self.output
            .as_mut()
            .ok_or_else(|| Error::Gpio(format!("GPIO line {} not configured as output", line)))
    }
}

impl std::fmt::Debug for CdevPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdevPin")
            .field("chip", &self.chip)
            .field("line", &self.line)
            .field("requested", &self.output.is_some())
            .finish()
    }
}

impl SwitchPin for CdevPin {
    fn configure_output(&mut self, initial: PinLevel) -> Result<()> {
        if self.output.is_some() {
            return Ok(());
        }
        debug!(
            "Requesting GPIO line {} on {} as output",
            self.line,
            self.chip.display()
        );
        let state = match initial {
            PinLevel::Low => PinState::Low,
            PinLevel::High => PinState::High,
        };
        let output = OutputPin::new(&self.chip, self.line, state).map_err(|e| {
            Error::Gpio(format!(
                "Failed to request line {} on {}: {}",
                self.line,
                self.chip.display(),
                e
            ))
        })?;
        self.output = Some(output);
        Ok(())
    }

    fn set_high(&mut self) -> Result<()> {
        let line = self.line;
        self.output()?
            .set_high()
            .map_err(|e| Error::Gpio(format!("Failed to drive line {} high: {}", line, e)))
    }

    fn set_low(&mut self) -> Result<()> {
        let line = self.line;
        self.output()?
            .set_low()
            .map_err(|e| Error::Gpio(format!("Failed to drive line {} low: {}", line, e)))
    }
}
