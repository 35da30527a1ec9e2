//! Switch pin construction from configuration

use crate::config::{GpioBackend, GpioSettings};
use anyhow::Result;
use gate::{Inverted, MemoryPin, SwitchPin, SysfsPin};
use tracing::info;

/// Build the pin backend selected in `[gpio]`
pub fn build_pin(gpio: &GpioSettings) -> Result<Box<dyn SwitchPin>> {
    let pin: Box<dyn SwitchPin> = match gpio.backend {
        GpioBackend::Cdev => cdev_pin(gpio)?,
        GpioBackend::Sysfs => {
            info!("Using sysfs GPIO line {}", gpio.line);
            Box::new(SysfsPin::new(gpio.line))
        }
        GpioBackend::DryRun => {
            info!("Dry run: GPIO line {} is simulated", gpio.line);
            Box::new(MemoryPin::new())
        }
    };

    if gpio.active_low {
        info!("Switch is active low");
        Ok(Box::new(Inverted(pin)))
    } else {
        Ok(pin)
    }
}

#[cfg(target_os = "linux")]
fn cdev_pin(gpio: &GpioSettings) -> Result<Box<dyn SwitchPin>> {
    info!(
        "Using GPIO line {} on {}",
        gpio.line,
        gpio.chip.display()
    );
    Ok(Box::new(gate::CdevPin::new(&gpio.chip, gpio.line)))
}

#[cfg(not(target_os = "linux"))]
fn cdev_pin(_gpio: &GpioSettings) -> Result<Box<dyn SwitchPin>> {
    Err(anyhow::anyhow!(
        "The cdev GPIO backend is only available on Linux; use backend = \"sysfs\" or \"dry-run\""
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate::PinLevel;
    use std::path::PathBuf;

    fn dry_run(active_low: bool) -> GpioSettings {
        GpioSettings {
            backend: GpioBackend::DryRun,
            chip: PathBuf::from("/dev/gpiochip0"),
            line: 17,
            active_low,
        }
    }

    #[test]
    fn test_dry_run_pin_accepts_writes() {
        let mut pin = build_pin(&dry_run(false)).unwrap();
        pin.configure_output(PinLevel::Low).unwrap();
        pin.set_high().unwrap();
        pin.set_low().unwrap();
    }

    #[test]
    fn test_active_low_wraps_pin() {
        let mut pin = build_pin(&dry_run(true)).unwrap();
        pin.configure_output(PinLevel::Low).unwrap();
        pin.set_high().unwrap();
    }
}
