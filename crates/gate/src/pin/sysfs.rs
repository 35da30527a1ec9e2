//! Legacy sysfs GPIO backend (`/sys/class/gpio`)
//!
//! Deprecated by the kernel in favour of the character device, but still the
//! only interface on some older Raspberry Pi images.

use super::{PinLevel, SwitchPin};
use common::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Default sysfs GPIO root
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// How long to wait for udev to create the line directory after export
const EXPORT_SETTLE_ATTEMPTS: u32 = 10;
const EXPORT_SETTLE_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct SysfsPin {
    root: PathBuf,
    line: u32,
}

impl SysfsPin {
    pub fn new(line: u32) -> Self {
        Self::with_root(SYSFS_GPIO_ROOT, line)
    }

    /// Use a different sysfs root, e.g. a scratch directory in tests
    pub fn with_root(root: impl AsRef<Path>, line: u32) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            line,
        }
    }

    fn line_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.line))
    }

    fn write_attr(&self, attr: &str, value: &str) -> Result<()> {
        let path = self.line_dir().join(attr);
        fs::write(&path, value)
            .map_err(|e| Error::Gpio(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn export(&self) -> Result<()> {
        let export = self.root.join("export");
        debug!("Exporting GPIO line {} via {}", self.line, export.display());
        fs::write(&export, self.line.to_string()).map_err(|e| {
            Error::Gpio(format!("Failed to export GPIO line {}: {}", self.line, e))
        })?;

        for _ in 0..EXPORT_SETTLE_ATTEMPTS {
            if self.line_dir().join("direction").exists() {
                return Ok(());
            }
            thread::sleep(EXPORT_SETTLE_DELAY);
        }

        Err(Error::Gpio(format!(
            "GPIO line {} did not appear at {} after export",
            self.line,
            self.line_dir().display()
        )))
    }
}

impl SwitchPin for SysfsPin {
    fn configure_output(&mut self, initial: PinLevel) -> Result<()> {
        if !self.line_dir().exists() {
            self.export()?;
        }
        // "low"/"high" set direction and level in one write, so the line never
        // passes through the other level
        let direction = match initial {
            PinLevel::Low => "low",
            PinLevel::High => "high",
        };
        self.write_attr("direction", direction)
    }

    fn set_high(&mut self) -> Result<()> {
        self.write_attr("value", "1")
    }

    fn set_low(&mut self) -> Result<()> {
        self.write_attr("value", "0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exported_root(line: u32) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(format!("gpio{}", line))).unwrap();
        dir
    }

    fn read_attr(root: &TempDir, line: u32, attr: &str) -> String {
        fs::read_to_string(root.path().join(format!("gpio{}", line)).join(attr)).unwrap()
    }

    #[test]
    fn test_configure_sets_direction_low() {
        let root = exported_root(17);
        let mut pin = SysfsPin::with_root(root.path(), 17);

        pin.configure_output(PinLevel::Low).unwrap();
        assert_eq!(read_attr(&root, 17, "direction"), "low");
        assert!(!root.path().join("export").exists());
    }

    #[test]
    fn test_configure_high_sets_direction_high() {
        let root = exported_root(6);
        let mut pin = SysfsPin::with_root(root.path(), 6);

        pin.configure_output(PinLevel::High).unwrap();
        assert_eq!(read_attr(&root, 6, "direction"), "high");
        assert!(!root.path().join("gpio6").join("value").exists());
    }

    #[test]
    fn test_value_writes() {
        let root = exported_root(4);
        let mut pin = SysfsPin::with_root(root.path(), 4);
        pin.configure_output(PinLevel::Low).unwrap();

        pin.set_high().unwrap();
        assert_eq!(read_attr(&root, 4, "value"), "1");

        pin.set_low().unwrap();
        assert_eq!(read_attr(&root, 4, "value"), "0");
    }

    #[test]
    fn test_export_when_line_missing() {
        let root = TempDir::new().unwrap();
        let mut pin = SysfsPin::with_root(root.path(), 22);

        // Nothing creates gpio22 in a scratch dir, so export times out
        let err = pin.configure_output(PinLevel::Low).unwrap_err();
        assert!(err.to_string().contains("did not appear"));
        assert_eq!(
            fs::read_to_string(root.path().join("export")).unwrap(),
            "22"
        );
    }

    #[test]
    fn test_missing_root_is_error() {
        let mut pin = SysfsPin::with_root("/nonexistent/gpio/root", 5);
        assert!(pin.configure_output(PinLevel::Low).is_err());
    }
}
