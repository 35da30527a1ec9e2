//! Daemon configuration management

use anyhow::{Context, Result, anyhow};
use common::duration::serde_str;
use gate::GateSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    pub daemon: DaemonSettings,
    pub gpio: GpioSettings,
    /// Inactivity timing
    #[serde(default)]
    pub gate: TimingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    pub log_level: String,
    /// Where the running daemon records its pid, used by `usb-power-gate touch`
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
}

/// How the switch line is accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GpioBackend {
    /// GPIO character device (`/dev/gpiochipN`)
    #[default]
    Cdev,
    /// Legacy `/sys/class/gpio`
    Sysfs,
    /// No hardware; the line is simulated in memory
    DryRun,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpioSettings {
    #[serde(default)]
    pub backend: GpioBackend,
    /// GPIO chip device, only used by the cdev backend
    #[serde(default = "GpioSettings::default_chip")]
    pub chip: PathBuf,
    /// Line offset on the chip (BCM numbering on a Raspberry Pi)
    pub line: u32,
    /// Set when the switch enables power on a low level
    #[serde(default)]
    pub active_low: bool,
}

impl GpioSettings {
    fn default_chip() -> PathBuf {
        PathBuf::from("/dev/gpiochip0")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Inactivity period before power is cut (e.g. "10s", "1m30s")
    #[serde(default = "TimingSettings::default_timeout", with = "serde_str")]
    pub timeout: Duration,
    /// Expiry check interval (e.g. "100ms")
    #[serde(default = "TimingSettings::default_poll_interval", with = "serde_str")]
    pub poll_interval: Duration,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            timeout: Self::default_timeout(),
            poll_interval: Self::default_poll_interval(),
        }
    }
}

impl TimingSettings {
    fn default_timeout() -> Duration {
        gate::DEFAULT_TIMEOUT
    }

    fn default_poll_interval() -> Duration {
        gate::DEFAULT_POLL_INTERVAL
    }

    pub fn gate_settings(&self) -> GateSettings {
        GateSettings {
            timeout: self.timeout,
            poll_interval: self.poll_interval,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            daemon: DaemonSettings {
                log_level: "info".to_string(),
                pid_file: None,
            },
            gpio: GpioSettings {
                backend: GpioBackend::Cdev,
                chip: GpioSettings::default_chip(),
                line: 17,
                active_low: false,
            },
            gate: TimingSettings::default(),
        }
    }
}

impl GateConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/usb-power-gate/gate.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: GateConfig = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {:#}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usb-power-gate").join("gate.toml")
        } else {
            PathBuf::from(".config/usb-power-gate/gate.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.daemon.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.daemon.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.gate.timeout.as_millis() == 0 {
            return Err(anyhow!("Gate timeout must be at least 1ms"));
        }
        if self.gate.poll_interval.is_zero() {
            return Err(anyhow!("Poll interval must be greater than 0"));
        }
        if self.gate.poll_interval > self.gate.timeout {
            return Err(anyhow!(
                "Poll interval ({}) must not exceed the timeout ({})",
                common::format_duration(self.gate.poll_interval),
                common::format_duration(self.gate.timeout)
            ));
        }

        if self.gpio.backend == GpioBackend::Cdev && self.gpio.chip.as_os_str().is_empty() {
            return Err(anyhow!("GPIO chip path is required for the cdev backend"));
        }

        Ok(())
    }
}

/// Expand `~` in a user-supplied config path
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}
