//! usb-power-gate daemon
//!
//! Keeps a USB device powered through a GPIO-controlled switch while it is in
//! use and cuts power after a period of inactivity. Consumers mark the device
//! as used by sending `SIGUSR1` (or running `usb-power-gate touch`).

mod backend;
mod config;
mod pidfile;
mod service;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use common::{MonotonicClock, format_duration, parse_duration, setup_logging};
use config::GateConfig;
use gate::PowerGate;
use pidfile::PidFile;
use std::path::{Path, PathBuf};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "usb-power-gate")]
#[command(
    author,
    version,
    about = "USB power gate - power a USB device on demand, cut it when idle"
)]
#[command(long_about = "
Drives a GPIO line that switches power to a USB device. Each time the device
is used the line goes high and an inactivity timer restarts; once the timer
runs out the line goes low again.

EXAMPLES:
    # Run with default config
    usb-power-gate

    # Run with a custom config and a 30 second timeout
    usb-power-gate --config /path/to/gate.toml --timeout 30s

    # Mark the device as used from a script or another program
    usb-power-gate touch

    # Run with debug logging
    usb-power-gate --log-level debug

SIGNALS:
    SIGUSR1          mark the device as used
    SIGINT, SIGTERM  cut power and exit

CONFIGURATION:
    The daemon looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usb-power-gate/gate.toml
    3. /etc/usb-power-gate/gate.toml
    4. Built-in defaults
")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Inactivity timeout, overrides the config (e.g. "30s", "2m")
    #[arg(short, long, value_name = "DURATION", value_parser = parse_duration)]
    timeout: Option<std::time::Duration>,

    /// Pid file, overrides the config
    #[arg(long, value_name = "PATH", global = true)]
    pid_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the gate (default)
    Run,
    /// Mark the device of a running daemon as used
    Touch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = GateConfig::default();
        let path = GateConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    // Load configuration first (to get log level from config if not specified)
    let mut config = if let Some(ref path) = args.config {
        GateConfig::load(Some(config::expand_path(path))).context("Failed to load configuration")?
    } else {
        GateConfig::load_or_default()
    };

    if let Some(timeout) = args.timeout {
        config.gate.timeout = timeout;
        config.validate().context("Invalid --timeout")?;
    }
    if let Some(ref pid_file) = args.pid_file {
        config.daemon.pid_file = Some(pid_file.clone());
    }

    // Use CLI log level if specified, otherwise use config value
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);

    setup_logging(log_level).context("Failed to setup logging")?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Touch => touch(&config),
    }
}

/// Send SIGUSR1 to the daemon recorded in the pid file
fn touch(config: &GateConfig) -> Result<()> {
    let path = config
        .daemon
        .pid_file
        .as_deref()
        .ok_or_else(|| anyhow!("No pid file configured; set daemon.pid_file or --pid-file"))?;
    let pid = pidfile::send_mark_used(path)?;
    debug!("Marked device as used (pid {})", pid);
    Ok(())
}

/// Signal streams the daemon reacts to
struct Signals {
    mark_used: Signal,
    terminate: Signal,
    interrupt: Signal,
}

impl Signals {
    /// Must run before the pid is published: the default SIGUSR1 action
    /// terminates the process
    fn install() -> Result<Self> {
        Ok(Self {
            mark_used: signal(SignalKind::user_defined1())
                .context("Failed to install SIGUSR1 handler")?,
            terminate: signal(SignalKind::terminate())
                .context("Failed to install SIGTERM handler")?,
            interrupt: signal(SignalKind::interrupt())
                .context("Failed to install SIGINT handler")?,
        })
    }
}

/// Write the pid file for `touch`. Requires installed handlers.
fn publish_pid(_signals: &Signals, path: Option<&Path>) -> Result<Option<PidFile>> {
    path.map(PidFile::create).transpose()
}

/// Run the gate until SIGINT or SIGTERM
async fn run(config: GateConfig) -> Result<()> {
    info!("usb-power-gate v{}", env!("CARGO_PKG_VERSION"));

    let mut signals = Signals::install()?;

    let settings = config.gate.gate_settings();
    let pin = backend::build_pin(&config.gpio).context("Failed to set up GPIO backend")?;

    // Without the auto-disable thread power could never be cut again
    let gate = PowerGate::start_or_exit(pin, MonotonicClock::new(), settings)
        .with_context(|| format!("Failed to start power gate on GPIO line {}", config.gpio.line))?;

    let _pid_file = publish_pid(&signals, config.daemon.pid_file.as_deref())?;

    if service::is_systemd() {
        info!("Running under systemd");
    }
    service::notify_ready().context("Failed to notify systemd ready")?;
    service::notify_status(&format!(
        "Gating GPIO line {} (timeout {})",
        config.gpio.line,
        format_duration(settings.timeout)
    ))
    .context("Failed to send status to systemd")?;

    info!("Waiting for SIGUSR1; SIGINT/SIGTERM to exit");

    loop {
        tokio::select! {
            Some(()) = signals.mark_used.recv() => {
                debug!("SIGUSR1 received");
                gate.mark_used();
            }
            _ = signals.terminate.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }
            _ = signals.interrupt.recv() => {
                info!("Received SIGINT, shutting down...");
                break;
            }
        }
    }

    if let Err(e) = service::notify_stopping() {
        error!("Failed to notify systemd stopping: {:#}", e);
    }

    gate.stop();
    info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_touch_after_pid_published_is_delivered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gate.pid");

        let mut signals = Signals::install().unwrap();
        let pid_file = publish_pid(&signals, Some(&path)).unwrap();
        assert!(pid_file.is_some());

        // Reaching the assertion at all means SIGUSR1 did not terminate us
        pidfile::send_mark_used(&path).unwrap();
        let received = tokio::time::timeout(Duration::from_secs(5), signals.mark_used.recv())
            .await
            .unwrap();
        assert_eq!(received, Some(()));
    }

    #[tokio::test]
    async fn test_publish_pid_without_path() {
        let signals = Signals::install().unwrap();
        assert!(publish_pid(&signals, None).unwrap().is_none());
    }

    #[test]
    fn test_default_command_is_run() {
        let args = Args::parse_from(["usb-power-gate"]);
        assert_eq!(args.command, None);
        assert!(!args.save_config);
    }

    #[test]
    fn test_touch_with_global_flags() {
        let args = Args::parse_from(["usb-power-gate", "touch", "--pid-file", "/tmp/gate.pid"]);
        assert_eq!(args.command, Some(Command::Touch));
        assert_eq!(args.pid_file, Some(PathBuf::from("/tmp/gate.pid")));
    }

    #[test]
    fn test_timeout_flag_parsed() {
        let args = Args::parse_from(["usb-power-gate", "--timeout", "1m30s"]);
        assert_eq!(args.timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        assert!(Args::try_parse_from(["usb-power-gate", "--timeout", "later"]).is_err());
    }

    #[test]
    fn test_touch_requires_pid_file() {
        let config = GateConfig::default();
        assert!(touch(&config).is_err());
    }
}
