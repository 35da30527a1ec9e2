//! Systemd service integration
//!
//! Implements the few sd-notify messages the daemon sends. Every function is
//! a no-op when `NOTIFY_SOCKET` is not set.

use anyhow::{Context, Result};
use std::env;
use std::os::unix::net::UnixDatagram;
use tracing::debug;

fn notify(message: &str) -> Result<()> {
    let Ok(socket_path) = env::var("NOTIFY_SOCKET") else {
        debug!("NOTIFY_SOCKET not set, skipping systemd notification");
        return Ok(());
    };

    let socket = UnixDatagram::unbound().context("Failed to create Unix socket")?;
    socket
        .send_to(message.as_bytes(), &socket_path)
        .with_context(|| format!("Failed to send '{}' notification to systemd", message))?;
    debug!("Notified systemd: {}", message);
    Ok(())
}

/// Notify systemd that the gate is initialized (Type=notify units)
pub fn notify_ready() -> Result<()> {
    notify("READY=1")
}

/// Notify systemd that the shutdown sequence has begun
pub fn notify_stopping() -> Result<()> {
    notify("STOPPING=1")
}

/// Send a status line shown by `systemctl status`
pub fn notify_status(status: &str) -> Result<()> {
    notify(&format!("STATUS={}", status))
}

/// Check if running under systemd
pub fn is_systemd() -> bool {
    env::var("NOTIFY_SOCKET").is_ok()
}
