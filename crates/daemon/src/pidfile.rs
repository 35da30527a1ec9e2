//! Pid file used by `usb-power-gate touch` to find the running daemon

use anyhow::{Context, Result, anyhow};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Signal the daemon maps onto `mark_used`
pub const MARK_USED_SIGNAL: Signal = Signal::SIGUSR1;

/// Pid file owned by the running daemon, removed on drop
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create pid file directory: {}", parent.display())
            })?;
        }
        fs::write(path, format!("{}\n", std::process::id()))
            .with_context(|| format!("Failed to write pid file: {}", path.display()))?;
        debug!("Wrote pid file {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove pid file {}: {}", self.path.display(), e);
        }
    }
}

/// Read the daemon pid from `path`
pub fn read_pid(path: &Path) -> Result<Pid> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pid file: {}", path.display()))?;
    let raw: i32 = content
        .trim()
        .parse()
        .with_context(|| format!("Invalid pid in {}: '{}'", path.display(), content.trim()))?;
    if raw <= 0 {
        return Err(anyhow!("Invalid pid in {}: {}", path.display(), raw));
    }
    Ok(Pid::from_raw(raw))
}

/// Tell the daemon whose pid is recorded in `path` that the device was used
pub fn send_mark_used(path: &Path) -> Result<Pid> {
    let pid = read_pid(path)?;
    kill(pid, MARK_USED_SIGNAL)
        .with_context(|| format!("Failed to signal usb-power-gate (pid {})", pid))?;
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_writes_own_pid_and_removes_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run").join("gate.pid");

        let pid_file = PidFile::create(&path).unwrap();
        let pid = read_pid(&path).unwrap();
        assert_eq!(pid.as_raw() as u32, std::process::id());

        drop(pid_file);
        assert!(!path.exists());
    }

    #[test]
    fn test_read_pid_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gate.pid");

        fs::write(&path, "not-a-pid").unwrap();
        assert!(read_pid(&path).is_err());

        fs::write(&path, "0\n").unwrap();
        assert!(read_pid(&path).is_err());

        fs::write(&path, " 4242 \n").unwrap();
        assert_eq!(read_pid(&path).unwrap(), Pid::from_raw(4242));
    }

    #[test]
    fn test_send_without_pid_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(send_mark_used(&dir.path().join("missing.pid")).is_err());
    }
}
