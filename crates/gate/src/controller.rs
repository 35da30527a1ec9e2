//! Power gate controller
//!
//! Owns the switch pin, the inactivity timestamp and the auto-disable thread.
//!
//! The pin and the [`GateState`] live under one mutex, so an enable from a
//! caller and a disable from the background thread can never interleave. The
//! background thread waits on a condvar between checks, which releases the
//! lock while it sleeps and lets [`PowerGate::stop`] wake it immediately.

use crate::error::GateError;
use crate::pin::{PinLevel, SwitchPin};
use common::Clock;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Inactivity period after which power is cut
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the background thread checks for expiry
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

const THREAD_NAME: &str = "gate-auto-disable";

/// Timing parameters, fixed for the lifetime of a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl GateSettings {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GateError> {
        // Expiry is tracked in whole milliseconds
        if self.timeout.as_millis() == 0 {
            return Err(GateError::InvalidSettings(
                "timeout must be at least 1 ms".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(GateError::InvalidSettings(
                "poll interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn timeout_millis(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Snapshot of the shared gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateState {
    /// Clock reading at the most recent enable
    pub last_enabled_ms: u64,
    pub shutting_down: bool,
    /// Level last written to the pin
    pub enabled: bool,
}

struct Inner {
    state: GateState,
    pin: Box<dyn SwitchPin>,
}

impl Inner {
    fn enable(&mut self, now_ms: u64) {
        self.state.last_enabled_ms = now_ms;
        match self.pin.set_high() {
            Ok(()) => {
                if !self.state.enabled {
                    debug!("USB power enabled");
                }
                self.state.enabled = true;
            }
            Err(e) => warn!("Failed to enable USB power: {}", e),
        }
    }

    fn disable(&mut self) {
        match self.pin.set_low() {
            Ok(()) => self.state.enabled = false,
            Err(e) => warn!("Failed to disable USB power: {}", e),
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    wake: Condvar,
    clock: Box<dyn Clock>,
    settings: GateSettings,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_used(&self) {
        let mut inner = self.lock();
        if inner.state.shutting_down {
            debug!("Ignoring mark_used during shutdown");
            return;
        }
        let now = self.clock.now_millis();
        inner.enable(now);
    }

    fn state(&self) -> GateState {
        self.lock().state
    }
}

/// Background loop: wait one poll interval, cut power once the timeout is reached
fn run_auto_disable(shared: Arc<Shared>) {
    let timeout_ms = shared.settings.timeout_millis();
    debug!(
        "Auto-disable thread started (timeout {:?}, poll {:?})",
        shared.settings.timeout, shared.settings.poll_interval
    );

    let mut inner = shared.lock();
    while !inner.state.shutting_down {
        let (guard, _) = shared
            .wake
            .wait_timeout(inner, shared.settings.poll_interval)
            .unwrap_or_else(PoisonError::into_inner);
        inner = guard;

        if inner.state.shutting_down {
            break;
        }

        let elapsed = shared
            .clock
            .now_millis()
            .saturating_sub(inner.state.last_enabled_ms);
        if inner.state.enabled && elapsed >= timeout_ms {
            info!("USB power disabled after {} ms of inactivity", elapsed);
            inner.disable();
        }
    }

    debug!("Auto-disable thread stopped");
}

/// Cloneable handle for marking the device as used from other threads
///
/// Handles outlive the gate safely: once [`PowerGate::stop`] has begun,
/// [`GateHandle::mark_used`] is ignored and the pin stays low.
#[derive(Clone)]
pub struct GateHandle {
    shared: Arc<Shared>,
}

impl GateHandle {
    /// Power the device and restart the inactivity window
    pub fn mark_used(&self) {
        self.shared.mark_used();
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.state().enabled
    }

    pub fn state(&self) -> GateState {
        self.shared.state()
    }
}

impl std::fmt::Debug for GateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateHandle")
            .field("state", &self.shared.state())
            .finish()
    }
}

/// USB power gate with automatic inactivity shutoff
///
/// Dropping a running gate has the same effect as [`PowerGate::stop`].
pub struct PowerGate {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl PowerGate {
    /// Configure the pin, drive it low and start the auto-disable thread
    ///
    /// Fails with [`GateError::Pin`] when the pin cannot be configured, and
    /// with [`GateError::Spawn`] when the thread cannot be created. The latter
    /// leaves the process without a way to ever cut power; see
    /// [`PowerGate::start_or_exit`].
    pub fn start<P, C>(pin: P, clock: C, settings: GateSettings) -> Result<Self, GateError>
    where
        P: SwitchPin,
        C: Clock,
    {
        settings.validate()?;

        let mut pin: Box<dyn SwitchPin> = Box::new(pin);
        pin.configure_output(PinLevel::Low).map_err(GateError::Pin)?;
        pin.set_low().map_err(GateError::Pin)?;

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: GateState::default(),
                pin,
            }),
            wake: Condvar::new(),
            clock: Box::new(clock),
            settings,
        });

        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run_auto_disable(worker))
            .map_err(GateError::Spawn)?;

        info!(
            "Power gate started (timeout {:?}, poll interval {:?})",
            settings.timeout, settings.poll_interval
        );

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Like [`PowerGate::start`], but terminates the process when the
    /// auto-disable thread cannot be created
    ///
    /// Prints a diagnostic and exits with status 1. There is no retry and no
    /// degraded mode. Settings and pin errors are returned to the caller.
    pub fn start_or_exit<P, C>(pin: P, clock: C, settings: GateSettings) -> Result<Self, GateError>
    where
        P: SwitchPin,
        C: Clock,
    {
        match Self::start(pin, clock, settings) {
            Err(e @ GateError::Spawn(_)) => {
                error!("FATAL: {}", e);
                eprintln!("FATAL: {}", e);
                std::process::exit(1);
            }
            result => result,
        }
    }

    /// Power the device and restart the inactivity window
    pub fn mark_used(&self) {
        self.shared.mark_used();
    }

    pub fn handle(&self) -> GateHandle {
        GateHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.state().enabled
    }

    pub fn state(&self) -> GateState {
        self.shared.state()
    }

    pub fn settings(&self) -> GateSettings {
        self.shared.settings
    }

    /// Stop the auto-disable thread and cut power
    ///
    /// Blocks until the thread has exited. The pin is low when this returns.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.shared.lock().state.shutting_down = true;
        self.shared.wake.notify_all();

        if thread.join().is_err() {
            error!("Auto-disable thread panicked");
        }

        self.shared.lock().disable();
        info!("Power gate stopped");
    }
}

impl Drop for PowerGate {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PowerGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerGate")
            .field("settings", &self.shared.settings)
            .field("state", &self.shared.state())
            .field("running", &self.thread.is_some())
            .finish()
    }
}
