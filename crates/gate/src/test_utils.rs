//! Test utilities for usb-power-gate
//!
//! Helpers for tests that observe the auto-disable thread from outside.
//!
//! # Example
//!
//! ```
//! use gate::test_utils::{wait_until, DEFAULT_TEST_TIMEOUT};
//!
//! assert!(wait_until(DEFAULT_TEST_TIMEOUT, || true));
//! ```

use std::thread;
use std::time::{Duration, Instant};

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between condition checks in [`wait_until`]
const WAIT_STEP: Duration = Duration::from_millis(5);

/// Poll `condition` until it holds or `timeout` passes
///
/// Returns whether the condition was met.
pub fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(WAIT_STEP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_wait_until_success() {
        let calls = Cell::new(0);
        let met = wait_until(DEFAULT_TEST_TIMEOUT, || {
            calls.set(calls.get() + 1);
            calls.get() >= 3
        });
        assert!(met);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_wait_until_timeout() {
        let start = Instant::now();
        assert!(!wait_until(Duration::from_millis(30), || false));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
