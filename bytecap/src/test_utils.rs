//! Test utilities for worker-thread tests
//!
//! This module is only compiled in test builds and provides helpers
//! for waiting on background effects without arbitrary sleeps.

use std::fmt::Display;
use std::thread;
use std::time::{Duration, Instant};

/// Assert that a condition eventually holds within a timeout.
///
/// Retries `f` every `interval` until it returns `Ok` or `timeout` elapses,
/// then panics with the last error.
///
/// # Example
///
/// ```rust,ignore
/// assert_eventually(
///     "payload to be written",
///     Duration::from_secs(2),
///     Duration::from_millis(20),
///     || if path.exists() { Ok(()) } else { Err("missing") },
/// );
/// ```
pub fn assert_eventually<F, T, E>(desc: &str, timeout: Duration, interval: Duration, mut f: F) -> T
where
    F: FnMut() -> Result<T, E>,
    E: Display,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match f() {
            Ok(value) => return value,
            Err(e) => {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    panic!(
                        "Timeout waiting for {}\n\
                         Duration: {:?}\n\
                         Attempts: {}\n\
                         Last error: {}",
                        desc, elapsed, attempt, e
                    );
                }

                thread::sleep(interval);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_assert_eventually_succeeds_immediately() {
        let value = assert_eventually(
            "immediate success",
            Duration::from_secs(1),
            Duration::from_millis(10),
            || Ok::<_, &str>(42),
        );
        assert_eq!(value, 42);
    }

    #[test]
    fn test_assert_eventually_succeeds_after_retries() {
        let counter = Cell::new(0);
        let result = assert_eventually(
            "counter to reach 3",
            Duration::from_secs(2),
            Duration::from_millis(10),
            || {
                let val = counter.get();
                counter.set(val + 1);
                if val >= 2 {
                    Ok(val)
                } else {
                    Err(format!("counter only at {}", val))
                }
            },
        );
        assert!(result >= 2);
    }

    #[test]
    #[should_panic(expected = "Timeout waiting for never succeeds")]
    fn test_assert_eventually_times_out() {
        assert_eventually(
            "never succeeds",
            Duration::from_millis(100),
            Duration::from_millis(20),
            || Err::<(), _>("always fails"),
        );
    }
}
