//! Test assertion helpers.
//!
//! Provides polling-based assertions for scenarios where completion happens on
//! another thread.

use std::{thread, time::Duration};

use tokio::time::{Instant, sleep};

/// Default polling interval for [`assert_eventually`] and [`wait_until`].
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls a condition until it returns true or the timeout expires.
///
/// Avoids flaky tests that use fixed sleeps.
///
/// # Returns
///
/// `true` if the condition became true before timeout, `false` otherwise.
///
/// # Example
///
/// ```no_run
/// use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
/// use std::time::Duration;
/// use tally_test_utils::assert_eventually;
///
/// # async fn example() {
/// let done = Arc::new(AtomicBool::new(false));
/// let setter = Arc::clone(&done);
/// std::thread::spawn(move || setter.store(true, Ordering::SeqCst));
///
/// let result = assert_eventually(Duration::from_secs(1), || done.load(Ordering::SeqCst)).await;
/// assert!(result, "flag should be set");
/// # }
/// ```
pub async fn assert_eventually<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(DEFAULT_POLL_INTERVAL).await;
    }

    // Final check after timeout
    condition()
}

/// Blocking form of [`assert_eventually`] for plain threads.
///
/// Must not be called from inside an async runtime.
pub fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(DEFAULT_POLL_INTERVAL);
    }

    condition()
}
