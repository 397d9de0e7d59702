#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing the packages in this workspace.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Budget for a test that only touches in-process synchronization primitives.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Miri executes thread synchronization far slower than native code.
const MIRI_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs a test on a separate thread and fails it if it does not finish within
/// [`DEFAULT_TIMEOUT`] (60 seconds under Miri).
///
/// Most tests in this workspace block on semaphores, queues or sockets. A bug in any of those
/// shows up as a deadlock, which without a watchdog would hang the test run instead of failing.
///
/// # Panics
///
/// Panics if the test exceeds the timeout. Panics from the test itself are resumed on the
/// calling thread.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let sum = with_watchdog(|| 2 + 2);
/// assert_eq!(sum, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let timeout = if cfg!(miri) {
        MIRI_TIMEOUT
    } else {
        DEFAULT_TIMEOUT
    };

    with_watchdog_timeout(timeout, test_fn)
}

/// Like [`with_watchdog()`] but with a caller-chosen budget, for tests that wait on real
/// sockets or other peers slower than an in-process handoff.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled and
/// the test runs directly on the calling thread, so that the mutation testing tool can detect
/// hanging mutants via its own timeout.
///
/// # Panics
///
/// Panics if the test exceeds `timeout`. Panics from the test itself are resumed on the
/// calling thread.
pub fn with_watchdog_timeout<F, R>(timeout: Duration, test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_thread = thread::spawn(move || {
        // Fails only if the watchdog already gave up on us.
        drop(tx.send(test_fn()));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_thread.join().expect("test thread already delivered its result");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test did not finish within {timeout:?}, probably deadlocked");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_thread.join() {
            Ok(()) => panic!("test thread exited without delivering a result"),
            Err(payload) => std::panic::resume_unwind(payload),
        },
    }
}
