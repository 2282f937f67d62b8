//! Retry loop: run a closure until success or policy says stop.

use super::classify;
use super::error::FetchError;
use super::policy::{RetryDecision, RetryPolicy};

/// Runs a closure until it succeeds or the retry policy says to stop.
/// On retryable failure, calls `on_retry` with the error and the backoff,
/// sleeps for the backoff duration, then tries again.
pub fn run_with_retry<T, F, R>(policy: &RetryPolicy, mut f: F, mut on_retry: R) -> Result<T, FetchError>
where
    F: FnMut() -> Result<T, FetchError>,
    R: FnMut(&FetchError, u32, std::time::Duration),
{
    let mut attempt = 1u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        on_retry(&e, attempt, d);
                        std::thread::sleep(d);
                        attempt += 1;
                    }
                }
            }
        }
    }
}
