//! Retry and backoff policy.
//!
//! Classifies failed fragment requests (timeouts, throttling, connection
//! failures, malformed responses) and makes bounded exponential backoff
//! decisions so a fetch worker never loops forever on a dead server.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
