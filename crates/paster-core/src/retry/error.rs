//! Per-request fetch error type for retry classification.

use std::fmt;

use crate::band::BandError;

/// Error returned by a single fragment request.
/// Used so we can classify and decide retries before converting to anyhow.
#[derive(Debug)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// The sequence header was absent, negative or not a number.
    MissingSequence,
    /// The body is not an acceptable fragment (bad container, CRC mismatch, bad data stream).
    Malformed { index: u32, source: BandError },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Curl(e) => write!(f, "{}", e),
            FetchError::Http(code) => write!(f, "HTTP {}", code),
            FetchError::MissingSequence => write!(f, "response carried no valid sequence index"),
            FetchError::Malformed { index, source } => {
                write!(f, "fragment {} malformed: {}", index, source)
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Curl(e) => Some(e),
            FetchError::Malformed { source, .. } => Some(source),
            FetchError::Http(_) | FetchError::MissingSequence => None,
        }
    }
}
