//! Probe error types.

use thiserror::Error;

/// Why a reachability probe did not succeed.
///
/// Probe failures are routine; the monitor records them as "offline" and
/// never surfaces them to callers.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Transport-level failure (DNS, connect, TLS, reset)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The target answered with a non-2xx status
    #[error("Probe target returned HTTP {0}")]
    Status(u16),

    /// No answer within the probe timeout
    #[error("Probe timed out")]
    Timeout,
}

/// Result type alias using ProbeError.
pub type ProbeResult<T> = Result<T, ProbeError>;
