//! Unified error type for the canlight-lib crate.
//!
//! [`CanLightError`] covers local validation failures (identifiers, register
//! indices, durations, blink seconds), handle lifecycle misuse, and wraps
//! [`TransportError`] so link failures reach the caller unchanged.
//! `From` impls allow `?` to propagate across module boundaries seamlessly.

use std::fmt;

use crate::transport::TransportError;

/// Unified error type for canlight-lib operations.
#[derive(Debug)]
pub enum CanLightError {
    /// Device identifier outside 1–60 at acquire time.
    InvalidIdentifier(i32),
    /// Identifier is currently held by a live device handle.
    AlreadyBound(u8),
    /// Operation attempted on a handle after it was released.
    HandleReleased(u8),
    /// Register, cycle or fade index outside 0–7.
    IndexOutOfRange(i32),
    /// Negative (or NaN) register duration in seconds.
    InvalidDuration(f64),
    /// Structurally invalid argument, e.g. non-positive blink seconds.
    InvalidArgument(String),
    /// Transport-level failure (link error or timeout), surfaced as-is.
    Transport(TransportError),
    /// A getter response that could not be decoded.
    MalformedResponse(String),
    /// One-time driver bootstrap failed; no session can be opened.
    DriverUnavailable(String),
    /// Standard I/O error (config read/write).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
    /// Color parsing error.
    Color(String),
}

impl CanLightError {
    /// True for transport link failures (bus down, interface gone, open failed).
    pub fn is_link_error(&self) -> bool {
        matches!(
            self,
            CanLightError::Transport(TransportError::Link(_) | TransportError::OpenFailed(_))
        )
    }

    /// True when the device did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CanLightError::Transport(TransportError::Timeout(_)))
    }
}

impl fmt::Display for CanLightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanLightError::InvalidIdentifier(id) => {
                write!(f, "Invalid device identifier {id} (must be between 1 and 60)")
            }
            CanLightError::AlreadyBound(id) => {
                write!(f, "Device {id} is already bound; release it first")
            }
            CanLightError::HandleReleased(id) => {
                write!(f, "Device {id} handle has been released")
            }
            CanLightError::IndexOutOfRange(idx) => {
                write!(f, "Register index {idx} out of range (must be between 0 and 7)")
            }
            CanLightError::InvalidDuration(secs) => {
                write!(f, "Invalid duration {secs}s (must be zero or positive)")
            }
            CanLightError::InvalidArgument(e) => write!(f, "Invalid argument: {e}"),
            CanLightError::Transport(e) => write!(f, "{e}"),
            CanLightError::MalformedResponse(e) => write!(f, "Malformed response: {e}"),
            CanLightError::DriverUnavailable(e) => write!(f, "Driver unavailable: {e}"),
            CanLightError::Io(e) => write!(f, "I/O error: {e}"),
            CanLightError::Config(e) => write!(f, "Config error: {e}"),
            CanLightError::Color(e) => write!(f, "Color error: {e}"),
        }
    }
}

impl std::error::Error for CanLightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CanLightError::Transport(e) => Some(e),
            CanLightError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for CanLightError {
    fn from(e: TransportError) -> Self {
        CanLightError::Transport(e)
    }
}

impl From<std::io::Error> for CanLightError {
    fn from(e: std::io::Error) -> Self {
        CanLightError::Io(e)
    }
}

/// Crate-level Result alias using [`CanLightError`].
pub type Result<T> = std::result::Result<T, CanLightError>;
