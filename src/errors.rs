// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner

use crate::backends::camera::types::BackendError;
use std::fmt;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors surfaced by a scanning session
#[derive(Debug, Clone)]
pub enum ScanError {
    /// The selector was called with an empty candidate list
    NoCandidates,
    /// Every candidate failed to activate or probe
    NoUsableCamera,
    /// Camera access failed (permission denied, device busy, ...)
    Camera(BackendError),
    /// Configuration errors
    Config(String),
}

/// Errors returned by a barcode decoder
///
/// These are always treated as transient by the decode loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Pixel buffer does not match the given dimensions
    InvalidBuffer { expected: usize, actual: usize },
    /// Decoder failed on this input
    Failed(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::NoCandidates => write!(f, "No candidate cameras supplied"),
            ScanError::NoUsableCamera => write!(f, "No usable camera: every probe failed"),
            ScanError::Camera(e) => write!(f, "Camera error: {}", e),
            ScanError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidBuffer { expected, actual } => write!(
                f,
                "Invalid pixel buffer: expected {} bytes, got {}",
                expected, actual
            ),
            DecodeError::Failed(msg) => write!(f, "Decode failed: {}", msg),
        }
    }
}

impl std::error::Error for ScanError {}
impl std::error::Error for DecodeError {}

impl From<BackendError> for ScanError {
    fn from(err: BackendError) -> Self {
        ScanError::Camera(err)
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}
