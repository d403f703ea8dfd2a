// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera platform abstraction

//! Shared types for camera platforms

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

/// Kind of media device reported by enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaDeviceKind {
    VideoInput,
    AudioInput,
    AudioOutput,
}

/// A device as reported by platform enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    /// Opaque device identifier (e.g. /dev/video0)
    pub device_id: String,
    /// Human-readable label, empty when the platform hides it
    pub label: String,
    pub kind: MediaDeviceKind,
}

/// Camera descriptor
///
/// Identity is the device identifier; the label is informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraInfo {
    pub device_id: String,
    pub label: Option<String>,
}

impl CameraInfo {
    pub fn new(device_id: impl Into<String>, label: Option<String>) -> Self {
        Self {
            device_id: device_id.into(),
            label,
        }
    }

    /// Label if present, device identifier otherwise
    pub fn display_name(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => &self.device_id,
        }
    }
}

impl PartialEq for CameraInfo {
    fn eq(&self, other: &Self) -> bool {
        self.device_id == other.device_id
    }
}

impl Eq for CameraInfo {}

impl Hash for CameraInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.device_id.hash(state);
    }
}

impl From<&MediaDeviceInfo> for CameraInfo {
    fn from(info: &MediaDeviceInfo) -> Self {
        Self {
            device_id: info.device_id.clone(),
            label: (!info.label.is_empty()).then(|| info.label.clone()),
        }
    }
}

/// Inclusive numeric range reported by a capability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

impl NumericRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Focus modes a track can be put into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusMode {
    Manual,
    SingleShot,
    Continuous,
}

/// Platform-reported ranges and support flags for a camera track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackCapabilities {
    pub width: Option<NumericRange>,
    pub height: Option<NumericRange>,
    pub frame_rate: Option<NumericRange>,
    pub zoom: Option<NumericRange>,
    pub focus_modes: Vec<FocusMode>,
    pub torch: bool,
}

impl TrackCapabilities {
    pub fn supports_continuous_focus(&self) -> bool {
        self.focus_modes.contains(&FocusMode::Continuous)
    }
}

/// Current settings of a live camera track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSettings {
    pub device_id: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub zoom: Option<f64>,
    pub focus_mode: Option<FocusMode>,
    pub torch: Option<bool>,
}

/// A numeric constraint with optional bounds and a preferred value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstrainValue {
    pub min: Option<u32>,
    pub ideal: Option<u32>,
    pub max: Option<u32>,
}

impl ConstrainValue {
    pub fn ideal(value: u32) -> Self {
        Self {
            ideal: Some(value),
            ..Self::default()
        }
    }

    pub fn range(min: u32, ideal: u32, max: u32) -> Self {
        Self {
            min: Some(min),
            ideal: Some(ideal),
            max: Some(max),
        }
    }

    /// Check a concrete value against the hard bounds
    pub fn accepts(&self, value: u32) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Camera facing direction hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FacingMode {
    Environment,
    User,
}

/// Constraint set used when acquiring a stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConstraints {
    /// Exact device match, any device when unset
    pub device_id: Option<String>,
    pub width: Option<ConstrainValue>,
    pub height: Option<ConstrainValue>,
    pub frame_rate: Option<ConstrainValue>,
    pub facing_mode: Option<FacingMode>,
}

impl StreamConstraints {
    /// Minimal constraint set that pins one device and nothing else
    pub fn exact_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            ..Self::default()
        }
    }

    /// Constraints used while probing a candidate
    pub fn probe(device_id: impl Into<String>) -> Self {
        use crate::constants::selection::{PROBE_FRAME_RATE, PROBE_HEIGHT, PROBE_WIDTH};

        Self {
            device_id: Some(device_id.into()),
            width: Some(ConstrainValue::ideal(PROBE_WIDTH)),
            height: Some(ConstrainValue::ideal(PROBE_HEIGHT)),
            frame_rate: Some(ConstrainValue::ideal(PROBE_FRAME_RATE)),
            facing_mode: None,
        }
    }
}

/// Constraints applied to an already live track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvancedConstraints {
    pub zoom: Option<f64>,
    pub torch: Option<bool>,
    pub focus_mode: Option<FocusMode>,
}

/// How much video data a stream has buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    /// No frame received yet
    HaveNothing,
    /// Format negotiated but no pixel data
    HaveMetadata,
    /// At least one frame is available for sampling
    HaveCurrentData,
}

/// A single RGBA frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixels, rows `stride` bytes apart
    pub data: Arc<[u8]>,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Wrap tightly packed RGBA data
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            stride: width * 4,
            captured_at: Instant::now(),
        }
    }
}

/// Result type for platform operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for platform operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Camera access was denied
    PermissionDenied,
    /// Camera device not found
    DeviceNotFound(String),
    /// Camera is in use by another stream or process
    DeviceBusy(String),
    /// Stream could not be started or failed while running
    StreamFailed(String),
    /// A control could not be read or applied
    ControlFailed(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl BackendError {
    /// Classify an I/O error raised while opening or streaming a device
    pub fn from_io(device_id: &str, err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            return BackendError::PermissionDenied;
        }
        if err.kind() == std::io::ErrorKind::NotFound {
            return BackendError::DeviceNotFound(device_id.to_string());
        }
        if err.raw_os_error() == Some(libc::EBUSY) {
            return BackendError::DeviceBusy(device_id.to_string());
        }
        BackendError::IoError(format!("{}: {}", device_id, err))
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::PermissionDenied => write!(f, "Camera access denied"),
            BackendError::DeviceNotFound(id) => write!(f, "Device not found: {}", id),
            BackendError::DeviceBusy(id) => write!(f, "Device busy: {}", id),
            BackendError::StreamFailed(msg) => write!(f, "Stream failed: {}", msg),
            BackendError::ControlFailed(msg) => write!(f, "Control failed: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_camera_info_identity_is_device_id() {
        let a = CameraInfo::new("cam0", Some("Back Camera".into()));
        let b = CameraInfo::new("cam0", None);
        let c = CameraInfo::new("cam1", Some("Back Camera".into()));

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        assert_eq!(CameraInfo::new("cam0", None).display_name(), "cam0");
        assert_eq!(
            CameraInfo::new("cam0", Some(String::new())).display_name(),
            "cam0"
        );
        assert_eq!(
            CameraInfo::new("cam0", Some("Rear".into())).display_name(),
            "Rear"
        );
    }

    #[test]
    fn test_constrain_value_bounds() {
        let c = ConstrainValue::range(900, 1080, 1440);
        assert!(c.accepts(1080));
        assert!(!c.accepts(720));
        assert!(!c.accepts(2160));
        assert!(ConstrainValue::ideal(480).accepts(4000));
    }

    #[test]
    fn test_exact_device_pins_only_device() {
        let c = StreamConstraints::exact_device("cam3");
        assert_eq!(c.device_id.as_deref(), Some("cam3"));
        assert!(c.width.is_none() && c.height.is_none() && c.frame_rate.is_none());
    }

    #[test]
    fn test_ready_state_ordering() {
        assert!(ReadyState::HaveNothing < ReadyState::HaveMetadata);
        assert!(ReadyState::HaveMetadata < ReadyState::HaveCurrentData);
    }

    #[test]
    fn test_io_error_classification() {
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(
            BackendError::from_io("cam0", &denied),
            BackendError::PermissionDenied
        );

        let busy = std::io::Error::from_raw_os_error(libc::EBUSY);
        assert_eq!(
            BackendError::from_io("cam0", &busy),
            BackendError::DeviceBusy("cam0".into())
        );
    }
}
