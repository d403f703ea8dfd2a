// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera platform
//!
//! An in-memory [`CameraPlatform`] with scripted devices. Each device has
//! fixed capabilities, an optional frame (from an image file or a generated
//! pattern) and an optional acquisition failure. The platform counts live
//! streams so callers can check that at most one camera is held at a time.
//!
//! ```text
//! VirtualDevice ──► VirtualPlatform::get_user_media ──► VirtualStream
//!                        │                                   │
//!                        └──── live / peak accounting ◄──────┘ stop()
//! ```

mod file_source;

pub use file_source::{grey_frame, load_image_as_frame, padded_frame};

use crate::backends::camera::types::{
    AdvancedConstraints, BackendError, BackendResult, CameraFrame, FacingMode, MediaDeviceInfo,
    MediaDeviceKind, NumericRange, ReadyState, StreamConstraints, TrackCapabilities,
    TrackSettings,
};
use crate::backends::camera::{CameraPlatform, CameraStream};
use crate::constants::selection::REAR_KEYWORDS;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// A scripted device
#[derive(Debug, Clone)]
pub struct VirtualDevice {
    pub device_id: String,
    pub label: String,
    pub kind: MediaDeviceKind,
    pub capabilities: TrackCapabilities,
    /// Settings reported by a live track
    pub settings: TrackSettings,
    /// Frame returned while live; `None` keeps the stream at `HaveMetadata`
    pub frame: Option<CameraFrame>,
    /// Error returned by every acquisition of this device
    pub fail_with: Option<BackendError>,
}

impl VirtualDevice {
    /// Video input with a 640x480 grey frame and no capabilities
    pub fn camera(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        let device_id = device_id.into();
        Self {
            settings: TrackSettings {
                device_id: Some(device_id.clone()),
                width: Some(640),
                height: Some(480),
                frame_rate: Some(30.0),
                ..Default::default()
            },
            device_id,
            label: label.into(),
            kind: MediaDeviceKind::VideoInput,
            capabilities: TrackCapabilities::default(),
            frame: Some(grey_frame(640, 480, 128)),
            fail_with: None,
        }
    }

    /// Non-video device, filtered out by camera enumeration
    pub fn microphone(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: MediaDeviceKind::AudioInput,
            frame: None,
            ..Self::camera(device_id, label)
        }
    }

    /// Advertise a maximum resolution
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.capabilities.width = Some(NumericRange::new(1.0, width as f64));
        self.capabilities.height = Some(NumericRange::new(1.0, height as f64));
        self
    }

    /// Report current settings only, no capability ranges
    pub fn with_settings_size(mut self, width: u32, height: u32) -> Self {
        self.capabilities.width = None;
        self.capabilities.height = None;
        self.settings.width = Some(width);
        self.settings.height = Some(height);
        self
    }

    pub fn with_zoom(mut self, max: f64) -> Self {
        self.capabilities.zoom = Some(NumericRange::new(1.0, max));
        self
    }

    pub fn with_continuous_focus(mut self) -> Self {
        use crate::backends::camera::types::FocusMode;
        for mode in [FocusMode::Manual, FocusMode::Continuous] {
            if !self.capabilities.focus_modes.contains(&mode) {
                self.capabilities.focus_modes.push(mode);
            }
        }
        self
    }

    pub fn with_torch(mut self) -> Self {
        self.capabilities.torch = true;
        self
    }

    pub fn with_frame(mut self, frame: Option<CameraFrame>) -> Self {
        self.frame = frame;
        self
    }

    /// Use an image file as the frame
    pub fn with_image(self, path: &Path) -> BackendResult<Self> {
        let frame = load_image_as_frame(path)?;
        Ok(self.with_frame(Some(frame)))
    }

    pub fn failing(mut self, error: BackendError) -> Self {
        self.fail_with = Some(error);
        self
    }

    fn info(&self) -> MediaDeviceInfo {
        MediaDeviceInfo {
            device_id: self.device_id.clone(),
            label: self.label.clone(),
            kind: self.kind,
        }
    }

    fn is_rear(&self) -> bool {
        let label = self.label.to_lowercase();
        REAR_KEYWORDS.iter().any(|k| label.contains(k))
    }
}

#[derive(Debug, Default)]
struct PlatformState {
    devices: Vec<VirtualDevice>,
    warmup: Duration,
    enumerate_error: Option<BackendError>,
    /// Fail acquisitions that do not pin a device (the permission prompt)
    deny_unpinned: bool,
    live: Vec<String>,
    peak_live: usize,
    acquisitions: Vec<StreamConstraints>,
    applied: Vec<(String, AdvancedConstraints)>,
}

impl PlatformState {
    fn pick_device(&self, constraints: &StreamConstraints) -> BackendResult<VirtualDevice> {
        let video = || self.devices.iter().filter(|d| d.kind == MediaDeviceKind::VideoInput);

        let device = match constraints.device_id.as_deref() {
            Some(id) => video()
                .find(|d| d.device_id == id)
                .ok_or_else(|| BackendError::DeviceNotFound(id.to_string()))?,
            None => {
                if self.deny_unpinned {
                    return Err(BackendError::PermissionDenied);
                }
                let preferred = match constraints.facing_mode {
                    Some(FacingMode::Environment) => video().find(|d| d.is_rear()),
                    Some(FacingMode::User) => video().find(|d| !d.is_rear()),
                    None => None,
                };
                preferred
                    .or_else(|| video().next())
                    .ok_or_else(|| BackendError::DeviceNotFound("no video input".to_string()))?
            }
        };

        match &device.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(device.clone()),
        }
    }
}

/// Scripted media-device service
#[derive(Debug, Clone, Default)]
pub struct VirtualPlatform {
    state: Arc<Mutex<PlatformState>>,
}

impl VirtualPlatform {
    pub fn new(devices: Vec<VirtualDevice>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PlatformState {
                devices,
                ..Default::default()
            })),
        }
    }

    /// Single rear camera showing the given image
    pub fn from_image(path: &Path) -> BackendResult<Self> {
        let device = VirtualDevice::camera("virtual0", "Virtual Back Camera")
            .with_continuous_focus()
            .with_image(path)?;
        Ok(Self::new(vec![device]))
    }

    fn lock(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Delay after acquisition before streams report `HaveCurrentData`
    pub fn set_warmup(&self, warmup: Duration) {
        self.lock().warmup = warmup;
    }

    /// Make `enumerate_devices` fail
    pub fn set_enumerate_error(&self, error: Option<BackendError>) {
        self.lock().enumerate_error = error;
    }

    /// Make acquisitions without a pinned device fail with `PermissionDenied`
    pub fn set_deny_unpinned(&self, deny: bool) {
        self.lock().deny_unpinned = deny;
    }

    /// Replace the frame a device shows; live streams pick it up immediately
    pub fn set_frame(&self, device_id: &str, frame: Option<CameraFrame>) {
        if let Some(device) = self.lock().devices.iter_mut().find(|d| d.device_id == device_id) {
            device.frame = frame;
        }
    }

    /// Devices currently held by a live stream
    pub fn live_devices(&self) -> Vec<String> {
        self.lock().live.clone()
    }

    pub fn live_streams(&self) -> usize {
        self.lock().live.len()
    }

    /// Highest number of simultaneously live streams seen
    pub fn peak_live_streams(&self) -> usize {
        self.lock().peak_live
    }

    /// Every constraint set passed to `get_user_media`, in call order
    pub fn acquisitions(&self) -> Vec<StreamConstraints> {
        self.lock().acquisitions.clone()
    }

    /// Every advanced constraint set applied to a live track
    pub fn applied_constraints(&self) -> Vec<(String, AdvancedConstraints)> {
        self.lock().applied.clone()
    }
}

impl CameraPlatform for VirtualPlatform {
    fn enumerate_devices(&self) -> BackendResult<Vec<MediaDeviceInfo>> {
        let state = self.lock();
        if let Some(err) = &state.enumerate_error {
            return Err(err.clone());
        }
        Ok(state.devices.iter().map(VirtualDevice::info).collect())
    }

    fn get_user_media(
        &self,
        constraints: &StreamConstraints,
    ) -> BackendResult<Box<dyn CameraStream>> {
        let mut state = self.lock();
        state.acquisitions.push(constraints.clone());

        let device = state.pick_device(constraints).inspect_err(|e| {
            debug!(?constraints, error = %e, "Virtual acquisition failed");
        })?;

        state.live.push(device.device_id.clone());
        state.peak_live = state.peak_live.max(state.live.len());
        info!(device_id = %device.device_id, live = state.live.len(), "Virtual stream acquired");

        Ok(Box::new(VirtualStream {
            platform: self.clone(),
            device_id: device.device_id,
            label: (!device.label.is_empty()).then_some(device.label),
            capabilities: device.capabilities,
            settings: device.settings,
            ready_at: Instant::now() + state.warmup,
            live: true,
        }))
    }
}

/// Live stream on a virtual device
pub struct VirtualStream {
    platform: VirtualPlatform,
    device_id: String,
    label: Option<String>,
    capabilities: TrackCapabilities,
    settings: TrackSettings,
    ready_at: Instant,
    live: bool,
}

impl VirtualStream {
    fn frame(&self) -> Option<CameraFrame> {
        self.platform
            .lock()
            .devices
            .iter()
            .find(|d| d.device_id == self.device_id)
            .and_then(|d| d.frame.clone())
    }
}

impl CameraStream for VirtualStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn capabilities(&self) -> TrackCapabilities {
        self.capabilities.clone()
    }

    fn settings(&self) -> TrackSettings {
        self.settings.clone()
    }

    fn apply_constraints(&mut self, constraints: &AdvancedConstraints) -> BackendResult<()> {
        if !self.live {
            return Err(BackendError::StreamFailed(format!("{}: track ended", self.device_id)));
        }
        if let Some(zoom) = constraints.zoom {
            let range = self.capabilities.zoom.ok_or_else(|| {
                BackendError::ControlFailed(format!("{}: zoom not supported", self.device_id))
            })?;
            self.settings.zoom = Some(zoom.clamp(range.min, range.max));
        }
        if let Some(torch) = constraints.torch {
            if !self.capabilities.torch {
                return Err(BackendError::ControlFailed(format!(
                    "{}: torch not supported",
                    self.device_id
                )));
            }
            self.settings.torch = Some(torch);
        }
        if let Some(mode) = constraints.focus_mode {
            if !self.capabilities.focus_modes.contains(&mode) {
                return Err(BackendError::ControlFailed(format!(
                    "{}: focus mode {:?} not supported",
                    self.device_id, mode
                )));
            }
            self.settings.focus_mode = Some(mode);
        }

        self.platform
            .lock()
            .applied
            .push((self.device_id.clone(), constraints.clone()));
        Ok(())
    }

    fn stop(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;

        let mut state = self.platform.lock();
        if let Some(pos) = state.live.iter().position(|id| id == &self.device_id) {
            state.live.remove(pos);
        }
        debug!(device_id = %self.device_id, live = state.live.len(), "Virtual stream stopped");
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn ready_state(&self) -> ReadyState {
        if !self.live {
            ReadyState::HaveNothing
        } else if Instant::now() < self.ready_at || self.frame().is_none() {
            ReadyState::HaveMetadata
        } else {
            ReadyState::HaveCurrentData
        }
    }

    fn current_frame(&self) -> Option<CameraFrame> {
        if self.ready_state() == ReadyState::HaveCurrentData {
            self.frame()
        } else {
            None
        }
    }
}

impl Drop for VirtualStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform() -> VirtualPlatform {
        VirtualPlatform::new(vec![
            VirtualDevice::camera("front", "Front Camera"),
            VirtualDevice::camera("back", "Back Camera").with_zoom(4.0).with_torch(),
            VirtualDevice::microphone("mic", "Internal Microphone"),
        ])
    }

    #[test]
    fn test_stop_releases_device() {
        let platform = platform();
        let mut stream = platform
            .get_user_media(&StreamConstraints::exact_device("back"))
            .unwrap();
        assert_eq!(platform.live_devices(), vec!["back".to_string()]);

        stream.stop();
        stream.stop();
        assert_eq!(platform.live_streams(), 0);
        assert!(!stream.is_live());
        assert_eq!(stream.ready_state(), ReadyState::HaveNothing);
    }

    #[test]
    fn test_drop_releases_device() {
        let platform = platform();
        let stream = platform
            .get_user_media(&StreamConstraints::exact_device("front"))
            .unwrap();
        drop(stream);
        assert_eq!(platform.live_streams(), 0);
        assert_eq!(platform.peak_live_streams(), 1);
    }

    #[test]
    fn test_facing_mode_prefers_rear_label() {
        let platform = platform();
        let constraints = StreamConstraints {
            facing_mode: Some(FacingMode::Environment),
            ..Default::default()
        };
        let stream = platform.get_user_media(&constraints).unwrap();
        assert_eq!(stream.device_id(), "back");
    }

    #[test]
    fn test_unknown_and_non_video_devices_rejected() {
        let platform = platform();
        for id in ["nope", "mic"] {
            let err = platform
                .get_user_media(&StreamConstraints::exact_device(id))
                .err()
                .unwrap();
            assert_eq!(err, BackendError::DeviceNotFound(id.to_string()));
        }
        assert_eq!(platform.live_streams(), 0);
    }

    #[test]
    fn test_failure_injection() {
        let platform = VirtualPlatform::new(vec![
            VirtualDevice::camera("busy", "Rear").failing(BackendError::DeviceBusy("busy".into())),
        ]);
        let err = platform
            .get_user_media(&StreamConstraints::exact_device("busy"))
            .err()
            .unwrap();
        assert_eq!(err, BackendError::DeviceBusy("busy".into()));

        platform.set_deny_unpinned(true);
        let err = platform
            .get_user_media(&StreamConstraints::default())
            .err()
            .unwrap();
        assert_eq!(err, BackendError::PermissionDenied);
        assert_eq!(platform.acquisitions().len(), 2);
    }

    #[test]
    fn test_apply_constraints_checks_capabilities() {
        let platform = platform();
        let mut back = platform
            .get_user_media(&StreamConstraints::exact_device("back"))
            .unwrap();
        back.apply_constraints(&AdvancedConstraints {
            zoom: Some(10.0),
            torch: Some(true),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(back.settings().zoom, Some(4.0));
        assert_eq!(back.settings().torch, Some(true));

        let mut front = platform
            .get_user_media(&StreamConstraints::exact_device("front"))
            .unwrap();
        let err = front
            .apply_constraints(&AdvancedConstraints {
                torch: Some(true),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, BackendError::ControlFailed(_)));
        assert_eq!(platform.applied_constraints().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warmup_delays_readiness() {
        let platform = platform();
        platform.set_warmup(Duration::from_millis(500));
        let stream = platform
            .get_user_media(&StreamConstraints::exact_device("back"))
            .unwrap();

        assert_eq!(stream.ready_state(), ReadyState::HaveMetadata);
        assert!(stream.current_frame().is_none());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(stream.ready_state(), ReadyState::HaveCurrentData);
        assert!(stream.current_frame().is_some());

        platform.set_frame("back", None);
        assert_eq!(stream.ready_state(), ReadyState::HaveMetadata);
    }
}
