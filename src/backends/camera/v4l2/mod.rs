// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera platform
//!
//! Devices are `/dev/video*` capture nodes. Streams are opened with the
//! `v4l` crate; zoom, focus and torch go through raw control ioctls.

pub mod enumeration;
pub mod stream;

use super::types::{
    BackendError, BackendResult, FacingMode, MediaDeviceInfo, StreamConstraints,
};
use super::{CameraPlatform, CameraStream};
use crate::constants::capture::DEFAULT_FRAME_RATE;
use crate::constants::selection::REAR_KEYWORDS;
use enumeration::{choose_frame_size, read_capabilities, supported_frame_sizes};
use stream::V4l2Stream;
use tracing::{debug, info};
use v4l::prelude::*;

/// V4L2-backed media-device service
#[derive(Debug, Default)]
pub struct V4l2Platform;

impl V4l2Platform {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the device to open for a constraint set
    fn resolve_device(&self, constraints: &StreamConstraints) -> BackendResult<MediaDeviceInfo> {
        let devices = enumeration::enumerate_capture_devices()?;

        if let Some(id) = constraints.device_id.as_deref() {
            return devices
                .into_iter()
                .find(|d| d.device_id == id)
                .ok_or_else(|| BackendError::DeviceNotFound(id.to_string()));
        }

        let rear = |d: &MediaDeviceInfo| {
            let label = d.label.to_lowercase();
            REAR_KEYWORDS.iter().any(|k| label.contains(k))
        };
        let preferred = match constraints.facing_mode {
            Some(FacingMode::Environment) => devices.iter().position(rear),
            Some(FacingMode::User) => devices.iter().position(|d| !rear(d)),
            None => None,
        };

        let index = preferred.unwrap_or(0);
        devices
            .into_iter()
            .nth(index)
            .ok_or_else(|| BackendError::DeviceNotFound("no capture device".to_string()))
    }
}

impl CameraPlatform for V4l2Platform {
    fn enumerate_devices(&self) -> BackendResult<Vec<MediaDeviceInfo>> {
        enumeration::enumerate_capture_devices()
    }

    fn get_user_media(
        &self,
        constraints: &StreamConstraints,
    ) -> BackendResult<Box<dyn CameraStream>> {
        let device = self.resolve_device(constraints)?;
        let path = device.device_id.as_str();
        debug!(path, ?constraints, "Acquiring V4L2 stream");

        // Probe sizes and controls with a short-lived handle; the capture
        // thread opens its own.
        let sizes = {
            let dev = Device::with_path(path).map_err(|e| BackendError::from_io(path, &e))?;
            supported_frame_sizes(&dev)
        };
        let choice = choose_frame_size(&sizes, constraints).ok_or_else(|| {
            BackendError::StreamFailed(format!("{}: no frame size satisfies the constraints", path))
        })?;
        let capabilities = read_capabilities(path, &sizes);

        let fps = constraints
            .frame_rate
            .and_then(|c| c.ideal.or(c.max))
            .unwrap_or(DEFAULT_FRAME_RATE);

        let label = (!device.label.is_empty()).then(|| device.label.clone());
        let stream = V4l2Stream::start(path, label, capabilities, choice, fps)?;

        info!(
            path,
            width = choice.width,
            height = choice.height,
            format = ?choice.format,
            fps,
            "V4L2 stream acquired"
        );
        Ok(Box::new(stream))
    }
}
