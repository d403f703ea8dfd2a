// SPDX-License-Identifier: GPL-3.0-only

//! Rear camera enumeration

use super::selector::label_matches;
use crate::backends::camera::types::{CameraInfo, MediaDeviceKind, StreamConstraints};
use crate::backends::camera::{CameraPlatform, acquire_stream, stop_stream};
use crate::constants::selection::REAR_KEYWORDS;
use crate::errors::ScanResult;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Acquire and release a throwaway stream so device labels are populated
///
/// Failure is not fatal; enumeration may still return devices.
pub async fn request_camera_access<P>(platform: &Arc<P>)
where
    P: CameraPlatform + ?Sized + 'static,
{
    match acquire_stream(platform, StreamConstraints::default()).await {
        Ok(stream) => {
            debug!(device_id = stream.device_id(), "Camera access granted");
            stop_stream(stream).await;
        }
        Err(e) => warn!(error = %e, "Camera access request failed"),
    }
}

/// List every video input
pub fn enumerate_video_inputs<P>(platform: &P) -> ScanResult<Vec<CameraInfo>>
where
    P: CameraPlatform + ?Sized,
{
    let devices = platform.enumerate_devices()?;
    Ok(devices
        .iter()
        .filter(|d| d.kind == MediaDeviceKind::VideoInput)
        .map(CameraInfo::from)
        .collect())
}

/// List video inputs whose label marks them as rear-facing
pub async fn enumerate_rear_cameras<P>(platform: &Arc<P>) -> ScanResult<Vec<CameraInfo>>
where
    P: CameraPlatform + ?Sized + 'static,
{
    request_camera_access(platform).await;

    let rear: Vec<CameraInfo> = enumerate_video_inputs(&**platform)?
        .into_iter()
        .filter(|c| {
            c.label
                .as_deref()
                .is_some_and(|l| label_matches(l, &REAR_KEYWORDS))
        })
        .collect();

    info!(count = rear.len(), "Enumerated rear cameras");
    Ok(rear)
}
