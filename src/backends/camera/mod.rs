// SPDX-License-Identifier: GPL-3.0-only

//! Camera platform abstraction
//!
//! The scanner never talks to camera hardware directly. It consumes the
//! small set of media-device operations below, which a platform implements:
//!
//! ```text
//! ┌─────────────────────┐
//! │  ScanSession / CLI  │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraPlatform Trait│  ← enumerate, acquire
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//!  ┌──────┐   ┌─────────┐
//!  │ V4L2 │   │ Virtual │
//!  └──────┘   └─────────┘
//! ```

pub mod format_converters;
pub mod frame_loop;
pub mod types;
pub mod v4l2;
pub mod v4l2_controls;
pub mod v4l2_utils;

pub use types::*;

use std::sync::Arc;
use tracing::warn;

/// Media-device service
///
/// Mirrors the operations a browser exposes through `navigator.mediaDevices`:
/// device enumeration and stream acquisition under a constraint set.
pub trait CameraPlatform: Send + Sync {
    /// Enumerate input and output media devices
    fn enumerate_devices(&self) -> BackendResult<Vec<MediaDeviceInfo>>;

    /// Acquire a live camera stream matching the constraints
    ///
    /// The returned stream holds the camera hardware until [`CameraStream::stop`]
    /// is called or the stream is dropped.
    fn get_user_media(
        &self,
        constraints: &StreamConstraints,
    ) -> BackendResult<Box<dyn CameraStream>>;
}

/// A live camera stream with a single video track
pub trait CameraStream: Send {
    /// Identifier of the device backing this stream
    fn device_id(&self) -> &str;

    /// Device label, if the platform reports one
    fn label(&self) -> Option<&str>;

    /// Capability ranges and support flags for the video track
    fn capabilities(&self) -> TrackCapabilities;

    /// Current settings of the video track
    fn settings(&self) -> TrackSettings;

    /// Apply zoom/torch/focus constraints to the live track
    fn apply_constraints(&mut self, constraints: &AdvancedConstraints) -> BackendResult<()>;

    /// Stop every track of the stream and release the hardware
    ///
    /// Stopping an already stopped stream is a no-op.
    fn stop(&mut self);

    /// Whether any track is still live
    fn is_live(&self) -> bool;

    /// How much video data is buffered
    fn ready_state(&self) -> ReadyState;

    /// Most recent RGBA frame, if any
    fn current_frame(&self) -> Option<CameraFrame>;
}

/// Acquire a stream on the blocking pool
///
/// Opening a device and starting capture can take a while on real
/// hardware, so it never runs on an async worker.
pub async fn acquire_stream<P>(
    platform: &Arc<P>,
    constraints: StreamConstraints,
) -> BackendResult<Box<dyn CameraStream>>
where
    P: CameraPlatform + ?Sized + 'static,
{
    let platform = Arc::clone(platform);
    tokio::task::spawn_blocking(move || platform.get_user_media(&constraints))
        .await
        .map_err(|e| BackendError::StreamFailed(format!("acquisition task failed: {}", e)))?
}

/// Stop a stream on the blocking pool and drop it
///
/// Stopping joins the capture thread, which may wait out a dequeue timeout.
pub async fn stop_stream(mut stream: Box<dyn CameraStream>) {
    let device_id = stream.device_id().to_string();
    if let Err(e) = tokio::task::spawn_blocking(move || stream.stop()).await {
        warn!(device_id = %device_id, error = %e, "Stream stop task failed");
    }
}

/// Get the platform for the running system (V4L2)
pub fn get_platform() -> Box<dyn CameraPlatform> {
    Box::new(v4l2::V4l2Platform::new())
}
