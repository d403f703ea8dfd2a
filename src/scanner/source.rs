// SPDX-License-Identifier: GPL-3.0-only

//! The active video source slot
//!
//! Exactly one stream is bound at a time. Binding a new stream stops the
//! previous one. The session takes the old stream out before acquiring a
//! new camera, so the hardware is never held twice.

use crate::backends::camera::CameraStream;
use crate::backends::camera::types::{
    AdvancedConstraints, BackendError, BackendResult, CameraFrame, ReadyState, TrackCapabilities,
};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// Shared slot holding the stream the decode loop samples
#[derive(Clone, Default)]
pub struct ActiveSource {
    slot: Arc<Mutex<Option<Box<dyn CameraStream>>>>,
}

impl ActiveSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn CameraStream>>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Bind a stream, stopping whatever was bound before
    ///
    /// The previous stream is stopped after the slot is unlocked, so the
    /// decode loop never waits on a device shutdown.
    pub fn bind(&self, stream: Box<dyn CameraStream>) {
        info!(device_id = stream.device_id(), "Bound active video source");
        let previous = self.lock().replace(stream);
        if let Some(mut previous) = previous {
            previous.stop();
        }
    }

    /// Unbind the current stream without stopping it
    pub fn take(&self) -> Option<Box<dyn CameraStream>> {
        let stream = self.lock().take()?;
        info!(device_id = stream.device_id(), "Unbound active video source");
        Some(stream)
    }

    /// Stop and unbind the current stream, returning its device id
    pub fn release(&self) -> Option<String> {
        let mut stream = self.take()?;
        stream.stop();
        Some(stream.device_id().to_string())
    }

    pub fn is_bound(&self) -> bool {
        self.lock().is_some()
    }

    pub fn device_id(&self) -> Option<String> {
        self.lock().as_ref().map(|s| s.device_id().to_string())
    }

    /// Ready state of the bound stream, `HaveNothing` when unbound
    pub fn ready_state(&self) -> ReadyState {
        self.lock()
            .as_ref()
            .map(|s| s.ready_state())
            .unwrap_or(ReadyState::HaveNothing)
    }

    pub fn current_frame(&self) -> Option<CameraFrame> {
        self.lock().as_ref().and_then(|s| s.current_frame())
    }

    pub fn capabilities(&self) -> Option<TrackCapabilities> {
        self.lock().as_ref().map(|s| s.capabilities())
    }

    pub fn apply_constraints(&self, constraints: &AdvancedConstraints) -> BackendResult<()> {
        match self.lock().as_mut() {
            Some(stream) => stream.apply_constraints(constraints),
            None => Err(BackendError::StreamFailed("no active video source".to_string())),
        }
    }
}

impl fmt::Debug for ActiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSource")
            .field("device_id", &self.device_id())
            .finish()
    }
}
