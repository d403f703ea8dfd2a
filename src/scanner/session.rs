// SPDX-License-Identifier: GPL-3.0-only

//! Scanning session
//!
//! Owns the shared state between camera selection, the decode loop and the
//! UI: the camera list, the active source, the result history and the
//! selection diagnostics.

use super::enumeration::{enumerate_rear_cameras, enumerate_video_inputs};
use super::history::{ScanHistory, ScanRecord};
use super::sampler::{DecodeLoop, ScanEvent};
use super::selector::{CameraScore, CameraSelection, select_best_rear_camera};
use super::source::ActiveSource;
use crate::backends::camera::types::{
    AdvancedConstraints, CameraFrame, CameraInfo, StreamConstraints,
};
use crate::backends::camera::{CameraPlatform, acquire_stream, stop_stream};
use crate::config::Config;
use crate::constants::sampling::EVENT_CHANNEL_CAPACITY;
use crate::decoder::DecoderHandle;
use crate::errors::{ScanError, ScanResult};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// UI-facing view of a session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    pub cameras: Vec<CameraInfo>,
    pub active_device: Option<String>,
    pub latest: Option<ScanRecord>,
    pub history: Vec<ScanRecord>,
    pub diagnostics: Vec<CameraScore>,
    pub decoder_loaded: bool,
    pub scanning: bool,
}

/// A camera scanning session
pub struct ScanSession {
    platform: Arc<dyn CameraPlatform>,
    decoder: DecoderHandle,
    config: Config,
    source: ActiveSource,
    history: Arc<Mutex<ScanHistory>>,
    events: broadcast::Sender<ScanEvent>,
    cameras: Vec<CameraInfo>,
    diagnostics: Vec<CameraScore>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl ScanSession {
    pub fn new(platform: Arc<dyn CameraPlatform>, decoder: DecoderHandle, config: Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let history = Arc::new(Mutex::new(config.sampler.new_history()));
        Self {
            platform,
            decoder,
            config,
            source: ActiveSource::new(),
            history,
            events,
            cameras: Vec::new(),
            diagnostics: Vec::new(),
            cancel: None,
            task: None,
        }
    }

    /// Enumerate cameras, select the best rear camera, bind it and start
    /// scanning
    ///
    /// Falls back to every video input when no camera is labelled as
    /// rear-facing.
    pub async fn start(&mut self) -> ScanResult<CameraSelection> {
        // Enumeration and probing need the hardware
        self.unbind().await;

        let candidates = self.refresh_cameras().await?;
        if candidates.is_empty() {
            return Err(ScanError::NoCandidates);
        }

        let selection =
            select_best_rear_camera(&self.platform, &candidates, &self.config.selector).await?;
        self.diagnostics = selection.diagnostics.clone();

        self.activate(&selection.suggested_constraints).await?;
        self.apply_initial_constraints();
        self.ensure_loop();

        Ok(selection)
    }

    /// Enumerate cameras and start scanning on a specific device, skipping
    /// selection
    pub async fn start_on(&mut self, device_id: &str) -> ScanResult<()> {
        self.unbind().await;
        self.refresh_cameras().await?;
        self.switch_device(device_id).await?;
        self.apply_initial_constraints();
        self.ensure_loop();
        Ok(())
    }

    /// Start on a remembered device, selecting a camera when it is unusable
    ///
    /// The remembered device is only used while it is still in the camera
    /// list and can be acquired. Otherwise it is forgotten and the best rear
    /// camera is selected. Returns the selection when one was made.
    pub async fn start_preferring(
        &mut self,
        remembered: &str,
    ) -> ScanResult<Option<CameraSelection>> {
        self.unbind().await;
        self.refresh_cameras().await?;

        if self.cameras.iter().any(|c| c.device_id == remembered) {
            match self.switch_device(remembered).await {
                Ok(()) => {
                    self.apply_initial_constraints();
                    self.ensure_loop();
                    return Ok(None);
                }
                Err(e) => warn!(device_id = remembered, error = %e, "Remembered camera unusable"),
            }
        } else {
            info!(device_id = remembered, "Remembered camera not listed");
        }

        // Forget it so later runs go straight to selection
        self.config.last_device_id = None;
        self.start().await.map(Some)
    }

    /// Rebind the active source to another device
    ///
    /// The current stream is stopped before the new one is requested. On
    /// failure the session is left without a source and the decode loop
    /// idles until a source is bound again.
    pub async fn switch_device(&mut self, device_id: &str) -> ScanResult<()> {
        info!(device_id, "Switching camera");
        self.unbind().await;
        self.activate(&StreamConstraints::exact_device(device_id)).await?;
        self.config.last_device_id = Some(device_id.to_string());
        Ok(())
    }

    /// Stop scanning and release the camera
    pub async fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Decode loop task failed");
        }
        self.unbind().await;
        info!("Scan session stopped");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        SessionSnapshot {
            cameras: self.cameras.clone(),
            active_device: self.source.device_id(),
            latest: history.latest().cloned(),
            history: history.to_vec(),
            diagnostics: self.diagnostics.clone(),
            decoder_loaded: self.decoder.is_loaded(),
            scanning: self.is_scanning(),
        }
    }

    /// Whether the decode loop is running
    pub fn is_scanning(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Latest frame of the active source, for previews
    pub fn current_frame(&self) -> Option<CameraFrame> {
        self.source.current_frame()
    }

    pub fn cameras(&self) -> &[CameraInfo] {
        &self.cameras
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Camera after the active one in the list, wrapping around
    pub fn next_camera(&self) -> Option<&CameraInfo> {
        let active = self.source.device_id();
        let pos = self
            .cameras
            .iter()
            .position(|c| Some(&c.device_id) == active.as_ref());
        let next = pos.map_or(0, |p| (p + 1) % self.cameras.len().max(1));
        self.cameras.get(next)
    }

    async fn refresh_cameras(&mut self) -> ScanResult<Vec<CameraInfo>> {
        let mut cameras = enumerate_rear_cameras(&self.platform).await?;
        if cameras.is_empty() {
            warn!("No rear-labelled cameras, falling back to all video inputs");
            cameras = enumerate_video_inputs(&*self.platform)?;
        }
        self.cameras = cameras.clone();
        Ok(cameras)
    }

    async fn activate(&mut self, constraints: &StreamConstraints) -> ScanResult<()> {
        let stream = acquire_stream(&self.platform, constraints.clone())
            .await
            .inspect_err(|e| {
                warn!(?constraints, error = %e, "Failed to acquire camera stream");
            })?;
        let device_id = stream.device_id().to_string();
        self.source.bind(stream);
        let _ = self
            .events
            .send(ScanEvent::ActiveDeviceChanged(Some(device_id)));
        Ok(())
    }

    /// Take the active stream out of the slot and stop it off the executor
    async fn unbind(&mut self) {
        let Some(stream) = self.source.take() else {
            return;
        };
        stop_stream(stream).await;
        let _ = self.events.send(ScanEvent::ActiveDeviceChanged(None));
    }

    /// Apply the configured zoom and torch to the fresh stream
    fn apply_initial_constraints(&self) {
        let Some(capabilities) = self.source.capabilities() else {
            return;
        };

        let zoom = self
            .config
            .zoom_fraction
            .zip(capabilities.zoom)
            .map(|(fraction, range)| range.max * fraction);
        let torch = (self.config.enable_torch && capabilities.torch).then_some(true);

        if zoom.is_none() && torch.is_none() {
            return;
        }

        let constraints = AdvancedConstraints {
            zoom,
            torch,
            focus_mode: None,
        };
        match self.source.apply_constraints(&constraints) {
            Ok(()) => debug!(?constraints, "Applied initial track constraints"),
            Err(e) => warn!(error = %e, "Failed to apply initial track constraints"),
        }
    }

    fn ensure_loop(&mut self) {
        if self.is_scanning() {
            return;
        }

        let cancel = CancellationToken::new();
        let decode_loop = DecodeLoop::new(
            self.source.clone(),
            self.decoder.clone(),
            self.config.sampler.clone(),
            Arc::clone(&self.history),
            self.events.clone(),
        );
        self.task = Some(tokio::spawn(decode_loop.run(cancel.clone())));
        self.cancel = Some(cancel);
        debug!("Spawned decode loop");
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.source.release();
    }
}
