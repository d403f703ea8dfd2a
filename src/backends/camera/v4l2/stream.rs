// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture stream
//!
//! Each stream owns one capture thread. The thread dequeues mmap buffers,
//! converts them to RGBA and publishes the newest frame into a shared slot
//! that the decode loop samples.

use super::enumeration::{CaptureFormat, FrameSizeOption};
use crate::backends::camera::CameraStream;
use crate::backends::camera::format_converters::{self, Packed422};
use crate::backends::camera::frame_loop::{CaptureThread, Step};
use crate::backends::camera::types::{
    AdvancedConstraints, BackendError, BackendResult, CameraFrame, FocusMode, ReadyState,
    TrackCapabilities, TrackSettings,
};
use crate::backends::camera::v4l2_controls::{self as controls, DeviceControls};
use crate::constants::capture::BUFFER_COUNT;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use v4l::buffer::Type;
use v4l::io::traits::{CaptureStream as _, Stream as _};
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;

/// Consecutive dequeue failures tolerated before the capture thread gives up
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Dequeue timeout so a stalled device cannot block shutdown forever
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// Format agreed with the driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NegotiatedFormat {
    pub format: CaptureFormat,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<f64>,
}

type FrameSlot = Arc<Mutex<Option<CameraFrame>>>;

struct CaptureState {
    stream: MmapStream<'static>,
    negotiated: NegotiatedFormat,
    consecutive_errors: u32,
}

/// Open the device, negotiate the format and start streaming
fn open_capture(path: &str, choice: FrameSizeOption, fps: u32) -> BackendResult<CaptureState> {
    let dev = Device::with_path(path).map_err(|e| BackendError::from_io(path, &e))?;

    let requested = v4l::Format::new(choice.width, choice.height, choice.format.fourcc());
    let applied = dev
        .set_format(&requested)
        .map_err(|e| BackendError::from_io(path, &e))?;

    let format = CaptureFormat::from_fourcc(applied.fourcc).ok_or_else(|| {
        BackendError::StreamFailed(format!(
            "{}: driver chose unsupported format {}",
            path, applied.fourcc
        ))
    })?;

    let frame_rate = match dev.set_params(&Parameters::with_fps(fps)) {
        Ok(params) if params.interval.numerator > 0 => {
            Some(params.interval.denominator as f64 / params.interval.numerator as f64)
        }
        Ok(_) => None,
        Err(e) => {
            warn!(path, fps, error = %e, "Could not set frame rate");
            None
        }
    };

    let mut stream = MmapStream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT)
        .map_err(|e| BackendError::from_io(path, &e))?;
    stream.set_timeout(DEQUEUE_TIMEOUT);
    // Start explicitly so EBUSY surfaces here rather than on the first dequeue
    stream.start().map_err(|e| BackendError::from_io(path, &e))?;

    let negotiated = NegotiatedFormat {
        format,
        width: applied.width,
        height: applied.height,
        frame_rate,
    };
    info!(path, ?negotiated, "V4L2 capture stream started");

    Ok(CaptureState {
        stream,
        negotiated,
        consecutive_errors: 0,
    })
}

/// Convert one dequeued buffer to an RGBA frame
fn convert_buffer(data: &[u8], negotiated: &NegotiatedFormat) -> Result<CameraFrame, String> {
    let (width, height) = (negotiated.width, negotiated.height);
    let frame = match negotiated.format {
        CaptureFormat::Yuyv => CameraFrame::from_rgba(
            width,
            height,
            format_converters::packed422_to_rgba(data, width, height, Packed422::Yuyv),
        ),
        CaptureFormat::Uyvy => CameraFrame::from_rgba(
            width,
            height,
            format_converters::packed422_to_rgba(data, width, height, Packed422::Uyvy),
        ),
        CaptureFormat::Mjpeg => {
            let (w, h, rgba) = format_converters::mjpeg_to_rgba(data)?;
            CameraFrame::from_rgba(w, h, rgba)
        }
    };
    Ok(frame)
}

fn capture_iteration(state: &mut CaptureState, slot: &FrameSlot, name: &str) -> Step {
    let started = Instant::now();
    let (buf, meta) = match state.stream.next() {
        Ok(next) => next,
        Err(e) => {
            state.consecutive_errors += 1;
            warn!(name, error = %e, attempt = state.consecutive_errors, "Failed to dequeue buffer");
            return if state.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                Step::Finish
            } else {
                Step::Continue
            };
        }
    };
    state.consecutive_errors = 0;

    let used = (meta.bytesused as usize).min(buf.len());
    match convert_buffer(&buf[..used], &state.negotiated) {
        Ok(frame) => {
            trace!(
                name,
                sequence = meta.sequence,
                convert_us = started.elapsed().as_micros() as u64,
                "Captured frame"
            );
            *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
        }
        Err(e) => debug!(name, error = %e, "Dropping undecodable frame"),
    }
    Step::Continue
}

/// A live V4L2 stream
pub struct V4l2Stream {
    device_id: String,
    label: Option<String>,
    capabilities: TrackCapabilities,
    negotiated: NegotiatedFormat,
    latest: FrameSlot,
    /// `None` when the node refused a second handle for control ioctls
    controls: Option<DeviceControls>,
    capture: Option<CaptureThread>,
}

impl V4l2Stream {
    /// Start capturing and block until the device is streaming
    pub fn start(
        device_id: &str,
        label: Option<String>,
        capabilities: TrackCapabilities,
        choice: FrameSizeOption,
        fps: u32,
    ) -> BackendResult<Self> {
        let latest: FrameSlot = Arc::new(Mutex::new(None));

        let name = format!("capture:{}", device_id);
        let path = device_id.to_string();
        let loop_slot = Arc::clone(&latest);
        let loop_name = name.clone();

        let (capture, negotiated) = CaptureThread::spawn(
            name,
            move || {
                let state = open_capture(&path, choice, fps)?;
                let negotiated = state.negotiated;
                Ok((state, negotiated))
            },
            move |state| capture_iteration(state, &loop_slot, &loop_name),
        )?;

        let controls = DeviceControls::open(device_id)
            .inspect_err(|e| warn!(device_id, error = %e, "Track controls unavailable"))
            .ok();

        Ok(Self {
            device_id: device_id.to_string(),
            label,
            capabilities,
            negotiated,
            latest,
            controls,
            capture: Some(capture),
        })
    }

    fn controls(&self) -> BackendResult<&DeviceControls> {
        self.controls.as_ref().ok_or_else(|| {
            BackendError::ControlFailed(format!("{}: controls unavailable", self.device_id))
        })
    }
}

impl CameraStream for V4l2Stream {
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
        let controls = self.controls.as_ref();
        TrackSettings {
            device_id: Some(self.device_id.clone()),
            width: Some(self.negotiated.width),
            height: Some(self.negotiated.height),
            frame_rate: self.negotiated.frame_rate,
            zoom: controls
                .filter(|_| self.capabilities.zoom.is_some())
                .and_then(|c| c.get(controls::CID_ZOOM_ABSOLUTE))
                .map(f64::from),
            focus_mode: controls
                .filter(|_| self.capabilities.supports_continuous_focus())
                .and_then(DeviceControls::focus_mode),
            torch: controls
                .filter(|_| self.capabilities.torch)
                .and_then(DeviceControls::torch),
        }
    }

    fn apply_constraints(&mut self, constraints: &AdvancedConstraints) -> BackendResult<()> {
        let path = self.device_id.as_str();

        if let Some(zoom) = constraints.zoom {
            let range = self
                .capabilities
                .zoom
                .ok_or_else(|| {
                    BackendError::ControlFailed(format!("{}: zoom not supported", path))
                })?;
            let value = zoom.clamp(range.min, range.max).round() as i32;
            self.controls()?.set(controls::CID_ZOOM_ABSOLUTE, value)?;
            debug!(path, value, "Applied zoom");
        }

        if let Some(torch) = constraints.torch {
            if !self.capabilities.torch {
                return Err(BackendError::ControlFailed(format!("{}: torch not supported", path)));
            }
            self.controls()?.set_torch(torch)?;
            debug!(path, torch, "Applied torch");
        }

        if let Some(mode) = constraints.focus_mode {
            if !self.capabilities.focus_modes.contains(&mode) {
                return Err(BackendError::ControlFailed(format!(
                    "{}: focus mode {:?} not supported",
                    path, mode
                )));
            }
            let ctl = self.controls()?;
            let has_auto = self.capabilities.supports_continuous_focus();
            match mode {
                FocusMode::Continuous => ctl.set(controls::CID_FOCUS_AUTO, 1)?,
                FocusMode::Manual if has_auto => ctl.set(controls::CID_FOCUS_AUTO, 0)?,
                FocusMode::Manual => {}
                FocusMode::SingleShot => {
                    if has_auto {
                        ctl.set(controls::CID_FOCUS_AUTO, 0)?;
                    }
                    ctl.set(controls::CID_AUTO_FOCUS_START, 1)?;
                }
            }
            debug!(path, ?mode, "Applied focus mode");
        }

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            info!(device_id = %self.device_id, "Stopping V4L2 stream");
            capture.shutdown();
        }
        self.controls = None;
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn is_live(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureThread::is_running)
    }

    fn ready_state(&self) -> ReadyState {
        if !self.is_live() {
            return ReadyState::HaveNothing;
        }
        if self.latest.lock().unwrap_or_else(|e| e.into_inner()).is_some() {
            ReadyState::HaveCurrentData
        } else {
            ReadyState::HaveMetadata
        }
    }

    fn current_frame(&self) -> Option<CameraFrame> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop();
    }
}
