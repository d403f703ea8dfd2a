// SPDX-License-Identifier: GPL-3.0-only

//! Frame sampling and decode loop
//!
//! Each tick snapshots the active source's current frame, crops a centred
//! band, and hands the RGBA pixels to the decoder. New results are recorded
//! in the history and broadcast to subscribers.
//!
//! ```text
//!            ┌──────────── not ready ────────────┐
//!            ▼                                   │
//!   ┌──────────────┐  ready   ┌──────────┐       │
//!   │ check source │ ───────► │  sample  │ ──────┤
//!   └──────────────┘          └──────────┘       │
//!            ▲                     │ decode      │
//!            └── tick interval ────┘             │
//!            ▲                                   │
//!            └─────── not-ready retry ───────────┘
//! ```

use super::history::{ScanHistory, ScanRecord};
use super::source::ActiveSource;
use crate::backends::camera::types::{CameraFrame, ReadyState};
use crate::constants::sampling as consts;
use crate::decoder::DecoderHandle;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Centred crop applied before decoding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Fraction of the frame width kept (horizontal inset)
    pub width_fraction: f64,
    /// Fraction of the frame height kept (horizontal band)
    pub band_fraction: f64,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            width_fraction: consts::CROP_WIDTH_FRACTION,
            band_fraction: consts::CROP_BAND_FRACTION,
        }
    }
}

/// Pixel rectangle inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        1.0
    } else {
        fraction.clamp(f64::MIN_POSITIVE, 1.0)
    }
}

impl CropConfig {
    /// Centred region for a frame of the given size
    ///
    /// Always at least 1x1 and inside the frame for non-empty frames.
    pub fn region(&self, frame_width: u32, frame_height: u32) -> CropRegion {
        let size = |total: u32, fraction: f64| {
            ((total as f64 * clamp_fraction(fraction)).floor() as u32).clamp(1, total.max(1))
        };
        let width = size(frame_width, self.width_fraction);
        let height = size(frame_height, self.band_fraction);

        CropRegion {
            x: frame_width.saturating_sub(width) / 2,
            y: frame_height.saturating_sub(height) / 2,
            width,
            height,
        }
    }
}

/// Copy a region out of a frame as tightly packed RGBA
///
/// Honours the frame's row stride. `None` if the region does not fit.
pub fn extract_region(frame: &CameraFrame, region: CropRegion) -> Option<Vec<u8>> {
    if region.x + region.width > frame.width || region.y + region.height > frame.height {
        return None;
    }

    let stride = frame.stride as usize;
    let row = region.width as usize * 4;
    let mut pixels = Vec::with_capacity(row * region.height as usize);

    for y in region.y..region.y + region.height {
        let start = y as usize * stride + region.x as usize * 4;
        pixels.extend_from_slice(frame.data.get(start..start + row)?);
    }

    Some(pixels)
}

/// Decode loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub crop: CropConfig,
    /// Delay between ticks
    pub tick_interval_ms: u64,
    /// Delay before re-checking a source that is not ready
    pub not_ready_retry_ms: u64,
    pub try_harder: bool,
    /// Format restriction passed to the decoder; empty means any
    pub format_hint: String,
    pub dedup_window_ms: u64,
    pub history_limit: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            crop: CropConfig::default(),
            tick_interval_ms: consts::TICK_INTERVAL.as_millis() as u64,
            not_ready_retry_ms: consts::NOT_READY_RETRY.as_millis() as u64,
            try_harder: true,
            format_hint: String::new(),
            dedup_window_ms: consts::DEDUP_WINDOW.as_millis() as u64,
            history_limit: consts::HISTORY_LIMIT,
        }
    }
}

impl SamplerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn not_ready_retry(&self) -> Duration {
        Duration::from_millis(self.not_ready_retry_ms)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    /// Empty history sized for these settings
    pub fn new_history(&self) -> ScanHistory {
        ScanHistory::new(self.dedup_window(), self.history_limit)
    }
}

/// Events broadcast by a scanning session
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// A new result was surfaced
    Decoded(ScanRecord),
    /// The active device changed (`None` when unbound)
    ActiveDeviceChanged(Option<String>),
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Source missing or without current data
    NotReady,
    /// Decoder still loading
    DecoderPending,
    /// Decoder ran and found nothing
    NoResult,
    /// Decoder error, swallowed
    Failed,
    /// Result repeated the latest entry
    Duplicate,
    /// New result surfaced
    Surfaced(ScanRecord),
}

/// Periodic sampler feeding frames to the decoder
#[derive(Debug, Clone)]
pub struct DecodeLoop {
    source: ActiveSource,
    decoder: DecoderHandle,
    config: SamplerConfig,
    history: Arc<Mutex<ScanHistory>>,
    events: broadcast::Sender<ScanEvent>,
}

impl DecodeLoop {
    pub fn new(
        source: ActiveSource,
        decoder: DecoderHandle,
        config: SamplerConfig,
        history: Arc<Mutex<ScanHistory>>,
        events: broadcast::Sender<ScanEvent>,
    ) -> Self {
        Self {
            source,
            decoder,
            config,
            history,
            events,
        }
    }

    /// Run one sampling step
    pub async fn tick(&self) -> TickOutcome {
        if self.source.ready_state() < ReadyState::HaveCurrentData {
            return TickOutcome::NotReady;
        }
        let Some(decoder) = self.decoder.get() else {
            return TickOutcome::DecoderPending;
        };
        let Some(frame) = self.source.current_frame() else {
            return TickOutcome::NotReady;
        };
        let device_id = self.source.device_id();

        let region = self.config.crop.region(frame.width, frame.height);
        let Some(pixels) = extract_region(&frame, region) else {
            debug!(
                ?region,
                width = frame.width,
                height = frame.height,
                "Crop region outside frame"
            );
            return TickOutcome::NotReady;
        };

        let try_harder = self.config.try_harder;
        let hint = self.config.format_hint.clone();
        let decoded = tokio::task::spawn_blocking(move || {
            decoder.read_barcode(&pixels, region.width, region.height, try_harder, &hint)
        })
        .await;

        let barcode = match decoded {
            Ok(Ok(Some(barcode))) if !barcode.text.is_empty() => barcode,
            Ok(Ok(_)) => {
                trace!("No barcode in frame");
                return TickOutcome::NoResult;
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Decode failed");
                return TickOutcome::Failed;
            }
            Err(e) => {
                warn!(error = %e, "Decode task panicked");
                return TickOutcome::Failed;
            }
        };

        let record = ScanRecord::new(barcode, device_id);
        let surfaced = self
            .history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(record.clone(), Instant::now());

        if !surfaced {
            trace!(%record, "Repeated result");
            return TickOutcome::Duplicate;
        }

        info!(format = %record.format, text = %record.text, "Decoded barcode");
        // No subscribers is fine
        let _ = self.events.send(ScanEvent::Decoded(record.clone()));
        TickOutcome::Surfaced(record)
    }

    /// Tick until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        debug!("Decode loop started");
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.tick() => outcome,
            };

            let delay = match outcome {
                TickOutcome::NotReady => self.config.not_ready_retry(),
                _ => self.config.tick_interval(),
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        debug!("Decode loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_region_is_centred_band() {
        let region = CropConfig::default().region(1000, 1000);
        assert_eq!(
            region,
            CropRegion {
                x: 150,
                y: 350,
                width: 700,
                height: 300
            }
        );
    }

    #[test]
    fn test_region_clamps_fractions() {
        let crop = CropConfig {
            width_fraction: 1.5,
            band_fraction: -0.2,
        };
        let region = crop.region(640, 480);
        assert_eq!((region.x, region.width), (0, 640));
        assert_eq!((region.y, region.height), (239, 1));

        let nan = CropConfig {
            width_fraction: f64::NAN,
            band_fraction: 0.5,
        };
        assert_eq!(nan.region(10, 10).width, 10);
    }

    #[test]
    fn test_region_in_tiny_frame() {
        let region = CropConfig::default().region(1, 1);
        assert_eq!(
            region,
            CropRegion {
                x: 0,
                y: 0,
                width: 1,
                height: 1
            }
        );
    }

    #[test]
    fn test_extract_honours_stride() {
        // 3x2 frame, 2 bytes of padding per row
        let stride = 14;
        let mut data = vec![0u8; stride * 2];
        for y in 0..2 {
            for x in 0..3 {
                let i = y * stride + x * 4;
                data[i..i + 4].copy_from_slice(&[(y * 3 + x) as u8; 4]);
            }
        }
        let frame = CameraFrame {
            width: 3,
            height: 2,
            data: data.into(),
            stride: stride as u32,
            captured_at: std::time::Instant::now(),
        };

        let region = CropRegion {
            x: 1,
            y: 0,
            width: 2,
            height: 2,
        };
        let pixels = extract_region(&frame, region).unwrap();
        assert_eq!(pixels.len(), 16);
        assert_eq!(&pixels[0..4], &[1; 4]);
        assert_eq!(&pixels[4..8], &[2; 4]);
        assert_eq!(&pixels[8..12], &[4; 4]);
        assert_eq!(&pixels[12..16], &[5; 4]);
    }

    #[test]
    fn test_extract_rejects_out_of_bounds() {
        let frame = CameraFrame::from_rgba(4, 4, vec![0; 64]);
        let region = CropRegion {
            x: 2,
            y: 0,
            width: 3,
            height: 1,
        };
        assert!(extract_region(&frame, region).is_none());
    }

    #[test]
    fn test_sampler_config_durations() {
        let config = SamplerConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(16));
        assert_eq!(config.not_ready_retry(), Duration::from_millis(200));
        assert_eq!(config.dedup_window(), Duration::from_secs(2));
        assert_eq!(config.new_history().len(), 0);
    }
}
