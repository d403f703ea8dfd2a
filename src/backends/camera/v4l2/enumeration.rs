// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 device enumeration and capability discovery

use crate::backends::camera::types::{
    BackendError, BackendResult, MediaDeviceInfo, MediaDeviceKind, NumericRange,
    StreamConstraints, TrackCapabilities,
};
use crate::backends::camera::v4l2_controls::DeviceControls;
use crate::backends::camera::v4l2_utils;
use tracing::{debug, info};
use v4l::FourCC;
use v4l::prelude::*;
use v4l::video::Capture;

/// Capture formats the converters understand, in order of preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureFormat {
    Yuyv,
    Mjpeg,
    Uyvy,
}

impl CaptureFormat {
    pub const ALL: [CaptureFormat; 3] =
        [CaptureFormat::Yuyv, CaptureFormat::Mjpeg, CaptureFormat::Uyvy];

    pub fn fourcc(&self) -> FourCC {
        match self {
            CaptureFormat::Yuyv => FourCC::new(b"YUYV"),
            CaptureFormat::Mjpeg => FourCC::new(b"MJPG"),
            CaptureFormat::Uyvy => FourCC::new(b"UYVY"),
        }
    }

    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.fourcc() == fourcc)
    }

    /// Lower is preferred
    fn rank(&self) -> usize {
        Self::ALL.iter().position(|f| f == self).unwrap_or(usize::MAX)
    }
}

/// A frame size a device can deliver in a given format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSizeOption {
    pub format: CaptureFormat,
    pub width: u32,
    pub height: u32,
}

/// Common sizes tried inside stepwise ranges
const STEPWISE_SIZES: [(u32, u32); 4] = [(640, 480), (1280, 720), (1920, 1080), (3840, 2160)];

/// Enumerate V4L2 video capture nodes
///
/// Fails with `PermissionDenied` only when nodes exist but none could be
/// opened.
pub fn enumerate_capture_devices() -> BackendResult<Vec<MediaDeviceInfo>> {
    let nodes = v4l2_utils::list_video_nodes();
    let mut devices = Vec::new();
    let mut denied = 0usize;

    for node in &nodes {
        let path = node.to_string_lossy().to_string();

        if let Err(e) = std::fs::File::open(node)
            && e.kind() == std::io::ErrorKind::PermissionDenied
        {
            denied += 1;
            continue;
        }

        let Some(info) = v4l2_utils::query_device_info(&path) else {
            continue;
        };
        if !info.is_capture {
            debug!(path = %path, "Skipping non-capture video node");
            continue;
        }

        let label = v4l2_utils::device_label(&info, v4l2_utils::camera_location(&path));
        devices.push(MediaDeviceInfo {
            device_id: path,
            label,
            kind: MediaDeviceKind::VideoInput,
        });
    }

    if devices.is_empty() && denied > 0 {
        return Err(BackendError::PermissionDenied);
    }

    info!(count = devices.len(), "Enumerated V4L2 capture devices");
    Ok(devices)
}

/// List frame sizes for every supported capture format
pub fn supported_frame_sizes(dev: &Device) -> Vec<FrameSizeOption> {
    let mut options = Vec::new();

    let Ok(formats) = dev.enum_formats() else {
        return options;
    };

    for desc in formats {
        let Some(format) = CaptureFormat::from_fourcc(desc.fourcc) else {
            continue;
        };
        let Ok(sizes) = dev.enum_framesizes(desc.fourcc) else {
            continue;
        };

        for size in sizes {
            match size.size {
                v4l::framesize::FrameSizeEnum::Discrete(discrete) => {
                    options.push(FrameSizeOption {
                        format,
                        width: discrete.width,
                        height: discrete.height,
                    });
                }
                v4l::framesize::FrameSizeEnum::Stepwise(step) => {
                    let in_range = |w: u32, h: u32| {
                        w >= step.min_width
                            && w <= step.max_width
                            && h >= step.min_height
                            && h <= step.max_height
                    };
                    for (w, h) in STEPWISE_SIZES {
                        if in_range(w, h) {
                            options.push(FrameSizeOption {
                                format,
                                width: w,
                                height: h,
                            });
                        }
                    }
                    options.push(FrameSizeOption {
                        format,
                        width: step.max_width,
                        height: step.max_height,
                    });
                }
            }
        }
    }

    options
}

/// Pick the frame size that best satisfies the constraints
///
/// Hard `min`/`max` bounds filter; the option closest to the `ideal` values
/// wins, or the largest one when no ideal is given. Ties go to the preferred
/// capture format.
pub fn choose_frame_size(
    options: &[FrameSizeOption],
    constraints: &StreamConstraints,
) -> Option<FrameSizeOption> {
    let width = constraints.width.unwrap_or_default();
    let height = constraints.height.unwrap_or_default();

    options
        .iter()
        .filter(|o| width.accepts(o.width) && height.accepts(o.height))
        .min_by_key(|o| {
            let distance = match (width.ideal, height.ideal) {
                (None, None) => u64::MAX - (o.width as u64 * o.height as u64),
                (w, h) => {
                    w.map_or(0, |w| o.width.abs_diff(w) as u64)
                        + h.map_or(0, |h| o.height.abs_diff(h) as u64)
                }
            };
            (distance, o.format.rank())
        })
        .copied()
}

/// Read track capabilities from frame sizes and V4L2 controls
///
/// A node whose controls cannot be opened reports resolution only.
pub fn read_capabilities(device_path: &str, sizes: &[FrameSizeOption]) -> TrackCapabilities {
    let range = |values: Vec<u32>| -> Option<NumericRange> {
        let min = values.iter().copied().min()?;
        let max = values.iter().copied().max()?;
        Some(NumericRange::new(min as f64, max as f64))
    };

    let mut capabilities = TrackCapabilities {
        width: range(sizes.iter().map(|s| s.width).collect()),
        height: range(sizes.iter().map(|s| s.height).collect()),
        ..Default::default()
    };

    match DeviceControls::open(device_path) {
        Ok(controls) => {
            capabilities.zoom = controls.zoom_range();
            capabilities.focus_modes = controls.focus_modes();
            capabilities.torch = controls.supports_torch();
        }
        Err(e) => debug!(device_path, error = %e, "No control access, reporting resolution only"),
    }

    debug!(device_path, ?capabilities, "Read V4L2 capabilities");
    capabilities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::ConstrainValue;

    fn opt(format: CaptureFormat, width: u32, height: u32) -> FrameSizeOption {
        FrameSizeOption {
            format,
            width,
            height,
        }
    }

    fn sizes() -> Vec<FrameSizeOption> {
        vec![
            opt(CaptureFormat::Mjpeg, 1920, 1080),
            opt(CaptureFormat::Yuyv, 640, 480),
            opt(CaptureFormat::Mjpeg, 640, 480),
            opt(CaptureFormat::Yuyv, 1280, 720),
        ]
    }

    #[test]
    fn test_choose_closest_to_ideal() {
        let constraints = StreamConstraints::probe("/dev/video0");
        let chosen = choose_frame_size(&sizes(), &constraints).unwrap();
        // 640x480 exists in both formats; YUYV is preferred
        assert_eq!(chosen, opt(CaptureFormat::Yuyv, 640, 480));
    }

    #[test]
    fn test_choose_largest_without_ideal() {
        let constraints = StreamConstraints::exact_device("/dev/video0");
        let chosen = choose_frame_size(&sizes(), &constraints).unwrap();
        assert_eq!(chosen, opt(CaptureFormat::Mjpeg, 1920, 1080));
    }

    #[test]
    fn test_choose_respects_bounds() {
        let constraints = StreamConstraints {
            width: Some(ConstrainValue::range(1400, 1920, 2160)),
            height: Some(ConstrainValue::range(900, 1080, 1440)),
            ..Default::default()
        };
        let chosen = choose_frame_size(&sizes(), &constraints).unwrap();
        assert_eq!(chosen, opt(CaptureFormat::Mjpeg, 1920, 1080));

        let impossible = StreamConstraints {
            width: Some(ConstrainValue::range(4000, 4000, 5000)),
            ..Default::default()
        };
        assert!(choose_frame_size(&sizes(), &impossible).is_none());
    }

    #[test]
    fn test_fourcc_round_trip() {
        for format in CaptureFormat::ALL {
            assert_eq!(CaptureFormat::from_fourcc(format.fourcc()), Some(format));
        }
        assert_eq!(CaptureFormat::from_fourcc(FourCC::new(b"Y10B")), None);
    }
}
