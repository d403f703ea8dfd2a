// SPDX-License-Identifier: GPL-3.0-only

//! Still-image frame sources for the virtual camera

use crate::backends::camera::types::{BackendError, BackendResult, CameraFrame};
use std::path::Path;
use tracing::info;

/// Load an image file as a single RGBA frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();

    info!(width, height, "Image loaded successfully");
    Ok(CameraFrame::from_rgba(width, height, rgba.into_raw()))
}

/// Uniform grey frame, used when a device has no image attached
pub fn grey_frame(width: u32, height: u32, level: u8) -> CameraFrame {
    let mut data = vec![level; (width * height * 4) as usize];
    for alpha in data.iter_mut().skip(3).step_by(4) {
        *alpha = 255;
    }
    CameraFrame::from_rgba(width, height, data)
}

/// Frame with extra padding bytes at the end of every row
///
/// Mirrors what hardware with aligned buffers hands out.
pub fn padded_frame(frame: &CameraFrame, padding: u32) -> CameraFrame {
    let row = (frame.width * 4) as usize;
    let stride = row + padding as usize;
    let mut data = vec![0u8; stride * frame.height as usize];

    for y in 0..frame.height as usize {
        let src = y * frame.stride as usize;
        data[y * stride..y * stride + row].copy_from_slice(&frame.data[src..src + row]);
    }

    CameraFrame {
        width: frame.width,
        height: frame.height,
        data: data.into(),
        stride: stride as u32,
        captured_at: frame.captured_at,
    }
}
