// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion for V4L2 capture buffers
//!
//! Everything downstream of capture works on RGBA, so each raw buffer is
//! converted once on the capture thread.

/// Byte order of a packed YUV 4:2:2 buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packed422 {
    /// Y0 U Y1 V
    Yuyv,
    /// U Y0 V Y1
    Uyvy,
}

/// Convert packed YUV 4:2:2 to RGBA
///
/// Each 4-byte group encodes 2 pixels. Uses BT.601 coefficients.
/// Output is always `width * height * 4` bytes; a short input leaves the
/// remaining pixels black.
pub fn packed422_to_rgba(data: &[u8], width: u32, height: u32, order: Packed422) -> Vec<u8> {
    let pixel_count = (width * height) as usize;
    let mut rgba = Vec::with_capacity(pixel_count * 4);

    for chunk in data.chunks_exact(4) {
        let (y0, u, y1, v) = match order {
            Packed422::Yuyv => (chunk[0], chunk[1], chunk[2], chunk[3]),
            Packed422::Uyvy => (chunk[1], chunk[0], chunk[3], chunk[2]),
        };
        let u = u as f32 - 128.0;
        let v = v as f32 - 128.0;

        for y in [y0 as f32, y1 as f32] {
            if rgba.len() >= pixel_count * 4 {
                break;
            }
            let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
    }

    rgba.resize(pixel_count * 4, 0);
    rgba
}

/// Decode an MJPEG buffer to RGBA
///
/// Returns the decoded dimensions along with the pixels, since the JPEG
/// header is authoritative over the negotiated format.
pub fn mjpeg_to_rgba(data: &[u8]) -> Result<(u32, u32, Vec<u8>), String> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
        .map_err(|e| format!("Failed to decode MJPEG frame: {}", e))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok((width, height, rgba.into_raw()))
}
