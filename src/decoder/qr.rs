// SPDX-License-Identifier: GPL-3.0-only

//! QR code decoder backed by `rqrr`

use super::{BarcodeDecoder, BarcodeFormat, DecodedBarcode, check_rgba_buffer, parse_format_hint};
use crate::errors::DecodeError;
use std::time::Instant;
use tracing::{debug, trace};

/// QR decoder
///
/// Converts RGBA to luma and searches for grids. With `try_harder`, a
/// contrast-stretched copy is tried when the first pass finds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// ITU-R BT.601 luma
fn rgba_to_luma(pixels: &[u8]) -> Vec<u8> {
    pixels
        .chunks_exact(4)
        .map(|px| ((px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000) as u8)
        .collect()
}

/// Stretch luma to the full 0..=255 range
///
/// Returns `None` for flat images, where stretching cannot help.
fn stretch_contrast(luma: &[u8]) -> Option<Vec<u8>> {
    let min = *luma.iter().min()?;
    let max = *luma.iter().max()?;
    if max - min < 2 || (min == 0 && max == 255) {
        return None;
    }
    let span = (max - min) as u32;
    Some(
        luma.iter()
            .map(|&v| ((v - min) as u32 * 255 / span) as u8)
            .collect(),
    )
}

/// Run grid detection and decoding on a luma image
fn decode_luma(luma: &[u8], width: usize, height: usize) -> Result<Option<String>, DecodeError> {
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| luma[y * width + x]);
    let grids = prepared.detect_grids();
    trace!(grids = grids.len(), "QR grid detection complete");

    let mut last_error = None;
    for grid in grids {
        match grid.decode() {
            Ok((_meta, content)) => return Ok(Some(content)),
            Err(e) => {
                debug!(error = %e, "Failed to decode QR grid");
                last_error = Some(e.to_string());
            }
        }
    }

    match last_error {
        Some(msg) => Err(DecodeError::Failed(msg)),
        None => Ok(None),
    }
}

impl BarcodeDecoder for QrDecoder {
    fn read_barcode(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        try_harder: bool,
        hint: &str,
    ) -> Result<Option<DecodedBarcode>, DecodeError> {
        if !parse_format_hint(hint).contains(&BarcodeFormat::QrCode) {
            return Ok(None);
        }
        check_rgba_buffer(pixels, width, height)?;

        let start = Instant::now();
        let (w, h) = (width as usize, height as usize);
        let luma = rgba_to_luma(pixels);

        let mut outcome = decode_luma(&luma, w, h);
        if try_harder
            && !matches!(outcome, Ok(Some(_)))
            && let Some(stretched) = stretch_contrast(&luma)
        {
            trace!("Retrying QR decode with stretched contrast");
            outcome = decode_luma(&stretched, w, h);
        }

        let text = outcome?;
        trace!(
            width,
            height,
            found = text.is_some(),
            decode_ms = start.elapsed().as_millis() as u64,
            "QR decode pass"
        );

        Ok(text.map(|text| DecodedBarcode {
            text,
            format: BarcodeFormat::QrCode,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_weights() {
        let luma = rgba_to_luma(&[255, 255, 255, 255, 0, 0, 0, 255, 255, 0, 0, 255]);
        assert_eq!(luma, vec![255, 0, 76]);
    }

    #[test]
    fn test_stretch_contrast() {
        assert_eq!(stretch_contrast(&[100, 150, 200]), Some(vec![0, 127, 255]));
        assert_eq!(stretch_contrast(&[90, 90, 91]), None);
        assert_eq!(stretch_contrast(&[0, 255]), None);
    }

    #[test]
    fn test_blank_image_has_no_code() {
        let pixels = vec![200u8; 64 * 48 * 4];
        let result = QrDecoder::new().read_barcode(&pixels, 64, 48, true, "");
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn test_rejects_bad_buffer() {
        let result = QrDecoder::new().read_barcode(&[0; 10], 4, 4, false, "");
        assert!(matches!(result, Err(DecodeError::InvalidBuffer { .. })));
    }

    /// Version 1-M symbol, mask 0, holding `scanner-test-1`
    const SYMBOL: [&str; 21] = [
        "#######....##.#######",
        "#.....#.###...#.....#",
        "#.###.#..###..#.###.#",
        "#.###.#..#.##.#.###.#",
        "#.###.#.###.#.#.###.#",
        "#.....#...##..#.....#",
        "#######.#.#.#.#######",
        ".........#...........",
        "#.#.#.#..##.#...#..#.",
        "....##.#.#..#.####.##",
        "#...#####.#.###.##.##",
        "...#....#.#....##...#",
        "#.....##..##.#..#...#",
        "........#.###...##..#",
        "#######...#.#.#######",
        "#.....#....#.......##",
        "#.###.#.#.###..##..#.",
        "#.###.#.....#..##.##.",
        "#.###.#.#.#######...#",
        "#.....#...#.#..##..#.",
        "#######.##..##.#...##",
    ];

    /// Render the symbol in grey levels with a 4-module quiet zone
    fn render(dark: u8, light: u8, scale: usize) -> (Vec<u8>, u32) {
        let quiet = 4;
        let side = (SYMBOL.len() + 2 * quiet) * scale;
        let module = |p: usize| (p / scale).checked_sub(quiet);

        let mut pixels = Vec::with_capacity(side * side * 4);
        for y in 0..side {
            for x in 0..side {
                let is_dark = module(y)
                    .zip(module(x))
                    .and_then(|(row, col)| SYMBOL.get(row)?.as_bytes().get(col).copied())
                    == Some(b'#');
                let v = if is_dark { dark } else { light };
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }
        (pixels, side as u32)
    }

    fn expected() -> DecodedBarcode {
        DecodedBarcode {
            text: "scanner-test-1".to_string(),
            format: BarcodeFormat::QrCode,
        }
    }

    #[test]
    fn test_decodes_rendered_symbol() {
        let (pixels, side) = render(0, 255, 4);
        let decoder = QrDecoder::new();

        assert_eq!(decoder.read_barcode(&pixels, side, side, false, ""), Ok(Some(expected())));
        assert_eq!(
            decoder.read_barcode(&pixels, side, side, false, "QRCode|EAN-13"),
            Ok(Some(expected()))
        );
    }

    #[test]
    fn test_low_contrast_needs_try_harder() {
        // Dark modules sit above the binarisation threshold until stretched
        let (pixels, side) = render(116, 120, 4);
        let decoder = QrDecoder::new();

        assert_eq!(decoder.read_barcode(&pixels, side, side, false, ""), Ok(None));
        assert_eq!(decoder.read_barcode(&pixels, side, side, true, ""), Ok(Some(expected())));
    }

    #[test]
    fn test_hint_without_qr_skips_decode() {
        // Buffer size is never checked when the hint rules QR out
        let result = QrDecoder::new().read_barcode(&[0; 10], 4, 4, false, "EAN-13");
        assert_eq!(result, Ok(None));
    }
}
