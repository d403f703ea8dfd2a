// SPDX-License-Identifier: GPL-3.0-only

//! Barcode decoder seam
//!
//! Symbol detection and decoding live behind [`BarcodeDecoder`]. The scanner
//! only hands over tightly packed RGBA pixels and reads back text plus a
//! format tag. [`DecoderHandle`] models a decoder that loads asynchronously
//! and may not be ready when scanning starts.

mod qr;

pub use qr::QrDecoder;

use crate::errors::DecodeError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Symbologies the scanner reads
///
/// Only QR codes are decoded. Hints naming other symbologies select nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarcodeFormat {
    #[serde(rename = "QRCode")]
    QrCode,
}

impl BarcodeFormat {
    pub const ALL: [BarcodeFormat; 1] = [BarcodeFormat::QrCode];

    pub fn name(&self) -> &'static str {
        match self {
            BarcodeFormat::QrCode => "QRCode",
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BarcodeFormat {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_', ' '], "").to_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name().to_lowercase() == wanted)
            .ok_or_else(|| DecodeError::Failed(format!("unsupported barcode format '{}'", s)))
    }
}

/// Parse a format hint such as `"QRCode"` or `"QRCode|EAN-13"`
///
/// A blank hint means every supported format. Names the scanner cannot
/// read are dropped, so a hint listing only those selects nothing.
pub fn parse_format_hint(hint: &str) -> Vec<BarcodeFormat> {
    let names: Vec<&str> = hint
        .split(['|', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if names.is_empty() {
        return BarcodeFormat::ALL.to_vec();
    }

    let mut formats: Vec<BarcodeFormat> = Vec::new();
    for name in names {
        match name.parse::<BarcodeFormat>() {
            Ok(format) if !formats.contains(&format) => formats.push(format),
            Ok(_) => {}
            Err(_) => debug!(name, "Ignoring unsupported format in hint"),
        }
    }
    formats
}

/// Text and format of one decoded symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedBarcode {
    pub text: String,
    pub format: BarcodeFormat,
}

/// Opaque barcode decoder
pub trait BarcodeDecoder: Send + Sync {
    /// Decode one symbol from tightly packed RGBA pixels
    ///
    /// `Ok(None)` means nothing was found in this image.
    fn read_barcode(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        try_harder: bool,
        hint: &str,
    ) -> Result<Option<DecodedBarcode>, DecodeError>;
}

/// Check that a pixel buffer holds `width * height` RGBA pixels
pub fn check_rgba_buffer(pixels: &[u8], width: u32, height: u32) -> Result<(), DecodeError> {
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected || expected == 0 {
        return Err(DecodeError::InvalidBuffer {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

/// Future that produces a decoder
pub type DecoderLoader = BoxFuture<'static, Result<Arc<dyn BarcodeDecoder>, DecodeError>>;

/// Shared, load-once decoder slot
///
/// Clones share the same slot. `get` returns `None` until loading finishes.
#[derive(Clone, Default)]
pub struct DecoderHandle {
    slot: Arc<OnceLock<Arc<dyn BarcodeDecoder>>>,
}

impl DecoderHandle {
    /// Handle with no decoder yet
    pub fn empty() -> Self {
        Self::default()
    }

    /// Handle with a decoder already available
    pub fn ready(decoder: Arc<dyn BarcodeDecoder>) -> Self {
        let handle = Self::empty();
        handle.set(decoder);
        handle
    }

    /// Start loading a decoder on the current tokio runtime
    pub fn loading(loader: DecoderLoader) -> Self {
        let handle = Self::empty();
        let slot = handle.clone();
        tokio::spawn(async move {
            match loader.await {
                Ok(decoder) => {
                    slot.set(decoder);
                    info!("Barcode decoder loaded");
                }
                Err(e) => warn!(error = %e, "Barcode decoder failed to load"),
            }
        });
        handle
    }

    /// Install the decoder; returns false if one was already set
    pub fn set(&self, decoder: Arc<dyn BarcodeDecoder>) -> bool {
        self.slot.set(decoder).is_ok()
    }

    pub fn get(&self) -> Option<Arc<dyn BarcodeDecoder>> {
        self.slot.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.get().is_some()
    }
}

/// Start loading the default (QR) decoder
///
/// Must be called from within a tokio runtime.
pub fn load_default_decoder() -> DecoderHandle {
    DecoderHandle::loading(Box::pin(async {
        Ok(Arc::new(QrDecoder::new()) as Arc<dyn BarcodeDecoder>)
    }))
}

impl fmt::Debug for DecoderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderHandle")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
