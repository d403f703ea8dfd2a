// SPDX-License-Identifier: MPL-2.0

//! Shared fixtures for integration tests

#![allow(dead_code)]

use barcode_scanner::backends::virtual_camera::{VirtualDevice, VirtualPlatform};
use barcode_scanner::{BarcodeDecoder, BarcodeFormat, DecodeError, DecodedBarcode};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

type Reply = Result<Option<DecodedBarcode>, DecodeError>;

/// Decoder that replays a script, then keeps returning a fallback reply
pub struct ScriptedDecoder {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: AtomicUsize,
    last_input: Mutex<Option<(usize, u32, u32)>>,
}

impl ScriptedDecoder {
    pub fn new(script: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Ok(None),
            calls: AtomicUsize::new(0),
            last_input: Mutex::new(None),
        }
    }

    /// Decoder that finds the same QR code in every frame
    pub fn always(text: &str) -> Self {
        Self {
            fallback: Ok(Some(qr(text))),
            ..Self::new(vec![])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Buffer length, width and height of the last call
    pub fn last_input(&self) -> Option<(usize, u32, u32)> {
        *self.last_input.lock().unwrap()
    }
}

impl BarcodeDecoder for ScriptedDecoder {
    fn read_barcode(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        _try_harder: bool,
        _hint: &str,
    ) -> Result<Option<DecodedBarcode>, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some((pixels.len(), width, height));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn qr(text: &str) -> DecodedBarcode {
    DecodedBarcode {
        text: text.to_string(),
        format: BarcodeFormat::QrCode,
    }
}

/// Phone-like camera set: two front, three rear
pub fn phone() -> VirtualPlatform {
    VirtualPlatform::new(vec![
        VirtualDevice::camera("front0", "Front Camera").with_resolution(3264, 2448),
        VirtualDevice::camera("wide", "Back Wide Camera")
            .with_resolution(4000, 3000)
            .with_continuous_focus()
            .with_zoom(4.0)
            .with_torch(),
        VirtualDevice::camera("tele", "Back Telephoto Camera")
            .with_resolution(2000, 1500)
            .with_zoom(5.0),
        VirtualDevice::camera("macro", "Back Macro Camera").with_resolution(1600, 1200),
        VirtualDevice::microphone("mic", "Bottom Microphone"),
    ])
}
