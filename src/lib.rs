// SPDX-License-Identifier: MPL-2.0

//! Barcode Scanner - camera barcode scanning with automatic rear-camera
//! selection
//!
//! This library picks the best rear camera by probing every candidate,
//! samples frames from it, and hands a cropped band of each frame to a
//! barcode decoder.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera platform abstraction (V4L2 and virtual cameras)
//! - [`decoder`]: Barcode decoder seam and the QR implementation
//! - [`scanner`]: Camera selection, decode loop, history and session
//! - [`config`]: User configuration handling
//! - [`terminal`]: Terminal user interface
//!
//! # Example
//!
//! ```ignore
//! let platform = barcode_scanner::backends::open_platform(None)?;
//! let mut session = ScanSession::new(platform, load_default_decoder(), Config::load()?);
//! let selection = session.start().await?;
//! let mut events = session.subscribe();
//! while let Ok(ScanEvent::Decoded(record)) = events.recv().await {
//!     println!("{}", record);
//! }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod errors;
pub mod scanner;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use decoder::{
    BarcodeDecoder, BarcodeFormat, DecodedBarcode, DecoderHandle, load_default_decoder,
};
pub use errors::{DecodeError, ScanError, ScanResult};
pub use scanner::{CameraSelection, ScanEvent, ScanRecord, ScanSession, SessionSnapshot};
