// SPDX-License-Identifier: GPL-3.0-only

//! Camera selection, frame sampling and session management
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  candidates  ┌────────────┐  exact device  ┌──────────────┐
//! │ enumeration│ ───────────► │  selector  │ ─────────────► │ ActiveSource │
//! └────────────┘              └────────────┘                └──────┬───────┘
//!                                                                  │ frames
//!                                   ┌──────────────┐               ▼
//!                   ScanEvent ◄──── │ ScanHistory  │ ◄──── ┌──────────────┐
//!                                   └──────────────┘       │  DecodeLoop  │
//!                                                          └──────────────┘
//! ```
//!
//! [`ScanSession`] wires these together and is the only type the UI layers
//! talk to.

pub mod enumeration;
pub mod history;
pub mod sampler;
pub mod selector;
pub mod session;
pub mod source;

pub use enumeration::{enumerate_rear_cameras, enumerate_video_inputs};
pub use history::{ScanHistory, ScanRecord};
pub use sampler::{
    CropConfig, CropRegion, DecodeLoop, SamplerConfig, ScanEvent, TickOutcome, extract_region,
};
pub use selector::{
    CameraScore, CameraSelection, ScoreWeights, SelectorConfig, label_matches, score_camera,
    select_best_rear_camera,
};
pub use session::{ScanSession, SessionSnapshot};
pub use source::ActiveSource;
