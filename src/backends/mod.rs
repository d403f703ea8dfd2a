// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Scanner Layer                  │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │   Camera    │    │ Virtual Camera   │   │
//! │  │   (V4L2)    │    │ (scripted/file)  │   │
//! │  └─────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Platform traits, shared types and the V4L2 implementation
//! - [`virtual_camera`]: In-memory platform fed from still images

pub mod camera;
pub mod virtual_camera;

use camera::{BackendResult, CameraPlatform};
use std::path::Path;
use std::sync::Arc;

/// Open the platform to scan with
///
/// With an image path, a virtual rear camera showing that image is used
/// instead of real hardware.
pub fn open_platform(image: Option<&Path>) -> BackendResult<Arc<dyn CameraPlatform>> {
    match image {
        Some(path) => Ok(Arc::new(virtual_camera::VirtualPlatform::from_image(path)?)),
        None => Ok(Arc::from(camera::get_platform())),
    }
}
