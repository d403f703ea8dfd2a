// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Camera selection constants
pub mod selection {
    use super::Duration;

    /// Wait after activating a camera before trusting its reported settings
    pub const PROBE_SETTLE: Duration = Duration::from_millis(300);

    /// Resolution hint used while probing (width)
    pub const PROBE_WIDTH: u32 = 640;

    /// Resolution hint used while probing (height)
    pub const PROBE_HEIGHT: u32 = 480;

    /// Frame rate hint used while probing
    pub const PROBE_FRAME_RATE: u32 = 15;

    /// Points per megapixel of maximum resolution
    pub const RESOLUTION_WEIGHT: f64 = 1.0;

    /// Points per unit of maximum zoom
    pub const ZOOM_WEIGHT: f64 = 0.5;

    /// Bonus for continuous autofocus support
    pub const CONTINUOUS_FOCUS_BONUS: f64 = 2.0;

    /// Bonus for torch support
    pub const TORCH_BONUS: f64 = 0.5;

    /// Bonus for a wide-angle label
    pub const WIDE_LABEL_BONUS: f64 = 0.5;

    /// Bonus for a telephoto label
    pub const TELE_LABEL_BONUS: f64 = 0.3;

    /// Penalty for macro or depth labels
    pub const MACRO_DEPTH_PENALTY: f64 = 1.0;

    /// Label keywords that earn the wide bonus
    pub const WIDE_KEYWORDS: [&str; 1] = ["wide"];

    /// Label keywords that earn the tele bonus
    pub const TELE_KEYWORDS: [&str; 1] = ["tele"];

    /// Label keywords that earn the macro/depth penalty
    pub const MACRO_DEPTH_KEYWORDS: [&str; 2] = ["macro", "depth"];

    /// Label keywords that mark a device as rear-facing during enumeration
    pub const REAR_KEYWORDS: [&str; 5] = ["back", "rear", "environment", "wide", "tele"];
}

/// Frame sampling constants
pub mod sampling {
    use super::Duration;

    /// Delay between decode ticks (one display refresh at 60 Hz)
    pub const TICK_INTERVAL: Duration = Duration::from_millis(16);

    /// Delay before re-checking a video source that is not ready yet
    pub const NOT_READY_RETRY: Duration = Duration::from_millis(200);

    /// Fraction of the frame width kept by the horizontal inset crop
    pub const CROP_WIDTH_FRACTION: f64 = 0.7;

    /// Fraction of the frame height kept by the centred band crop
    pub const CROP_BAND_FRACTION: f64 = 0.3;

    /// Window in which a repeat of the latest result is suppressed
    pub const DEDUP_WINDOW: Duration = Duration::from_secs(2);

    /// Maximum number of entries kept in the result history
    pub const HISTORY_LIMIT: usize = 50;

    /// Capacity of the scan event broadcast channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 64;
}

/// V4L2 capture constants
pub mod capture {
    /// Number of mmap buffers requested per stream
    pub const BUFFER_COUNT: u32 = 4;

    /// Highest /dev/videoN index scanned during enumeration
    pub const MAX_DEVICE_INDEX: usize = 64;

    /// Frame rate used when a constraint set gives no hint
    pub const DEFAULT_FRAME_RATE: u32 = 30;
}
