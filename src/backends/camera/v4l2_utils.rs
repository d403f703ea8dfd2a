// SPDX-License-Identifier: GPL-3.0-only

//! Shared V4L2 utility functions

use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use tracing::debug;

/// VIDIOC_QUERYCAP ioctl number
const VIDIOC_QUERYCAP: libc::c_ulong = 0x80685600;

/// V4L2 capability flag for single-planar video capture
const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x00000001;
/// Set when `device_caps` is filled in
const V4L2_CAP_DEVICE_CAPS: u32 = 0x80000000;

/// V4L2 capability structure for VIDIOC_QUERYCAP ioctl
#[repr(C)]
struct V4l2Capability {
    driver: [u8; 16],
    card: [u8; 32],
    bus_info: [u8; 32],
    version: u32,
    capabilities: u32,
    device_caps: u32,
    reserved: [u32; 3],
}

/// Identity of a V4L2 video node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct V4l2DeviceInfo {
    /// Device path (e.g., /dev/video0)
    pub path: String,
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Bus the device hangs off (e.g., usb-0000:00:14.0-1)
    pub bus_info: String,
    /// Whether the node can capture video (metadata nodes cannot)
    pub is_capture: bool,
}

fn query_v4l2_cap(fd: RawFd) -> Option<V4l2Capability> {
    let mut cap: V4l2Capability = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCAP as _, &mut cap as *mut V4l2Capability) };
    if result < 0 { None } else { Some(cap) }
}

fn c_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).trim().to_string()
}

/// Query identity and capture capability of a video node
pub fn query_device_info(device_path: &str) -> Option<V4l2DeviceInfo> {
    let file = std::fs::File::open(device_path).ok()?;
    let cap = query_v4l2_cap(file.as_raw_fd())?;

    // Use device_caps if available, otherwise capabilities
    let caps = if cap.capabilities & V4L2_CAP_DEVICE_CAPS != 0 {
        cap.device_caps
    } else {
        cap.capabilities
    };

    let info = V4l2DeviceInfo {
        path: device_path.to_string(),
        card: c_string(&cap.card),
        driver: c_string(&cap.driver),
        bus_info: c_string(&cap.bus_info),
        is_capture: caps & V4L2_CAP_VIDEO_CAPTURE != 0,
    };

    debug!(
        device_path,
        card = %info.card,
        driver = %info.driver,
        is_capture = info.is_capture,
        "Queried V4L2 device"
    );
    Some(info)
}

/// List /dev/video* nodes, sorted by index
pub fn list_video_nodes() -> Vec<PathBuf> {
    let mut nodes: Vec<(usize, PathBuf)> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let index = name.to_str()?.strip_prefix("video")?.parse::<usize>().ok()?;
            Some((index, entry.path()))
        })
        .filter(|(index, _)| *index <= crate::constants::capture::MAX_DEVICE_INDEX)
        .collect();

    nodes.sort_by_key(|(index, _)| *index);
    nodes.into_iter().map(|(_, path)| path).collect()
}

/// Build the label reported for a device
///
/// Sensors on phones and SBCs report their role in the card name (e.g.
/// "Back Camera", "rear-wide"); a location exported by the media controller
/// is appended when the card does not already mention it.
pub fn device_label(info: &V4l2DeviceInfo, location: Option<&str>) -> String {
    match location {
        Some(loc) if !info.card.to_lowercase().contains(&loc.to_lowercase()) => {
            format!("{} ({})", info.card, loc)
        }
        _ => info.card.clone(),
    }
}

/// Read the camera location from sysfs, if the driver exports it
///
/// Mobile sensors often expose `back`/`front` through the
/// `device/of_node/orientation` property (0 = front, 1 = back, 2 = external).
pub fn camera_location(device_path: &str) -> Option<&'static str> {
    let node = std::path::Path::new(device_path).file_name()?.to_str()?;
    let raw = std::fs::read(format!(
        "/sys/class/video4linux/{}/device/of_node/orientation",
        node
    ))
    .ok()?;

    let value = match raw.as_slice() {
        [a, b, c, d] => u32::from_be_bytes([*a, *b, *c, *d]),
        _ => return None,
    };

    match value {
        0 => Some("front"),
        1 => Some("back"),
        2 => Some("external"),
        _ => None,
    }
}
