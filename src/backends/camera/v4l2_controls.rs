// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 controls behind the track zoom, focus and torch capabilities
//!
//! [`DeviceControls`] keeps one file descriptor open for a device node and
//! wraps the raw `VIDIOC_*CTRL` ioctls. The typed helpers map controls onto
//! the capability model: `ZOOM_ABSOLUTE` becomes the zoom range,
//! `FOCUS_AUTO`/`FOCUS_ABSOLUTE`/`AUTO_FOCUS_START` the focus modes, and the
//! torch entry of the flash LED menu the torch flag.

use super::types::{BackendError, BackendResult, FocusMode, NumericRange};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use tracing::{debug, trace};

const CTRL_CLASS_CAMERA: u32 = 0x009a_0000;
const CTRL_CLASS_FLASH: u32 = 0x009c_0000;
const CAMERA_CLASS_BASE: u32 = CTRL_CLASS_CAMERA | 0x900;
const FLASH_CLASS_BASE: u32 = CTRL_CLASS_FLASH | 0x900;

/// Manual focus position
pub const CID_FOCUS_ABSOLUTE: u32 = CAMERA_CLASS_BASE + 10;
/// Continuous autofocus on/off
pub const CID_FOCUS_AUTO: u32 = CAMERA_CLASS_BASE + 12;
/// Optical/digital zoom position
pub const CID_ZOOM_ABSOLUTE: u32 = CAMERA_CLASS_BASE + 13;
/// One-shot autofocus trigger
pub const CID_AUTO_FOCUS_START: u32 = CAMERA_CLASS_BASE + 28;
/// Flash LED mode menu
pub const CID_FLASH_LED_MODE: u32 = FLASH_CLASS_BASE + 1;

/// Flash LED menu entries
pub const FLASH_LED_MODE_NONE: i32 = 0;
pub const FLASH_LED_MODE_TORCH: i32 = 2;

const CTRL_TYPE_MENU: u32 = 3;
const CTRL_FLAG_DISABLED: u32 = 0x0001;

// _IOWR('V', nr, size)
const VIDIOC_G_CTRL: libc::c_ulong = 0xC008_561B;
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008_561C;
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC044_5624;
const VIDIOC_QUERYMENU: libc::c_ulong = 0xC02C_5625;

#[repr(C)]
#[derive(Default)]
struct RawControl {
    id: u32,
    value: i32,
}

#[repr(C)]
#[derive(Default)]
struct RawQueryCtrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

#[repr(C, packed)]
#[derive(Default)]
struct RawQueryMenu {
    id: u32,
    index: u32,
    name: [u8; 32],
    reserved: u32,
}

/// Range and type of an enabled control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRange {
    pub minimum: i32,
    pub maximum: i32,
    pub is_menu: bool,
}

/// Open control handle for one device node
#[derive(Debug)]
pub struct DeviceControls {
    path: String,
    file: File,
}

impl DeviceControls {
    pub fn open(path: &str) -> BackendResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| BackendError::from_io(path, &e))?;
        Ok(Self {
            path: path.to_string(),
            file,
        })
    }

    /// Issue an ioctl, retrying when interrupted
    fn ioctl<T>(&self, request: libc::c_ulong, arg: &mut T) -> io::Result<()> {
        loop {
            // SAFETY: `arg` is a live, correctly sized #[repr(C)] struct for `request`
            let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, arg as *mut T) };
            if ret >= 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Range of an enabled control, `None` if missing or disabled
    pub fn range(&self, id: u32) -> Option<ControlRange> {
        let mut query = RawQueryCtrl {
            id,
            ..Default::default()
        };
        self.ioctl(VIDIOC_QUERYCTRL, &mut query).ok()?;
        if query.flags & CTRL_FLAG_DISABLED != 0 {
            trace!(path = %self.path, id, "Control disabled");
            return None;
        }
        Some(ControlRange {
            minimum: query.minimum,
            maximum: query.maximum,
            is_menu: query.ctrl_type == CTRL_TYPE_MENU,
        })
    }

    pub fn get(&self, id: u32) -> Option<i32> {
        let mut control = RawControl { id, value: 0 };
        match self.ioctl(VIDIOC_G_CTRL, &mut control) {
            Ok(()) => Some(control.value),
            Err(e) => {
                trace!(path = %self.path, id, error = %e, "Failed to read control");
                None
            }
        }
    }

    pub fn set(&self, id: u32, value: i32) -> BackendResult<()> {
        let mut control = RawControl { id, value };
        self.ioctl(VIDIOC_S_CTRL, &mut control).map_err(|e| {
            BackendError::ControlFailed(format!(
                "{}: control {:#x} = {}: {}",
                self.path, id, value, e
            ))
        })?;
        if control.value != value {
            debug!(
                path = %self.path,
                id,
                requested = value,
                actual = control.value,
                "Control value clamped"
            );
        }
        Ok(())
    }

    /// Whether a menu control offers the given entry
    pub fn has_menu_entry(&self, id: u32, index: i32) -> bool {
        let Ok(index) = u32::try_from(index) else {
            return false;
        };
        let mut query = RawQueryMenu {
            id,
            index,
            ..Default::default()
        };
        self.ioctl(VIDIOC_QUERYMENU, &mut query).is_ok()
    }

    pub fn zoom_range(&self) -> Option<NumericRange> {
        self.range(CID_ZOOM_ABSOLUTE)
            .map(|r| NumericRange::new(r.minimum as f64, r.maximum as f64))
    }

    /// Focus modes the device can be put in
    pub fn focus_modes(&self) -> Vec<FocusMode> {
        [
            (CID_FOCUS_ABSOLUTE, FocusMode::Manual),
            (CID_AUTO_FOCUS_START, FocusMode::SingleShot),
            (CID_FOCUS_AUTO, FocusMode::Continuous),
        ]
        .into_iter()
        .filter(|(id, _)| self.range(*id).is_some())
        .map(|(_, mode)| mode)
        .collect()
    }

    /// Whether the flash LED has a torch mode
    pub fn supports_torch(&self) -> bool {
        self.range(CID_FLASH_LED_MODE).is_some_and(|r| {
            r.is_menu
                && r.maximum >= FLASH_LED_MODE_TORCH
                && self.has_menu_entry(CID_FLASH_LED_MODE, FLASH_LED_MODE_TORCH)
        })
    }

    /// Current focus mode, from the autofocus switch
    pub fn focus_mode(&self) -> Option<FocusMode> {
        self.get(CID_FOCUS_AUTO).map(|on| {
            if on != 0 {
                FocusMode::Continuous
            } else {
                FocusMode::Manual
            }
        })
    }

    pub fn torch(&self) -> Option<bool> {
        self.get(CID_FLASH_LED_MODE).map(|mode| mode == FLASH_LED_MODE_TORCH)
    }

    pub fn set_torch(&self, on: bool) -> BackendResult<()> {
        let mode = if on {
            FLASH_LED_MODE_TORCH
        } else {
            FLASH_LED_MODE_NONE
        };
        self.set(CID_FLASH_LED_MODE, mode)
    }
}
