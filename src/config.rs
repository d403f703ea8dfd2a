// SPDX-License-Identifier: GPL-3.0-only

use crate::errors::{ScanError, ScanResult};
use crate::scanner::{SamplerConfig, SelectorConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory name under the user config dir
const CONFIG_DIR: &str = "barcode-scanner";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Last camera picked manually
    pub last_device_id: Option<String>,
    /// Rear-camera selection settings
    pub selector: SelectorConfig,
    /// Decode loop settings
    pub sampler: SamplerConfig,
    /// Initial zoom as a fraction of the camera's maximum zoom (disabled when unset)
    pub zoom_fraction: Option<f64>,
    /// Turn the torch on when the selected camera has one
    pub enable_torch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_device_id: None,
            selector: SelectorConfig::default(),
            sampler: SamplerConfig::default(),
            zoom_fraction: None,
            enable_torch: false, // Torch stays off unless asked for
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> ScanResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from a file; a missing file yields defaults
    pub fn load_from(path: &Path) -> ScanResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ScanError::Config(format!("{}: {}", path.display(), e)));
            }
        };

        let config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> ScanResult<()> {
        let path = Self::default_path()
            .ok_or_else(|| ScanError::Config("No config directory available".to_string()))?;
        self.save_to(&path)
    }

    /// Save to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> ScanResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScanError::Config(format!("{}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| ScanError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }
}
