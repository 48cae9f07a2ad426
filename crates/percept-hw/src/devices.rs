//! Device enumeration and facing-mode resolution.
//!
//! A facing mode maps to a concrete `/dev/videoN` path either through
//! an explicit TOML map or, absent one, through enumeration order:
//! the first capture device is treated as the user-facing camera, the
//! second as the environment-facing one.

use crate::facing::FacingMode;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use v4l::device::Device;

#[derive(Error, Debug)]
pub enum DeviceMapError {
    #[error("device map not found: {0}")]
    NotFound(String),
    #[error("device map unreadable: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("bad device map TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// One `[[camera]]` entry of a device map file.
#[derive(Debug, Clone, Deserialize)]
struct CameraEntry {
    facing: FacingMode,
    device: String,
}

/// Top-level device map file structure.
#[derive(Debug, Clone, Deserialize)]
struct DeviceMapFile {
    #[serde(default)]
    camera: Vec<CameraEntry>,
}

/// Facing-mode → device-path resolution.
#[derive(Debug, Clone, Default)]
pub struct DeviceMap {
    entries: Vec<(FacingMode, String)>,
}

impl DeviceMap {
    /// Load an explicit map from a TOML file:
    ///
    /// ```toml
    /// [[camera]]
    /// facing = "user"
    /// device = "/dev/video0"
    /// ```
    pub fn load(path: &str) -> Result<Self, DeviceMapError> {
        if !Path::new(path).exists() {
            return Err(DeviceMapError::NotFound(path.to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let file: DeviceMapFile = toml::from_str(&raw)?;
        Ok(Self {
            entries: file
                .camera
                .into_iter()
                .map(|e| (e.facing, e.device))
                .collect(),
        })
    }

    /// Resolve a facing mode to a device path.
    ///
    /// An explicit map entry wins; otherwise falls back to
    /// enumeration order over `devices`.
    pub fn resolve(&self, facing: FacingMode, devices: &[DeviceInfo]) -> Option<String> {
        if let Some((_, device)) = self.entries.iter().find(|(f, _)| *f == facing) {
            return Some(device.clone());
        }
        let index = match facing {
            FacingMode::User => 0,
            FacingMode::Environment => 1,
        };
        devices.get(index).map(|d| d.path.clone())
    }
}

/// List available V4L2 video capture devices.
pub fn list_devices() -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    for i in 0..16 {
        let path = format!("/dev/video{i}");
        if !Path::new(&path).exists() {
            continue;
        }
        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            continue;
        }
        devices.push(DeviceInfo {
            path,
            name: caps.card.clone(),
            driver: caps.driver.clone(),
            bus: caps.bus.clone(),
        });
    }

    devices
}
