use percept_hw::{DeviceMap, FacingMode};
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Directory containing ONNX model and label files.
    pub model_dir: PathBuf,
    /// Optional TOML file mapping facing modes to device paths.
    pub device_map_path: Option<String>,
    /// Inference tick period in milliseconds.
    pub tick_period_ms: u64,
    /// Facing mode requested at startup.
    pub initial_facing: FacingMode,
    /// Resolution hint passed to the capture device.
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Config {
    /// Load configuration from `PERCEPT_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("PERCEPT_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| percept_core::default_model_dir());

        let initial_facing = std::env::var("PERCEPT_INITIAL_FACING")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(FacingMode::User);

        Self {
            model_dir,
            device_map_path: std::env::var("PERCEPT_DEVICE_MAP").ok(),
            tick_period_ms: env_u64("PERCEPT_TICK_MS", 1000),
            initial_facing,
            ideal_width: env_u32("PERCEPT_IDEAL_WIDTH", 1080),
            ideal_height: env_u32("PERCEPT_IDEAL_HEIGHT", 1920),
        }
    }

    /// Path to the MobileNet scene classification model.
    pub fn scene_model_path(&self) -> String {
        self.model_dir
            .join("mobilenet_v2.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the scene classifier's label file.
    pub fn scene_labels_path(&self) -> String {
        self.model_dir
            .join("imagenet_labels.txt")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the SSD object detection model.
    pub fn object_model_path(&self) -> String {
        self.model_dir
            .join("ssd_mobilenet_v2.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the object detector's label file.
    pub fn object_labels_path(&self) -> String {
        self.model_dir
            .join("coco_labels.txt")
            .to_string_lossy()
            .into_owned()
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Load the facing-mode device map, falling back to enumeration
    /// order when no map file is configured or it fails to parse.
    pub fn device_map(&self) -> DeviceMap {
        let Some(path) = &self.device_map_path else {
            return DeviceMap::default();
        };
        match DeviceMap::load(path) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(path, error = %e, "ignoring bad device map");
                DeviceMap::default()
            }
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
