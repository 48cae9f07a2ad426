//! percept-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based camera streams, YUYV→RGB frame conversion, and
//! facing-mode → device resolution.

pub mod camera;
pub mod devices;
pub mod facing;
pub mod frame;

pub use camera::{CameraError, CameraStream};
pub use devices::{list_devices, DeviceInfo, DeviceMap};
pub use facing::FacingMode;
pub use frame::Frame;
