//! V4L2 camera streams via the `v4l` crate.
//!
//! A [`CameraStream`] owns the device and a background capture thread
//! that keeps the latest decoded RGB frame available to samplers. The
//! stream is the exclusive handle: stopping it halts the capture
//! thread and releases the device.

use crate::facing::FacingMode;
use crate::frame::{self, Frame};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Classify a device-open failure from its message.
fn classify_open_error(device_path: &str, message: &str) -> CameraError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("busy") || lower.contains("ebusy") {
        CameraError::DeviceBusy
    } else if lower.contains("permission") || lower.contains("eacces") || lower.contains("denied")
    {
        CameraError::PermissionDenied(format!("{device_path}: {message}"))
    } else {
        CameraError::DeviceNotFound(format!("{device_path}: {message}"))
    }
}

/// A live V4L2 camera stream.
pub struct CameraStream {
    latest: Arc<Mutex<Option<Frame>>>,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
    pub device_path: String,
    pub facing: FacingMode,
    pub width: u32,
    pub height: u32,
}

impl CameraStream {
    /// Open a V4L2 device and start capturing.
    ///
    /// `ideal_width`/`ideal_height` are a resolution hint; the driver
    /// keeps the final say. Only YUYV is accepted — it is what UVC
    /// webcams deliver and the only format the RGB conversion handles.
    pub fn open(
        device_path: &str,
        facing: FacingMode,
        ideal_width: u32,
        ideal_height: u32,
    ) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path)
            .map_err(|e| classify_open_error(device_path, &e.to_string()))?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            facing = %facing,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;

        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = ideal_width;
        fmt.height = ideal_height;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        if negotiated.fourcc != FourCC::new(b"YUYV") {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV)",
                negotiated.fourcc
            )));
        }

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        let latest = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));

        let thread = {
            let latest = Arc::clone(&latest);
            let running = Arc::clone(&running);
            let width = negotiated.width;
            let height = negotiated.height;
            std::thread::Builder::new()
                .name("percept-capture".into())
                .spawn(move || capture_loop(device, width, height, latest, running))
                .map_err(|e| {
                    CameraError::CaptureFailed(format!("failed to spawn capture thread: {e}"))
                })?
        };

        Ok(Self {
            latest,
            running,
            thread: Mutex::new(Some(thread)),
            device_path: device_path.to_string(),
            facing,
            width: negotiated.width,
            height: negotiated.height,
        })
    }

    /// The most recently captured frame, if any has arrived yet.
    pub fn latest_frame(&self) -> Option<Frame> {
        self.latest.lock().clone()
    }

    /// Stop capturing and release the device. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
            tracing::info!(device = %self.device_path, "camera stream stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Capture thread body: dequeue, convert, publish to the latest slot.
fn capture_loop(
    device: Device,
    width: u32,
    height: u32,
    latest: Arc<Mutex<Option<Frame>>>,
    running: Arc<AtomicBool>,
) {
    let mut stream = match MmapStream::with_buffers(&device, BufType::VideoCapture, 4) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to create mmap stream");
            running.store(false, Ordering::Release);
            return;
        }
    };

    while running.load(Ordering::Acquire) {
        let (buf, meta) = match stream.next() {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "failed to dequeue buffer");
                std::thread::sleep(std::time::Duration::from_millis(10));
                continue;
            }
        };

        match frame::yuyv_to_rgb(buf, width, height) {
            Ok(rgb) => {
                *latest.lock() = Some(Frame {
                    data: rgb,
                    width,
                    height,
                    timestamp: std::time::Instant::now(),
                    sequence: meta.sequence,
                });
            }
            Err(e) => {
                tracing::warn!(seq = meta.sequence, error = %e, "dropping malformed frame");
            }
        }
    }

    tracing::debug!("capture thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_busy() {
        assert!(matches!(
            classify_open_error("/dev/video0", "ioctl: EBUSY"),
            CameraError::DeviceBusy
        ));
    }

    #[test]
    fn test_classify_permission() {
        assert!(matches!(
            classify_open_error("/dev/video0", "Permission denied (os error 13)"),
            CameraError::PermissionDenied(_)
        ));
    }

    #[test]
    fn test_classify_fallback_not_found() {
        assert!(matches!(
            classify_open_error("/dev/video9", "No such device"),
            CameraError::DeviceNotFound(_)
        ));
    }
}
