//! Capture session — exclusive ownership of the live camera stream.
//!
//! Holds at most one open stream, converts acquisition outcomes into
//! [`GateState`] transitions, and publishes the current frame source so
//! the fusion engine can sample frames without holding the session.

use crate::gate::GateState;
use percept_hw::{CameraError, CameraStream, DeviceMap, FacingMode, Frame};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("a stream is already open — stop it before reopening")]
    StreamAlreadyOpen,
    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// A live frame surface usable as model input.
pub trait FrameSource: Send + Sync {
    /// The most recently delivered frame, if any.
    fn latest_frame(&self) -> Option<Frame>;
    /// Halt every track of the stream. Idempotent.
    fn stop(&self);
}

impl FrameSource for CameraStream {
    fn latest_frame(&self) -> Option<Frame> {
        CameraStream::latest_frame(self)
    }

    fn stop(&self) {
        CameraStream::stop(self)
    }
}

/// The capture device collaborator: turns a facing mode and resolution
/// hint into a live stream, or fails.
pub trait StreamBackend: Send + 'static {
    type Stream: FrameSource + 'static;

    fn request_stream(
        &self,
        facing: FacingMode,
        ideal_width: u32,
        ideal_height: u32,
    ) -> Result<Self::Stream, CameraError>;
}

/// Production backend: resolve the facing mode to a V4L2 device and
/// open it.
pub struct V4l2Backend {
    map: DeviceMap,
}

impl V4l2Backend {
    pub fn new(map: DeviceMap) -> Self {
        Self { map }
    }
}

impl StreamBackend for V4l2Backend {
    type Stream = CameraStream;

    fn request_stream(
        &self,
        facing: FacingMode,
        ideal_width: u32,
        ideal_height: u32,
    ) -> Result<CameraStream, CameraError> {
        let devices = percept_hw::list_devices();
        let path = self.map.resolve(facing, &devices).ok_or_else(|| {
            CameraError::DeviceNotFound(format!("no capture device for facing mode {facing}"))
        })?;
        CameraStream::open(&path, facing, ideal_width, ideal_height)
    }
}

/// Manages acquisition and release of the camera stream.
pub struct CaptureSession<B: StreamBackend> {
    backend: B,
    ideal_width: u32,
    ideal_height: u32,
    stream: Option<Arc<B::Stream>>,
    state_tx: watch::Sender<GateState>,
    source_tx: watch::Sender<Option<Arc<B::Stream>>>,
}

impl<B: StreamBackend> CaptureSession<B> {
    /// Create a session and the receivers observing its gate state and
    /// current frame source.
    #[allow(clippy::type_complexity)]
    pub fn new(
        backend: B,
        ideal_width: u32,
        ideal_height: u32,
    ) -> (
        Self,
        watch::Receiver<GateState>,
        watch::Receiver<Option<Arc<B::Stream>>>,
    ) {
        let (state_tx, state_rx) = watch::channel(GateState::Unknown);
        let (source_tx, source_rx) = watch::channel(None);
        (
            Self {
                backend,
                ideal_width,
                ideal_height,
                stream: None,
                state_tx,
                source_tx,
            },
            state_rx,
            source_rx,
        )
    }

    /// Request a stream for `facing`.
    ///
    /// On success the stream is stored and the gate transitions to
    /// `Granted`; on acquisition failure nothing is stored and the gate
    /// transitions to `Denied`. Calling with a stream still open is a
    /// caller bug (the controller stops first) and changes nothing.
    pub fn open(&mut self, facing: FacingMode) -> Result<(), SessionError> {
        if self.stream.is_some() {
            return Err(SessionError::StreamAlreadyOpen);
        }

        match self
            .backend
            .request_stream(facing, self.ideal_width, self.ideal_height)
        {
            Ok(stream) => {
                let stream = Arc::new(stream);
                self.stream = Some(Arc::clone(&stream));
                self.source_tx.send_replace(Some(stream));
                self.state_tx.send_replace(GateState::Granted { facing });
                Ok(())
            }
            Err(e) => {
                self.state_tx.send_replace(GateState::Denied);
                Err(e.into())
            }
        }
    }

    /// Stop and release the held stream, if any. Idempotent.
    ///
    /// The gate keeps reflecting the last acquisition outcome; only an
    /// `open` moves it.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.source_tx.send_replace(None);
            stream.stop();
        }
    }

    /// The current live frame source, or `None` when no stream is open.
    pub fn frame_source(&self) -> Option<Arc<B::Stream>> {
        self.stream.clone()
    }

    pub fn state(&self) -> GateState {
        *self.state_tx.borrow()
    }
}

impl<B: StreamBackend> Drop for CaptureSession<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
