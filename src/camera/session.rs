//! Exclusive ownership of the video input device.

use anyhow::Error;
use tracing::{debug, info};

use crate::camera::frame::Frame;
use crate::config::config::CameraConfig;
use crate::error::CameraError;

/// Device and resolution to acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub device_index: i32,
    pub width: i32,
    pub height: i32,
}

impl From<&CameraConfig> for CaptureRequest {
    fn from(config: &CameraConfig) -> Self {
        CaptureRequest {
            device_index: config.device_index,
            width: config.width,
            height: config.height,
        }
    }
}

/// A source of video streams. Opening grants exclusive access to the device.
pub trait VideoDevice {
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn VideoStream>, CameraError>;
}

/// An open stream. Dropping it releases the device.
pub trait VideoStream {
    /// Reads the latest frame. A frame without dimensions means the device is still warming up.
    fn read_frame(&mut self) -> Result<Frame, Error>;
}

/// Holds at most one open stream at a time.
pub struct CameraSession {
    device: Box<dyn VideoDevice>,
    request: CaptureRequest,
    stream: Option<Box<dyn VideoStream>>,
}

impl CameraSession {
    pub fn new(device: Box<dyn VideoDevice>, request: CaptureRequest) -> Self {
        CameraSession {
            device,
            request,
            stream: None,
        }
    }

    /// start opens the device. Does nothing when a stream is already open.
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = self.device.open(&self.request)?;
        info!(
            device = self.request.device_index,
            width = self.request.width,
            height = self.request.height,
            "camera started"
        );
        self.stream = Some(stream);
        Ok(())
    }

    /// stop releases the device. Safe to call when already stopped.
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            info!(device = self.request.device_index, "camera released");
        }
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// current_frame returns the latest frame, or `None` when stopped or the read failed.
    pub fn current_frame(&mut self) -> Option<Frame> {
        let stream = self.stream.as_mut()?;
        match stream.read_frame() {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!("camera read failed: {e:#}");
                None
            }
        }
    }
}
