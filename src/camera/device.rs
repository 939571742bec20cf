//! OpenCV-backed video device.

use anyhow::Error;
use opencv::core::Mat;
use opencv::videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst};
use tracing::warn;

use crate::camera::frame::Frame;
use crate::camera::session::{CaptureRequest, VideoDevice, VideoStream};
use crate::error::CameraError;

/// Cameras reachable through `cv::VideoCapture`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCvCamera;

impl VideoDevice for OpenCvCamera {
    fn open(&self, request: &CaptureRequest) -> Result<Box<dyn VideoStream>, CameraError> {
        check_device_access(request.device_index)?;

        let mut capture = VideoCapture::new(request.device_index, videoio::CAP_ANY)
            .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;
        let opened = capture
            .is_opened()
            .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;
        if !opened {
            return Err(CameraError::DeviceUnavailable(format!(
                "video device {} could not be opened",
                request.device_index
            )));
        }

        for (prop, value) in [
            (videoio::CAP_PROP_FRAME_WIDTH, request.width),
            (videoio::CAP_PROP_FRAME_HEIGHT, request.height),
        ] {
            if !matches!(capture.set(prop, f64::from(value)), Ok(true)) {
                warn!(prop, value, "camera rejected capture property");
            }
        }

        Ok(Box::new(OpenCvStream { capture }))
    }
}

struct OpenCvStream {
    capture: VideoCapture,
}

impl VideoStream for OpenCvStream {
    fn read_frame(&mut self) -> Result<Frame, Error> {
        let mut image = Mat::default();
        self.capture.read(&mut image)?;
        Ok(Frame::new(image))
    }
}

impl Drop for OpenCvStream {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!("failed to release camera: {e}");
        }
    }
}

/// VideoCapture reports a denied device as a generic open failure, so probe the node first.
#[cfg(target_os = "linux")]
fn check_device_access(device_index: i32) -> Result<(), CameraError> {
    use std::fs::OpenOptions;
    use std::io::ErrorKind;

    let node = format!("/dev/video{device_index}");
    match OpenOptions::new().read(true).open(&node) {
        Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(CameraError::PermissionDenied(node)),
        _ => Ok(()),
    }
}

#[cfg(not(target_os = "linux"))]
fn check_device_access(_device_index: i32) -> Result<(), CameraError> {
    Ok(())
}
