pub mod device;
pub mod frame;
pub mod session;

pub use device::OpenCvCamera;
pub use frame::Frame;
pub use session::{CameraSession, CaptureRequest, VideoDevice, VideoStream};
