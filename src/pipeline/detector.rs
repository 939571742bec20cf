//! Seams between the pipeline and the landmark model.

use std::future::Future;

use crate::camera::frame::Frame;
use crate::error::{InferenceError, ModelLoadError};
use crate::gesture::landmarks::HandPose;

/// A loaded hand landmark model.
pub trait LandmarkDetector {
    /// Returns every hand found in the frame, in frame pixel coordinates.
    fn detect(&self, frame: &Frame) -> impl Future<Output = Result<Vec<HandPose>, InferenceError>>;
}

/// Produces a ready [`LandmarkDetector`]; invoked by the model loader at most once per attempt.
pub trait DetectorFactory {
    type Detector: LandmarkDetector + 'static;

    fn load(&self) -> impl Future<Output = Result<Self::Detector, ModelLoadError>>;
}
