//! Error types for the recognition pipeline.

use thiserror::Error;

/// Failures acquiring the video input device.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CameraError {
    /// The operating system refused access to the device.
    #[error("camera access was denied: {0}")]
    PermissionDenied(String),

    /// No usable device could be opened.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Failures loading the landmark model. Cloned out to every caller waiting on a load.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelLoadError {
    #[error("cannot reach inference server at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("model {model} is not ready on the inference server")]
    NotReady { model: String },

    #[error("model load failed: {0}")]
    Other(String),
}

/// A single detector call failed. Never escalates past the detection loop.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("cannot prepare frame for inference: {0}")]
    Preprocess(String),

    #[error("malformed model output: {0}")]
    Output(String),
}

impl InferenceError {
    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output(msg.into())
    }
}

/// Errors surfaced to the host by the pipeline lifecycle operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("unable to load recognition model, retry ({0})")]
    ModelLoad(#[from] ModelLoadError),

    /// The pipeline is in the error state; call `retry` first.
    #[error("pipeline is in error state: {0}")]
    Failed(String),
}
