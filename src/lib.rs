pub mod camera;
pub mod config;
pub mod error;
pub mod gesture;
pub mod modules;
pub mod pipeline;
pub mod render;
pub mod triton_client;
pub mod utils;

pub use error::{CameraError, InferenceError, ModelLoadError, PipelineError};
pub use gesture::catalog::{SignCatalog, SignEntry};
pub use gesture::classifier::{classify, Classification};
pub use gesture::landmarks::{HandPose, Landmark};
pub use pipeline::pipeline::{DetectionState, SignRecognitionPipeline};
