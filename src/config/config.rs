use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};

use crate::gesture::catalog::SignCatalog;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub device_index: i32,
    pub width: i32,
    pub height: i32,
}

impl CameraConfig {
    pub fn new() -> Self {
        CameraConfig {
            device_index: 0,
            width: 640,
            height: 480,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HandLandmarkConfig {
    pub url: String,
    pub model_name: String,
    pub model_version: String,
    /// Connection timeout in seconds.
    pub timeout: i32,
    pub input_name: String,
    pub imsize: i32,
    pub landmarks_output: String,
    pub presence_output: String,
    pub mean: f32,
    pub scale: f32,
    pub threshold_presence: f32,
}

impl HandLandmarkConfig {
    pub fn new() -> Self {
        HandLandmarkConfig {
            url: "http://127.0.0.1:8001".to_string(),
            model_name: "hand_landmark".to_string(),
            model_version: "".to_string(),
            timeout: 20,
            input_name: "input_1".to_string(),
            imsize: 224,
            landmarks_output: "Identity".to_string(),
            presence_output: "Identity_1".to_string(),
            mean: 0.0,
            scale: 1.0 / 255.0,
            threshold_presence: 0.5,
        }
    }
}

impl Default for HandLandmarkConfig {
    fn default() -> Self {
        HandLandmarkConfig::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    /// Pause between two window repaints of the host; each repaint releases one detection iteration.
    pub repaint_interval_ms: u64,
    /// Optional cap on a single detector call. Expiry stops the camera and enters the error state.
    pub detect_timeout_ms: Option<u64>,
}

impl DetectionConfig {
    pub fn new() -> Self {
        DetectionConfig {
            repaint_interval_ms: 16,
            detect_timeout_ms: None,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig::new()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub camera: CameraConfig,
    pub hand_landmark: HandLandmarkConfig,
    pub detection: DetectionConfig,
    /// JSON sign catalog. The built-in vocabulary is used when absent.
    pub catalog: Option<PathBuf>,
}

impl PipelineConfig {
    /// from_file reads a JSON configuration file; missing fields take their defaults.
    ///
    /// # Arguments
    /// * `path` - path to the JSON file
    ///
    /// # Returns
    /// * `Result<PipelineConfig, Error>`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn load_catalog(&self) -> Result<SignCatalog, Error> {
        match &self.catalog {
            Some(path) => SignCatalog::from_json_file(path),
            None => Ok(SignCatalog::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{"camera": {"device_index": 2}, "detection": {"detect_timeout_ms": 500}}"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.camera.device_index, 2);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 480);
        assert_eq!(config.detection.detect_timeout_ms, Some(500));
        assert_eq!(config.detection.repaint_interval_ms, 16);
        assert_eq!(config.hand_landmark, HandLandmarkConfig::new());
        assert!(config.catalog.is_none());
    }

    #[test]
    fn test_default_catalog_when_unset() {
        let catalog = PipelineConfig::default().load_catalog().unwrap();
        assert_eq!(catalog, SignCatalog::default());
    }

    #[test]
    fn test_missing_config_file() {
        assert!(PipelineConfig::from_file("/nonexistent/sign_pipeline.json").is_err());
    }
}
