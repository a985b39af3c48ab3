//! Detection adapter
//!
//! Turns a stored image into a detection result, either from the local placeholder
//! or by relaying the external detection API's response.

pub mod placeholder;
pub mod remote;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::{DetectionConfig, DetectionMode};
use crate::intake::StoredImage;
use crate::logger;

pub use remote::RemoteDetector;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Failed to read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API Error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Detection API timed out after {attempts} attempt(s) of {timeout:?}")]
    Timeout { attempts: u32, timeout: Duration },

    #[error("Detection API request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Detection API returned invalid JSON: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// One detected object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// `[x1, y1, x2, y2]` in pixels
    #[serde(rename = "box")]
    pub bbox: [i32; 4],
    /// Always within `[0, 1]`
    pub confidence: f64,
}

impl Detection {
    /// Confidence is clamped into `[0, 1]`; NaN becomes 0
    pub fn new(label: impl Into<String>, bbox: [i32; 4], confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            label: label.into(),
            bbox,
            confidence,
        }
    }
}

/// Response shape the frontend expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub success: bool,
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    pub const fn success(detections: Vec<Detection>) -> Self {
        Self {
            success: true,
            detections,
        }
    }
}

/// Result of either detection path, serialized without a wrapper
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetectionOutput {
    Local(DetectionResult),
    Remote(serde_json::Value),
}

/// Detection path chosen at startup from `detection.mode`
#[derive(Debug, Clone)]
pub enum Detector {
    Placeholder,
    Remote(RemoteDetector),
}

impl Detector {
    pub fn from_config(config: &DetectionConfig) -> Result<Self, DetectError> {
        match config.mode {
            DetectionMode::Placeholder => Ok(Self::Placeholder),
            DetectionMode::Remote => Ok(Self::Remote(RemoteDetector::new(config)?)),
        }
    }

    pub const fn mode(&self) -> DetectionMode {
        match self {
            Self::Placeholder => DetectionMode::Placeholder,
            Self::Remote(_) => DetectionMode::Remote,
        }
    }

    pub async fn detect(&self, image: &StoredImage) -> Result<DetectionOutput, DetectError> {
        match self {
            Self::Placeholder => Ok(DetectionOutput::Local(placeholder::detect(&image.path))),
            Self::Remote(remote) => {
                let value = remote.detect(&image.path).await?;
                logger::log_info(&format!(
                    "[Detect] {} answered for {}",
                    remote.api_url(),
                    image.file_name()
                ));
                Ok(DetectionOutput::Remote(value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    #[test]
    fn test_confidence_is_clamped() {
        assert!((Detection::new("a", [0, 0, 1, 1], 1.7).confidence - 1.0).abs() < f64::EPSILON);
        assert!(Detection::new("a", [0, 0, 1, 1], -0.2).confidence.abs() < f64::EPSILON);
        assert!(Detection::new("a", [0, 0, 1, 1], f64::NAN).confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn test_output_serializes_without_wrapper() {
        let local = DetectionOutput::Local(DetectionResult::success(vec![]));
        assert_eq!(
            serde_json::to_value(&local).unwrap(),
            json!({"success": true, "detections": []})
        );

        let remote = DetectionOutput::Remote(json!({"predictions": []}));
        assert_eq!(
            serde_json::to_value(&remote).unwrap(),
            json!({"predictions": []})
        );
    }

    #[test]
    fn test_detector_follows_mode() {
        let mut cfg = Config::defaults().unwrap();
        let detector = Detector::from_config(&cfg.detection).unwrap();
        assert_eq!(detector.mode(), DetectionMode::Placeholder);

        cfg.detection.mode = DetectionMode::Remote;
        cfg.detection.api_key = "k".to_string();
        let detector = Detector::from_config(&cfg.detection).unwrap();
        assert_eq!(detector.mode(), DetectionMode::Remote);
    }

    #[tokio::test]
    async fn test_placeholder_ignores_image() {
        let image = StoredImage {
            path: PathBuf::from("/does/not/exist.png"),
            origin_filename: "exist.png".to_string(),
        };
        let output = Detector::Placeholder.detect(&image).await.unwrap();
        assert_eq!(output, DetectionOutput::Local(placeholder::detect(&image.path)));
    }
}
