//! Placeholder detector
//!
//! Stands in for a real model. The image is never opened.

use std::path::Path;

use super::{Detection, DetectionResult};

pub const PLACEHOLDER_LABEL: &str = "12345";
pub const PLACEHOLDER_BOX: [i32; 4] = [50, 50, 150, 100];
pub const PLACEHOLDER_CONFIDENCE: f64 = 0.95;

/// Fixed, input-independent detection result
pub fn detect(_path: &Path) -> DetectionResult {
    DetectionResult::success(vec![Detection::new(
        PLACEHOLDER_LABEL,
        PLACEHOLDER_BOX,
        PLACEHOLDER_CONFIDENCE,
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fixed_result() {
        let result = detect(Path::new("/nonexistent/anything.jpg"));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": true,
                "detections": [
                    {"label": "12345", "box": [50, 50, 150, 100], "confidence": 0.95}
                ]
            })
        );
    }

    #[test]
    fn test_input_independent() {
        assert_eq!(detect(Path::new("a.png")), detect(Path::new("/tmp/b.jpg")));
    }
}
