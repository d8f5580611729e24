use crate::error::PipelineError;
use serde_json::{json, Value};

pub const EVENT_VEHICLE_DETECTED: &str = "codeproject_ai_alpr.vehicle_detected";

/// One plate as reported by the ALPR server, in pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub plate: String,
    pub confidence: f64,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl RawDetection {
    pub fn from_json(value: &Value) -> Result<RawDetection, PipelineError> {
        let number = |field: &str| {
            value[field].as_f64().ok_or_else(|| {
                PipelineError::Normalization(format!("Missing {} field in {}", field, value))
            })
        };
        Ok(RawDetection {
            plate: value["plate"]
                .as_str()
                .ok_or_else(|| {
                    PipelineError::Normalization(format!("Missing plate field in {}", value))
                })?
                .to_string(),
            confidence: number("confidence")?,
            x_min: number("x_min")?,
            y_min: number("y_min")?,
            x_max: number("x_max")?,
            y_max: number("y_max")?,
        })
    }

    pub fn normalize(&self) -> NormalizedDetection {
        NormalizedDetection {
            plate: self.plate.clone(),
            confidence: self.confidence,
            box_y_centre: self.y_min + (self.y_max - self.y_min) / 2.0,
            box_x_centre: self.x_min + (self.x_max - self.x_min) / 2.0,
        }
    }
}

/// A detection reduced to its plate, confidence and box centre (still in pixels).
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDetection {
    pub plate: String,
    pub confidence: f64,
    pub box_y_centre: f64,
    pub box_x_centre: f64,
}

impl NormalizedDetection {
    pub fn to_json(&self) -> Value {
        json!({
            "plate": self.plate,
            "confidence": self.confidence,
            "box_y_centre": self.box_y_centre,
            "box_x_centre": self.box_x_centre,
        })
    }

    pub fn event_data(&self, entity_id: &str) -> Value {
        let mut data = self.to_json();
        data["entity_id"] = json!(entity_id);
        data
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceResult {
    pub predictions: Vec<RawDetection>,
    pub inference_ms: Option<f64>,
}

/// Messages from the pipeline to the Home Assistant publisher.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Event {
        event_type: &'static str,
        data: Value,
    },
    State {
        entity_id: String,
        state: Option<usize>,
        attributes: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_is_midpoint_of_box() {
        let raw = RawDetection {
            plate: "ABC123".to_string(),
            confidence: 0.91,
            x_min: 10.0,
            y_min: 20.0,
            x_max: 31.0,
            y_max: 60.0,
        };
        let normalized = raw.normalize();
        assert_eq!(normalized.plate, "ABC123");
        assert_eq!(normalized.confidence, 0.91);
        assert_eq!(normalized.box_x_centre, 20.5);
        assert_eq!(normalized.box_y_centre, 40.0);
    }

    #[test]
    fn parses_integer_coordinates() {
        let raw = RawDetection::from_json(&json!({
            "plate": "XYZ999",
            "confidence": 0.5,
            "x_min": 0, "y_min": 4, "x_max": 100, "y_max": 8,
        }))
        .unwrap();
        assert_eq!(raw.x_max, 100.0);
        assert_eq!(raw.normalize().box_y_centre, 6.0);
    }

    #[test]
    fn missing_field_is_normalization_error() {
        let err = RawDetection::from_json(&json!({
            "plate": "XYZ999",
            "confidence": 0.5,
            "x_min": 0, "y_min": 4, "x_max": 100,
        }))
        .unwrap_err();
        match err {
            PipelineError::Normalization(msg) => assert!(msg.contains("y_max")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn event_data_carries_entity_id() {
        let data = NormalizedDetection {
            plate: "ABC123".to_string(),
            confidence: 0.8,
            box_y_centre: 1.0,
            box_x_centre: 2.0,
        }
        .event_data("image_processing.driveway");
        assert_eq!(data["entity_id"], "image_processing.driveway");
        assert_eq!(data["plate"], "ABC123");
        assert_eq!(data["box_x_centre"], 2.0);
    }
}
