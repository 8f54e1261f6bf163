use serde::{Deserialize, Serialize};

/// A detection as produced by a [`Detector`](crate::service::Detector), in
/// original image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub confidence: f32,
    pub class: usize,
}

/// One element of the `POST /detect` response array.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DetectionRecord {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub confidence: f32,
    #[serde(rename = "class")]
    pub class_id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}
