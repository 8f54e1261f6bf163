pub mod config;
pub mod error;
pub mod handlers;
pub mod labels;
pub mod models;
pub mod postprocess;
pub mod preprocess;
pub mod service;
pub mod yolo;

use actix_cors::Cors;

pub use config::{Config, InputSize, LabelSource};
pub use error::{DetectError, ModelError};
pub use handlers::routes;
pub use labels::Labels;
pub use models::{DetectionRecord, ErrorResponse, RawDetection};
pub use postprocess::Thresholds;
pub use service::{DetectionService, Detector};
pub use yolo::YoloDetector;

/// CORS policy: one allowed origin, or any origin when unset or `*`.
pub fn cors(origin: Option<&str>) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST"])
        .allow_any_header();

    match origin {
        Some(origin) if !origin.is_empty() && origin != "*" => cors.allowed_origin(origin),
        _ => cors.allow_any_origin(),
    }
}
