use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Failures of a single `POST /detect` request.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("No image uploaded")]
    NoImage,
    #[error("Uploaded image exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("{0}")]
    Decode(#[from] image::ImageError),
    #[error("{0}")]
    Inference(String),
}

impl DetectError {
    pub fn inference(err: impl std::fmt::Display) -> Self {
        DetectError::Inference(err.to_string())
    }
}

impl ResponseError for DetectError {
    fn status_code(&self) -> StatusCode {
        match self {
            DetectError::NoImage => StatusCode::BAD_REQUEST,
            DetectError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DetectError::Decode(_) | DetectError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

/// Failures while acquiring the model at startup.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read label file {path}: {source}")]
    Labels {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load ONNX model {path}: {message}")]
    Load { path: String, message: String },
    #[error("unexpected model output shape {0:?}, expected [1, N, 5 + classes]")]
    OutputShape(Vec<usize>),
}

impl From<ModelError> for std::io::Error {
    fn from(err: ModelError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, err)
    }
}
