// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

/// Client-fixable upload problems. The only errors a user ever sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File of {size} bytes exceeds the {}MB limit.", .limit / (1024 * 1024))]
    TooLarge { size: usize, limit: usize },

    #[error("Invalid file type '{media_type}'. Please upload an image.")]
    WrongType { media_type: String },
}

impl ValidationError {
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::TooLarge { .. } => "TooLarge",
            ValidationError::WrongType { .. } => "WrongType",
        }
    }
}

/// Anything that goes wrong on the model path. Always recovered via the simulator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiFailure {
    #[error("AI credential not configured")]
    MissingCredential,

    #[error("AI credential rejected: {0}")]
    InvalidCredential(String),

    #[error("AI request failed: {0}")]
    Transport(String),

    #[error("AI quota exhausted: {0}")]
    Quota(String),

    #[error("AI service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("AI refused the request: {0}")]
    Refused(String),

    #[error("AI returned an empty response")]
    EmptyResponse,

    #[error("AI call timed out after {0}ms")]
    Timeout(u64),

    #[error("Failed to decode AI response: {0}")]
    InvalidPayload(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("model text is empty")]
    Empty,
}

#[derive(Error, Debug)]
pub enum FloodError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No image file provided")]
    MissingFile,

    #[error("Malformed upload: {0}")]
    Multipart(String),

    #[error("Invalid image format: {0}")]
    ImageProcessing(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for FloodError {
    fn status_code(&self) -> StatusCode {
        match self {
            FloodError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            FloodError::Validation(_) => "Validation error",
            FloodError::MissingFile => "Missing file",
            FloodError::Multipart(_) => "Malformed upload",
            FloodError::ImageProcessing(_) => "Image processing error",
            FloodError::Internal(_) => "Internal error",
        };
        let mut body = serde_json::json!({
            "error": error,
            "message": self.to_string()
        });
        if let FloodError::Validation(reason) = self {
            body["reason"] = serde_json::json!(reason.reason());
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}
