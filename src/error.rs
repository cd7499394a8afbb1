//! # Error Handling
//!
//! This module defines the service-level error type and how it is converted to
//! HTTP responses. Core errors (`TempoError`, `TranscodeError`) are wrapped
//! here so handlers can use `?` throughout.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Enums for Error Types
//! - **Variants**: Each enum variant represents a different kind of error
//! - **Data**: Each variant can hold additional information (String, nested errors, etc.)
//! - **Pattern matching**: Use `match` to map each error to a status code
//!
//! ### Traits for Error Conversion
//! - **From trait**: Automatically converts between error types
//! - **ResponseError trait**: Converts errors to HTTP responses
//! - **Display trait**: Defines how errors are formatted as strings

use crate::tempo::TempoError;
use crate::transcoder::TranscodeError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Error types surfaced by HTTP handlers.
///
/// ## Error Categories:
/// - **Tempo**: the request could not be planned (400)
/// - **BadRequest / ValidationError**: malformed form or query input (400)
/// - **UnsupportedMedia**: upload is not mp3 or wav (400)
/// - **PayloadTooLarge**: upload exceeds the configured cap (413)
/// - **Transcode**: ffmpeg failed or timed out (500)
/// - **Internal / ConfigError**: server-side problems (500)
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors (filesystem failures, etc.)
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),

    /// Uploaded file has a content type we do not transcode
    UnsupportedMedia(String),

    /// Uploaded file exceeds `uploads.max_upload_bytes`
    PayloadTooLarge { limit: usize },

    /// Tempo extraction, target validation or decomposition failed
    Tempo(TempoError),

    /// The external transcoder failed
    Transcode(TranscodeError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::UnsupportedMedia(msg) => write!(f, "Unsupported media: {}", msg),
            AppError::PayloadTooLarge { limit } => {
                write!(f, "Upload too large (max: {} bytes)", limit)
            }
            AppError::Tempo(err) => write!(f, "Invalid tempo request: {}", err),
            AppError::Transcode(err) => write!(f, "Error processing audio: {}", err),
        }
    }
}

impl AppError {
    /// Machine-readable error type used in the JSON body.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::ConfigError(_) => "config_error",
            AppError::ValidationError(_) => "validation_error",
            AppError::UnsupportedMedia(_) => "unsupported_media",
            AppError::PayloadTooLarge { .. } => "payload_too_large",
            AppError::Tempo(err) => err.kind(),
            AppError::Transcode(_) => "transcode_error",
        }
    }
}

/// ## JSON Response Format:
/// ```json
/// {
///   "error": {
///     "type": "unresolvable_tempo",
///     "message": "Invalid tempo request: could not infer a tempo from filename 'audio.mp3' ...",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::ConfigError(_) | AppError::Transcode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::BadRequest(_)
            | AppError::ValidationError(_)
            | AppError::UnsupportedMedia(_)
            | AppError::Tempo(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": self.error_type(),
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<TempoError> for AppError {
    fn from(err: TempoError) -> Self {
        AppError::Tempo(err)
    }
}

impl From<TranscodeError> for AppError {
    fn from(err: TranscodeError) -> Self {
        AppError::Transcode(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Any anyhow error that reaches a handler is a server-side problem.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing errors are almost always due to the client sending malformed data.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
