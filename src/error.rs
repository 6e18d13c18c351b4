//! Application error types and their HTTP mapping.

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;

/// Error model used by request parsing, language resolution, media tooling and
/// transcription.
///
/// Translation model failures never appear here: they are absorbed inside
/// [`crate::translate`] and never reach a handler.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    InvalidRequest {
        message: String,
        param: Option<String>,
        code: Option<String>,
    },
    #[error("Unsupported target language: {0}")]
    UnsupportedLanguage(String),
    #[error("{0}")]
    UnsupportedMediaType(String),
    #[error("{0}")]
    BadMultipart(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}: {stderr}")]
    Tool { message: String, stderr: String },
    #[error("{0}")]
    Backend(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Creates a `401 Unauthorized` error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Creates an `invalid_request_error` payload with status `400`.
    pub fn invalid_request(
        message: impl Into<String>,
        param: Option<&str>,
        code: Option<&str>,
    ) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            param: param.map(ToOwned::to_owned),
            code: code.map(ToOwned::to_owned),
        }
    }

    /// Creates the hard failure for a target language without a model mapping.
    pub fn unsupported_language(code: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(code.into())
    }

    /// Creates a `415 Unsupported Media Type` style error.
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(message.into())
    }

    /// Creates a multipart parsing/shape validation error.
    pub fn bad_multipart(message: impl Into<String>) -> Self {
        Self::BadMultipart(message.into())
    }

    /// Creates a `404 Not Found` error for a missing stored file.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a media tool failure carrying the tool's diagnostic output.
    pub fn tool(message: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Tool {
            message: message.into(),
            stderr: stderr.into(),
        }
    }

    /// Creates an internal inference/backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Creates a generic internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl ErrorBody {
    fn new(message: String, error_type: &'static str, param: Option<&str>, code: &str) -> Self {
        Self {
            message,
            error_type,
            param: param.map(ToOwned::to_owned),
            code: Some(code.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            AppError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new(message, "authentication_error", None, "invalid_api_key"),
            ),
            AppError::InvalidRequest { param, code, .. } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    message,
                    error_type: "invalid_request_error",
                    param,
                    code,
                },
            ),
            AppError::UnsupportedLanguage(_) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new(
                    message,
                    "invalid_request_error",
                    Some("target_lang"),
                    "unsupported_language",
                ),
            ),
            AppError::UnsupportedMediaType(_) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ErrorBody::new(
                    message,
                    "invalid_request_error",
                    Some("file"),
                    "unsupported_media_type",
                ),
            ),
            AppError::BadMultipart(_) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new(message, "invalid_request_error", None, "invalid_multipart"),
            ),
            AppError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                ErrorBody::new(message, "invalid_request_error", None, "file_not_found"),
            ),
            AppError::Tool { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new(message, "server_error", None, "media_tool_failed"),
            ),
            AppError::Backend(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new(message, "server_error", None, "inference_failed"),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new(message, "server_error", None, "internal_error"),
            ),
        };

        (status, Json(ErrorPayload { error: body })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn tool_error_message_carries_stderr() {
        let err = AppError::tool("ffmpeg exited with status 1", "No such file");
        assert_eq!(err.to_string(), "ffmpeg exited with status 1: No such file");
    }

    #[test]
    fn unsupported_language_names_the_code() {
        let err = AppError::unsupported_language("xx");
        assert_eq!(err.to_string(), "Unsupported target language: xx");
    }
}
