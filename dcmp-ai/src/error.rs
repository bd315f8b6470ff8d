//! Error types for dcmp-ai
//!
//! [`GenerationError`] classifies pipeline failures and carries diagnostics
//! (the user content or instrument the call was about, plus a preview of the
//! raw service output). [`ApiError`] maps failures onto the command surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use dcmp_common::ValidationError;

use crate::client::ProviderError;
use crate::extract::ExtractionError;
use crate::revision::IdentityDrift;

/// Failure of a plan or track generation call
///
/// `subject` names what the call was about: the user's request text for plans,
/// the instrument name for tracks.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Service output is not parseable JSON
    #[error("Failed to parse JSON for '{subject}': {source}. Raw response: '{raw_preview}'")]
    Extraction {
        subject: String,
        raw_preview: String,
        #[source]
        source: ExtractionError,
    },

    /// Parsed output does not match the Plan/Track schema
    #[error(
        "JSON structure validation failed for '{subject}': {source}. Raw response: '{raw_preview}'"
    )]
    Validation {
        subject: String,
        raw_preview: String,
        #[source]
        source: ValidationError,
    },

    /// Network, provider-side or otherwise unexpected failure
    #[error("Generation request failed for '{subject}': {source}")]
    Provider {
        subject: String,
        #[source]
        source: ProviderError,
    },

    /// Revised plan altered instruments that already have tracks
    #[error(
        "Revised plan for '{subject}' changed already-generated instruments: {}",
        join_drifts(.drifts)
    )]
    IdentityDrift {
        subject: String,
        drifts: Vec<IdentityDrift>,
    },
}

impl GenerationError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::Extraction { .. } => "EXTRACTION_ERROR",
            GenerationError::Validation { .. } => "VALIDATION_ERROR",
            GenerationError::Provider { .. } => "PROVIDER_ERROR",
            GenerationError::IdentityDrift { .. } => "IDENTITY_DRIFT",
        }
    }
}

fn join_drifts(drifts: &[IdentityDrift]) -> String {
    drifts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Generation pipeline failure (502)
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Generation(err) => (StatusCode::BAD_GATEWAY, err.code(), err.to_string()),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
