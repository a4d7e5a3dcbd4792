//! Stage failures as HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use voxlate_pipeline::{Stage, StageCause, StageError};
use voxlate_providers::ProviderError;

/// Non-standard "client closed request".
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub stage: String,
    pub error: String,
    pub kind: String,
}

/// An error response: status plus `{stage, error, kind}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    /// The request body could not be read (too large, aborted upload).
    pub fn unreadable_body(status: StatusCode, message: impl Into<String>) -> Self {
        let kind = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "PayloadTooLarge"
        } else {
            "ValidationError"
        };
        Self {
            status,
            body: ErrorBody {
                stage: Stage::Validating.to_string(),
                error: message.into(),
                kind: kind.into(),
            },
        }
    }
}

impl From<StageError> for ApiError {
    fn from(err: StageError) -> Self {
        Self {
            status: status_for(&err),
            body: ErrorBody {
                stage: err.stage.to_string(),
                error: err.cause.to_string(),
                kind: err.kind().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn status_for(err: &StageError) -> StatusCode {
    match &err.cause {
        StageCause::Validation(_) | StageCause::Decode(_) => StatusCode::BAD_REQUEST,
        StageCause::Cancelled => {
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
        }
        StageCause::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        StageCause::Provider(e) => match e {
            ProviderError::UnsupportedLanguage(_)
            | ProviderError::UnsupportedLanguagePair { .. }
            | ProviderError::VoiceNotFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ProviderError::EmptyText => StatusCode::INTERNAL_SERVER_ERROR,
            ProviderError::Auth(_)
            | ProviderError::ServiceUnavailable(_)
            | ProviderError::QuotaExceeded(_)
            | ProviderError::Rejected(_)
            | ProviderError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        },
    }
}
