//! Collaborator failure taxonomy.

use reqwest::StatusCode;
use thiserror::Error;

/// Maximum characters of a service error body kept in an error message.
const MAX_BODY_CHARS: usize = 200;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("language not supported: {0}")]
    UnsupportedLanguage(String),

    #[error("language pair not supported: {from} -> {to}")]
    UnsupportedLanguagePair { from: String, to: String },

    #[error("voice not found: {0}")]
    VoiceNotFound(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("request rejected by service: {0}")]
    Rejected(String),

    #[error("unexpected response from service: {0}")]
    InvalidResponse(String),

    #[error("refusing to call the service with empty text")]
    EmptyText,
}

impl ProviderError {
    /// Stable kind label used in error bodies, logs, and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "AuthError",
            Self::UnsupportedLanguage(_) => "UnsupportedLanguage",
            Self::UnsupportedLanguagePair { .. } => "UnsupportedLanguagePair",
            Self::VoiceNotFound(_) => "VoiceNotFoundError",
            Self::ServiceUnavailable(_) => "ServiceUnavailable",
            Self::QuotaExceeded(_) => "QuotaExceeded",
            Self::Rejected(_) => "RequestRejected",
            Self::InvalidResponse(_) => "InvalidResponse",
            Self::EmptyText => "EmptyText",
        }
    }

    /// Only transient failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }

    /// Failures the caller can fix by changing the request.
    pub fn is_caller_correctable(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedLanguage(_) | Self::UnsupportedLanguagePair { .. } | Self::VoiceNotFound(_)
        )
    }

    /// Map a transport-level failure. The URL is dropped from the message.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::InvalidResponse(err.without_url().to_string());
        }
        let reason = if err.is_timeout() {
            "request timed out"
        } else if err.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        Self::ServiceUnavailable(format!("{reason}: {}", err.without_url()))
    }

    /// Default mapping of a non-success HTTP status.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status.as_u16(), truncate_body(body));
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Auth(detail),
            StatusCode::TOO_MANY_REQUESTS => Self::QuotaExceeded(detail),
            StatusCode::REQUEST_TIMEOUT => Self::ServiceUnavailable(detail),
            s if s.is_server_error() => Self::ServiceUnavailable(detail),
            _ => Self::Rejected(detail),
        }
    }
}

/// Trim a service error body to something log- and response-safe.
pub fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_BODY_CHARS {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_BODY_CHARS).collect();
        format!("{cut}…")
    }
}
