//! Pipeline stages and stage-attributed failures.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use voxlate_media::{DecodeError, EncodeError};
use voxlate_providers::ProviderError;

/// Pipeline states, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Validating,
    Decoding,
    Recognizing,
    Translating,
    Synthesizing,
    Encoding,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Validating,
        Stage::Decoding,
        Stage::Recognizing,
        Stage::Translating,
        Stage::Synthesizing,
        Stage::Encoding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "Validating",
            Stage::Decoding => "Decoding",
            Stage::Recognizing => "Recognizing",
            Stage::Translating => "Translating",
            Stage::Synthesizing => "Synthesizing",
            Stage::Encoding => "Encoding",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a failure is attributable to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// Bad input the caller can correct.
    Caller,
    /// A collaborator service failed or refused.
    Collaborator,
    /// A bug or invariant violation inside this process.
    Internal,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageCause {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("could not encode response audio: {0}")]
    Encode(#[from] EncodeError),

    #[error("request cancelled")]
    Cancelled,
}

impl StageCause {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Decode(_) => "DecodeError",
            Self::Provider(e) => e.kind(),
            Self::Encode(_) => "EncodeError",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn fault(&self) -> Fault {
        match self {
            Self::Validation(_) | Self::Decode(_) | Self::Cancelled => Fault::Caller,
            Self::Provider(e) if e.is_caller_correctable() => Fault::Caller,
            Self::Provider(ProviderError::EmptyText) => Fault::Internal,
            Self::Provider(_) => Fault::Collaborator,
            Self::Encode(_) => Fault::Internal,
        }
    }
}

/// A failure tagged with the stage that produced it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{stage} failed: {cause}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub cause: StageCause,
}

impl StageError {
    pub fn new(stage: Stage, cause: impl Into<StageCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(Stage::Validating, StageCause::Validation(message.into()))
    }

    pub fn cancelled(stage: Stage) -> Self {
        Self::new(stage, StageCause::Cancelled)
    }

    pub fn kind(&self) -> &'static str {
        self.cause.kind()
    }

    pub fn fault(&self) -> Fault {
        self.cause.fault()
    }

    pub fn is_caller_fault(&self) -> bool {
        self.fault() == Fault::Caller
    }
}
