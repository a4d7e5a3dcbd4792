use std::fmt;

use serde::{Deserialize, Serialize};

/// How the translated audio is returned to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseEncoding {
    /// Raw `audio/wav` body.
    #[default]
    Wav,
    /// JSON body carrying base64 WAV, mirroring the request convention.
    Base64,
}

/// Inbound speech translation request.
///
/// Fields default to empty so that a missing field is reported by
/// [`TranslationRequest::missing_fields`] rather than as a JSON error.
/// `source_locale`/`target_locale` are accepted as aliases.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TranslationRequest {
    #[serde(default, alias = "source_locale")]
    pub source_language: String,

    #[serde(default, alias = "target_locale")]
    pub target_language: String,

    #[serde(default)]
    pub neural_voice: String,

    /// Base64-encoded WAV audio.
    #[serde(default)]
    pub audio_data: String,

    #[serde(default)]
    pub response_encoding: ResponseEncoding,
}

impl TranslationRequest {
    pub fn new(
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        neural_voice: impl Into<String>,
        audio_data: impl Into<String>,
    ) -> Self {
        Self {
            source_language: source_language.into(),
            target_language: target_language.into(),
            neural_voice: neural_voice.into(),
            audio_data: audio_data.into(),
            response_encoding: ResponseEncoding::default(),
        }
    }

    /// Names of required fields that are absent or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("source_language", &self.source_language),
            ("target_language", &self.target_language),
            ("neural_voice", &self.neural_voice),
            ("audio_data", &self.audio_data),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

// Audio payloads can be megabytes of base64; only their length is printed.
impl fmt::Debug for TranslationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationRequest")
            .field("source_language", &self.source_language)
            .field("target_language", &self.target_language)
            .field("neural_voice", &self.neural_voice)
            .field("audio_data_len", &self.audio_data.len())
            .field("response_encoding", &self.response_encoding)
            .finish()
    }
}
