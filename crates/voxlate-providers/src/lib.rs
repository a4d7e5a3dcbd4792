//! Collaborator abstraction for the translation pipeline.
//!
//! The pipeline reaches its three external capabilities through the
//! [`Recognizer`], [`Translator`], and [`Synthesizer`] traits. Cloud-backed
//! adapters (Azure Speech, Azure Translator) and deterministic stubs both
//! implement them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use voxlate_media::DecodedAudio;

pub mod error;
pub mod retry;
pub mod stub;

#[cfg(feature = "azure")]
pub mod azure_speech;

#[cfg(feature = "azure")]
pub mod azure_translator;

pub use error::ProviderError;
pub use retry::RetryPolicy;

/// Whether the recognizer heard anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionStatus {
    Recognized,
    NoSpeech,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    pub text: String,
    pub status: RecognitionStatus,
}

impl RecognitionResult {
    pub fn recognized(text: impl Into<String>) -> Self {
        let text = text.into();
        let status = if text.trim().is_empty() {
            RecognitionStatus::NoSpeech
        } else {
            RecognitionStatus::Recognized
        };
        Self { text, status }
    }

    pub fn no_speech() -> Self {
        Self {
            text: String::new(),
            status: RecognitionStatus::NoSpeech,
        }
    }

    /// True when there is nothing worth translating.
    pub fn is_empty(&self) -> bool {
        self.status == RecognitionStatus::NoSpeech || self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub text: String,
    /// Source language reported by the service, when it detects one.
    pub detected_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisResult {
    pub audio: DecodedAudio,
}

/// Speech recognition (audio → text).
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Collaborator identifier (e.g., "azure-speech", "stub").
    fn id(&self) -> &str;

    /// Recognize speech in `audio`, spoken in `locale` (e.g. "en-US").
    ///
    /// No detectable speech is a successful, empty result.
    async fn recognize(
        &self,
        audio: &DecodedAudio,
        locale: &str,
    ) -> Result<RecognitionResult, ProviderError>;
}

/// Text translation (text → text).
#[async_trait]
pub trait Translator: Send + Sync {
    fn id(&self) -> &str;

    /// Translate `text` between Translator language codes (e.g. "en" → "fr").
    async fn translate(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<TranslationResult, ProviderError>;
}

/// Speech synthesis (text → audio).
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn id(&self) -> &str;

    /// Synthesize `text` in `locale` with the service voice `voice`.
    async fn synthesize(
        &self,
        text: &str,
        locale: &str,
        voice: &str,
    ) -> Result<SynthesisResult, ProviderError>;
}

/// The capability set the pipeline runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub recognizer: Arc<dyn Recognizer>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl Collaborators {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            recognizer,
            translator,
            synthesizer,
        }
    }

    /// Azure-backed collaborators. One speech client serves both recognition and synthesis.
    #[cfg(feature = "azure")]
    pub fn azure(
        credentials: &voxlate_core::config::ServiceCredentials,
        speech: Option<&voxlate_core::config::SpeechConfig>,
        retry: RetryPolicy,
    ) -> Self {
        let speech = Arc::new(
            azure_speech::AzureSpeechClient::from_config(credentials, speech).with_retry(retry),
        );
        let translator = Arc::new(
            azure_translator::AzureTranslatorClient::from_credentials(credentials).with_retry(retry),
        );
        Self::new(speech.clone(), translator, speech)
    }

    /// Offline collaborators that need no credentials.
    pub fn stub(transcript: &str) -> Self {
        Self::new(
            Arc::new(stub::StubRecognizer::new(transcript)),
            Arc::new(stub::StubTranslator::new()),
            Arc::new(stub::StubSynthesizer::new()),
        )
    }

    /// Collaborator ids, for logging.
    pub fn describe(&self) -> String {
        format!(
            "recognizer={} translator={} synthesizer={}",
            self.recognizer.id(),
            self.translator.id(),
            self.synthesizer.id()
        )
    }
}
