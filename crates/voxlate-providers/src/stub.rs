//! Deterministic offline collaborators.
//!
//! Used by `serve --stub`, the CLI `translate --stub` path, and the test
//! suites. The recognizer still runs the energy check so silent input takes
//! the no-speech path exactly as it would against the cloud service.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use voxlate_media::speech::{DEFAULT_SPEECH_THRESHOLD, contains_speech};
use voxlate_media::{AudioFormat, DecodedAudio};

use crate::{
    ProviderError, RecognitionResult, Recognizer, SynthesisResult, Synthesizer, TranslationResult,
    Translator,
};

/// Shared failure and delay knobs.
#[derive(Default)]
struct Behavior {
    failure: Option<ProviderError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl Behavior {
    async fn enter(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

pub struct StubRecognizer {
    transcript: String,
    threshold: f64,
    behavior: Behavior,
}

impl StubRecognizer {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            threshold: DEFAULT_SPEECH_THRESHOLD,
            behavior: Behavior::default(),
        }
    }

    pub fn failing(err: ProviderError) -> Self {
        let mut stub = Self::new("");
        stub.behavior.failure = Some(err);
        stub
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.behavior.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.behavior.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for StubRecognizer {
    fn id(&self) -> &str {
        "stub"
    }

    async fn recognize(
        &self,
        audio: &DecodedAudio,
        _locale: &str,
    ) -> Result<RecognitionResult, ProviderError> {
        self.behavior.enter().await?;
        if !contains_speech(audio, self.threshold) {
            return Ok(RecognitionResult::no_speech());
        }
        Ok(RecognitionResult::recognized(self.transcript.clone()))
    }
}

/// Echoes the input tagged with the target code: `"[fr] Hello"`.
#[derive(Default)]
pub struct StubTranslator {
    behavior: Behavior,
}

impl StubTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(err: ProviderError) -> Self {
        Self {
            behavior: Behavior {
                failure: Some(err),
                ..Default::default()
            },
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.behavior.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.behavior.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for StubTranslator {
    fn id(&self) -> &str {
        "stub"
    }

    async fn translate(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<TranslationResult, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyText);
        }
        self.behavior.enter().await?;
        Ok(TranslationResult {
            text: format!("[{to}] {text}"),
            detected_language: Some(from.to_string()),
        })
    }
}

/// Renders text as a short tone sequence, one 10ms burst per byte.
#[derive(Default)]
pub struct StubSynthesizer {
    behavior: Behavior,
    voices: Mutex<Vec<String>>,
}

impl StubSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(err: ProviderError) -> Self {
        Self {
            behavior: Behavior {
                failure: Some(err),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.behavior.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.behavior.calls.load(Ordering::SeqCst)
    }

    /// Voices requested so far, in call order.
    pub fn voices(&self) -> Vec<String> {
        self.voices.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Deterministic PCM for `text` at 16 kHz.
pub fn render_tone(text: &str) -> DecodedAudio {
    let burst = AudioFormat::SPEECH_16K.sample_rate as usize / 100;
    let samples = text
        .bytes()
        .flat_map(|b| {
            let amplitude = 1_000 + i32::from(b) * 40;
            (0..burst).map(move |i| if i % 2 == 0 { amplitude } else { -amplitude })
        })
        .collect();
    DecodedAudio::new(AudioFormat::SPEECH_16K, samples)
}

#[async_trait]
impl Synthesizer for StubSynthesizer {
    fn id(&self) -> &str {
        "stub"
    }

    async fn synthesize(
        &self,
        text: &str,
        _locale: &str,
        voice: &str,
    ) -> Result<SynthesisResult, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyText);
        }
        self.voices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(voice.to_string());
        self.behavior.enter().await?;
        Ok(SynthesisResult {
            audio: render_tone(text),
        })
    }
}
