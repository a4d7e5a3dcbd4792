//! The request-scoped stage machine.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use voxlate_core::config::Config;
use voxlate_core::languages::LanguageCatalog;
use voxlate_core::types::TranslationRequest;
use voxlate_media::AudioFormat;
use voxlate_media::codec;
use voxlate_providers::{Collaborators, ProviderError};

use crate::stage::{Stage, StageError};

/// Upper bound on each collaborator call, retries included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub recognition: Duration,
    pub translation: Duration,
    pub synthesis: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl StageTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            recognition: config.recognition_timeout(),
            translation: config.translation_timeout(),
            synthesis: config.synthesis_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed: Duration,
}

/// Successful pipeline output.
#[derive(Debug, Clone)]
pub struct TranslatedSpeech {
    /// Complete RIFF/WAVE file.
    pub wav: Vec<u8>,
    /// Recognition heard nothing; `wav` is header-only silence.
    pub no_speech: bool,
    pub transcript: String,
    pub translation: Option<String>,
    pub timings: Vec<StageTiming>,
}

pub type PipelineOutcome = Result<TranslatedSpeech, StageError>;

/// Drives one request through decode, recognize, translate, synthesize, encode.
///
/// Holds only shared, immutable collaborators and configuration; every
/// intermediate value lives on the stack of a single [`Pipeline::run`].
#[derive(Clone)]
pub struct Pipeline {
    collaborators: Collaborators,
    catalog: Arc<LanguageCatalog>,
    timeouts: StageTimeouts,
}

impl Pipeline {
    pub fn new(
        collaborators: Collaborators,
        catalog: Arc<LanguageCatalog>,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            collaborators,
            catalog,
            timeouts,
        }
    }

    /// Pipeline with the config's language overrides and timeouts.
    pub fn from_config(config: &Config, collaborators: Collaborators) -> Self {
        let catalog = match &config.languages {
            Some(overrides) => LanguageCatalog::with_overrides(overrides),
            None => LanguageCatalog::builtin(),
        };
        Self::new(
            collaborators,
            Arc::new(catalog),
            StageTimeouts::from_config(config),
        )
    }

    pub fn catalog(&self) -> &Arc<LanguageCatalog> {
        &self.catalog
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn timeouts(&self) -> StageTimeouts {
        self.timeouts
    }

    /// Run one request to completion, failure, or cancellation.
    pub async fn run(
        &self,
        request: &TranslationRequest,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        let started = Instant::now();
        let outcome = self.run_stages(request, cancel).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(speech) => info!(
                elapsed_ms,
                no_speech = speech.no_speech,
                wav_bytes = speech.wav.len(),
                "Pipeline complete"
            ),
            Err(e) => warn!(
                elapsed_ms,
                stage = %e.stage,
                kind = e.kind(),
                fault = ?e.fault(),
                error = %e.cause,
                "Pipeline failed"
            ),
        }
        outcome
    }

    async fn run_stages(
        &self,
        request: &TranslationRequest,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        let mut timings = Vec::with_capacity(Stage::ALL.len());

        // Validating
        let missing = request.missing_fields();
        if !missing.is_empty() {
            return Err(StageError::validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }
        debug!(
            stage = %Stage::Validating,
            source = %request.source_language,
            target = %request.target_language,
            voice = %request.neural_voice,
            audio_b64_len = request.audio_data.len(),
            "Request valid"
        );

        // Decoding
        checkpoint(Stage::Decoding, cancel)?;
        let clock = Instant::now();
        let decoded = codec::decode(&request.audio_data)
            .map_err(|e| StageError::new(Stage::Decoding, e))?;
        debug!(
            stage = %Stage::Decoding,
            sample_rate = decoded.format.sample_rate,
            bits = decoded.format.bits_per_sample,
            channels = decoded.format.channels,
            duration_ms = decoded.duration_ms(),
            "Audio decoded"
        );
        let audio = decoded.into_speech_format();
        record(&mut timings, Stage::Decoding, clock);

        // Recognizing
        let source = self.catalog.resolve(&request.source_language).ok_or_else(|| {
            StageError::new(
                Stage::Recognizing,
                ProviderError::UnsupportedLanguage(request.source_language.trim().to_string()),
            )
        })?;
        if audio.is_empty() {
            info!(
                stage = %Stage::Recognizing,
                "Audio has no samples, skipping recognition"
            );
            return no_speech(timings, cancel);
        }
        let clock = Instant::now();
        let recognized = guard(
            Stage::Recognizing,
            self.timeouts.recognition,
            cancel,
            self.collaborators.recognizer.recognize(&audio, &source.locale),
        )
        .await?;
        record(&mut timings, Stage::Recognizing, clock);
        drop(audio);

        if recognized.is_empty() {
            info!(
                stage = %Stage::Recognizing,
                locale = %source.locale,
                "No speech detected, skipping translation and synthesis"
            );
            return no_speech(timings, cancel);
        }
        debug!(
            stage = %Stage::Recognizing,
            locale = %source.locale,
            chars = recognized.text.chars().count(),
            "Speech recognized"
        );

        // Translating
        let target = self.catalog.resolve(&request.target_language).ok_or_else(|| {
            StageError::new(
                Stage::Translating,
                ProviderError::UnsupportedLanguagePair {
                    from: source.translator_code.clone(),
                    to: request.target_language.trim().to_string(),
                },
            )
        })?;
        // Voice resolves with the target, before the translation call
        let voice = target.resolve_voice(&request.neural_voice).ok_or_else(|| {
            StageError::new(
                Stage::Synthesizing,
                ProviderError::VoiceNotFound(format!(
                    "{} is not a {} voice",
                    request.neural_voice.trim(),
                    target.name
                )),
            )
        })?;
        let clock = Instant::now();
        let translated = guard(
            Stage::Translating,
            self.timeouts.translation,
            cancel,
            self.collaborators.translator.translate(
                &recognized.text,
                &source.translator_code,
                &target.translator_code,
            ),
        )
        .await?;
        record(&mut timings, Stage::Translating, clock);
        debug!(
            stage = %Stage::Translating,
            from = %source.translator_code,
            to = %target.translator_code,
            chars = translated.text.chars().count(),
            "Text translated"
        );

        // Synthesizing
        let clock = Instant::now();
        let synthesized = guard(
            Stage::Synthesizing,
            self.timeouts.synthesis,
            cancel,
            self.collaborators
                .synthesizer
                .synthesize(&translated.text, &target.locale, &voice),
        )
        .await?;
        record(&mut timings, Stage::Synthesizing, clock);
        debug!(
            stage = %Stage::Synthesizing,
            voice = %voice,
            duration_ms = synthesized.audio.duration_ms(),
            "Speech synthesized"
        );

        // Encoding
        checkpoint(Stage::Encoding, cancel)?;
        let clock = Instant::now();
        let wav = synthesized
            .audio
            .to_wav()
            .map_err(|e| StageError::new(Stage::Encoding, e))?;
        record(&mut timings, Stage::Encoding, clock);

        Ok(TranslatedSpeech {
            wav,
            no_speech: false,
            transcript: recognized.text,
            translation: Some(translated.text),
            timings,
        })
    }
}

/// Header-only WAV for a request in which nothing was said.
fn no_speech(timings: Vec<StageTiming>, cancel: &CancellationToken) -> PipelineOutcome {
    checkpoint(Stage::Encoding, cancel)?;
    let wav = codec::silence(AudioFormat::SPEECH_16K)
        .map_err(|e| StageError::new(Stage::Encoding, e))?;
    Ok(TranslatedSpeech {
        wav,
        no_speech: true,
        transcript: String::new(),
        translation: None,
        timings,
    })
}

fn record(timings: &mut Vec<StageTiming>, stage: Stage, since: Instant) {
    timings.push(StageTiming {
        stage,
        elapsed: since.elapsed(),
    });
}

/// Fail with `Cancelled` at `stage` if the request was already aborted.
fn checkpoint(stage: Stage, cancel: &CancellationToken) -> Result<(), StageError> {
    if cancel.is_cancelled() {
        return Err(StageError::cancelled(stage));
    }
    Ok(())
}

/// Await a collaborator call under the stage timeout, racing cancellation.
async fn guard<T, F>(
    stage: Stage,
    limit: Duration,
    cancel: &CancellationToken,
    call: F,
) -> Result<T, StageError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StageError::cancelled(stage)),
        result = tokio::time::timeout(limit, call) => match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StageError::new(stage, e)),
            Err(_) => Err(StageError::new(
                stage,
                ProviderError::ServiceUnavailable(format!(
                    "no response within {}ms",
                    limit.as_millis()
                )),
            )),
        },
    }
}
