//! Azure Speech adapter: short-audio recognition and SSML synthesis over REST.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use voxlate_core::config::{ServiceCredentials, SpeechConfig};
use voxlate_media::{AudioFormat, DecodedAudio};
use voxlate_media::codec::decode_wav;

use crate::error::truncate_body;
use crate::retry::{RetryPolicy, with_retry};
use crate::{ProviderError, RecognitionResult, Recognizer, SynthesisResult, Synthesizer};

/// Synthesis output format requested from the service.
pub const DEFAULT_OUTPUT_FORMAT: &str = "riff-16khz-16bit-mono-pcm";

const STT_PATH: &str = "/speech/recognition/conversation/cognitiveservices/v1";
const TTS_PATH: &str = "/cognitiveservices/v1";
const USER_AGENT: &str = concat!("voxlate/", env!("CARGO_PKG_VERSION"));

pub struct AzureSpeechClient {
    client: reqwest::Client,
    api_key: String,
    stt_base: String,
    tts_base: String,
    output_format: String,
    retry: RetryPolicy,
}

/// Simple-format recognition response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
}

impl AzureSpeechClient {
    pub fn new(api_key: impl Into<String>, region: &str) -> Self {
        let region = region.trim();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            stt_base: format!("https://{region}.stt.speech.microsoft.com"),
            tts_base: format!("https://{region}.tts.speech.microsoft.com"),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(credentials: &ServiceCredentials, speech: Option<&SpeechConfig>) -> Self {
        let mut client = Self::new(credentials.speech_key.clone(), &credentials.speech_region);
        if let Some(speech) = speech {
            if let Some(url) = &speech.stt_endpoint {
                client = client.with_stt_endpoint(url);
            }
            if let Some(url) = &speech.tts_endpoint {
                client = client.with_tts_endpoint(url);
            }
            if let Some(format) = &speech.output_format {
                client.output_format = format.clone();
            }
        }
        client
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_stt_endpoint(mut self, base: &str) -> Self {
        self.stt_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_tts_endpoint(mut self, base: &str) -> Self {
        self.tts_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn stt_url(&self) -> String {
        format!("{}{STT_PATH}", self.stt_base)
    }

    pub fn tts_url(&self) -> String {
        format!("{}{TTS_PATH}", self.tts_base)
    }

    async fn recognize_once(
        &self,
        wav: &Bytes,
        sample_rate: u32,
        locale: &str,
    ) -> Result<RecognitionResult, ProviderError> {
        let resp = self
            .client
            .post(self.stt_url())
            .query(&[("language", locale), ("format", "simple")])
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header(
                "Content-Type",
                format!("audio/wav; codecs=audio/pcm; samplerate={sample_rate}"),
            )
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .body(wav.clone())
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::BAD_REQUEST && body.to_lowercase().contains("language") {
                return Err(ProviderError::UnsupportedLanguage(locale.to_string()));
            }
            return Err(ProviderError::from_status(status, &body));
        }

        let parsed: RecognitionResponse = resp.json().await.map_err(ProviderError::from_transport)?;
        debug!(status = %parsed.recognition_status, "Recognition response");

        match parsed.recognition_status.as_str() {
            "Success" => Ok(RecognitionResult::recognized(
                parsed.display_text.unwrap_or_default(),
            )),
            "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => Ok(RecognitionResult::no_speech()),
            "Error" => Err(ProviderError::ServiceUnavailable(
                "recognition service reported an internal error".into(),
            )),
            other => Err(ProviderError::InvalidResponse(format!(
                "unknown recognition status: {other}"
            ))),
        }
    }

    async fn synthesize_once(&self, ssml: &str, voice: &str) -> Result<SynthesisResult, ProviderError> {
        let resp = self
            .client
            .post(self.tts_url())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", &self.output_format)
            .header("User-Agent", USER_AGENT)
            .body(ssml.to_string())
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::BAD_REQUEST && body.to_lowercase().contains("voice") {
                return Err(ProviderError::VoiceNotFound(voice.to_string()));
            }
            return Err(ProviderError::from_status(status, &body));
        }

        let bytes = resp.bytes().await.map_err(ProviderError::from_transport)?;
        let audio = decode_wav(&bytes).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "synthesized audio is not PCM WAV ({e}); got {}",
                truncate_body(&String::from_utf8_lossy(&bytes[..bytes.len().min(64)]))
            ))
        })?;
        Ok(SynthesisResult { audio })
    }
}

#[async_trait]
impl Recognizer for AzureSpeechClient {
    fn id(&self) -> &str {
        "azure-speech"
    }

    async fn recognize(
        &self,
        audio: &DecodedAudio,
        locale: &str,
    ) -> Result<RecognitionResult, ProviderError> {
        // Short-audio recognition only accepts 16-bit mono PCM
        let converted;
        let audio = if audio.format == AudioFormat::SPEECH_16K {
            audio
        } else {
            converted = audio.clone().into_speech_format();
            &converted
        };
        let wav = audio
            .to_wav()
            .map(Bytes::from)
            .map_err(|e| ProviderError::Rejected(format!("could not re-encode audio: {e}")))?;
        debug!(
            locale,
            wav_bytes = wav.len(),
            duration_ms = audio.duration_ms(),
            "Sending audio for recognition"
        );
        let sample_rate = audio.format.sample_rate;
        with_retry(&self.retry, "recognize", || {
            self.recognize_once(&wav, sample_rate, locale)
        })
        .await
    }
}

#[async_trait]
impl Synthesizer for AzureSpeechClient {
    fn id(&self) -> &str {
        "azure-speech"
    }

    async fn synthesize(
        &self,
        text: &str,
        locale: &str,
        voice: &str,
    ) -> Result<SynthesisResult, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyText);
        }
        let ssml = build_ssml(text, locale, voice);
        debug!(locale, voice, chars = text.chars().count(), "Requesting synthesis");
        with_retry(&self.retry, "synthesize", || self.synthesize_once(&ssml, voice)).await
    }
}

/// Single-voice SSML document for `text`.
pub fn build_ssml(text: &str, locale: &str, voice: &str) -> String {
    format!(
        "<speak version='1.0' xml:lang='{lang}'><voice xml:lang='{lang}' name='{name}'>{body}</voice></speak>",
        lang = escape_xml(locale),
        name = escape_xml(voice),
        body = escape_xml(text),
    )
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
