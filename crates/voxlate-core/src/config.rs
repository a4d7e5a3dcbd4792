//! Configuration loading, validation, and credential resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoxlateError};

/// Top-level Voxlate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech: Option<SpeechConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub translator: Option<TranslatorConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<TimeoutsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// Extra or overriding entries for the built-in language catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<LanguageConfig>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Maximum accepted request body in bytes (default: 25 MiB).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    25 * 1024 * 1024
}

/// Azure Speech (recognition + synthesis) configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_env: Option<String>,

    /// Override for the recognition base URL (default derived from region).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stt_endpoint: Option<String>,

    /// Override for the synthesis base URL (default derived from region).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_endpoint: Option<String>,

    /// Synthesis output format (default: "riff-16khz-16bit-mono-pcm").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
}

impl SpeechConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
            .or_else(|| first_env(&["AZURE_SPEECH_KEY", "AZURE_SPEECH_API_KEY"]))
    }

    pub fn resolve_region(&self) -> Option<String> {
        resolve_secret_field(&self.region, &self.region_env)
            .or_else(|| first_env(&["AZURE_SPEECH_REGION", "AZURE_SPEECH_LOCATION"]))
    }
}

/// Azure Translator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_env: Option<String>,
    /// Resource region; only needed for regional or multi-service resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_env: Option<String>,
}

impl TranslatorConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
            .or_else(|| first_env(&["AZURE_TRANSLATE_KEY", "AZURE_TRANSLATOR_KEY"]))
    }

    pub fn resolve_endpoint(&self) -> Option<String> {
        resolve_secret_field(&self.endpoint, &self.endpoint_env)
            .or_else(|| {
                first_env(&[
                    "AZURE_TRANSLATE_ENDPOINT",
                    "AZURE_TRANSLATOR_ENDPOINT",
                    "AZURE_TRANSLATOR_URL",
                ])
            })
            .map(|e| e.trim_end_matches('/').to_string())
    }

    pub fn resolve_region(&self) -> Option<String> {
        resolve_secret_field(&self.region, &self.region_env)
            .or_else(|| {
                first_env(&[
                    "AZURE_TRANSLATE_REGION",
                    "AZURE_TRANSLATOR_REGION",
                    "AZURE_TRANSLATOR_LOCATION",
                ])
            })
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
    }
}

/// Per-stage collaborator timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_recognition_ms")]
    pub recognition_ms: u64,
    #[serde(default = "default_translation_ms")]
    pub translation_ms: u64,
    #[serde(default = "default_synthesis_ms")]
    pub synthesis_ms: u64,
}

fn default_recognition_ms() -> u64 {
    15_000
}

fn default_translation_ms() -> u64 {
    5_000
}

fn default_synthesis_ms() -> u64 {
    15_000
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            recognition_ms: default_recognition_ms(),
            translation_ms: default_translation_ms(),
            synthesis_ms: default_synthesis_ms(),
        }
    }
}

/// Adapter-level retry of transient collaborator failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Extra attempts after the first failure (0 disables retries).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    1
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// A language entry supplied through config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Display name, e.g. "English".
    pub name: String,
    /// Speech locale, e.g. "en-US".
    pub locale: String,
    /// Translator code; defaults to the locale's language subtag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translator_code: Option<String>,
    #[serde(default)]
    pub voices: Vec<VoiceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Display label, e.g. "Female Voice 1".
    pub label: String,
    /// Service voice name, e.g. "en-US-JennyNeural".
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "voxlate_pipeline=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Credentials for the external services, resolved once at startup.
#[derive(Clone)]
pub struct ServiceCredentials {
    pub speech_key: String,
    pub speech_region: String,
    pub translator_key: String,
    pub translator_endpoint: String,
    pub translator_region: Option<String>,
}

impl ServiceCredentials {
    /// Resolve every required option, failing with the full list of what is missing.
    pub fn resolve(config: &Config) -> Result<Self> {
        let speech = config.speech.clone().unwrap_or_default();
        let translator = config.translator.clone().unwrap_or_default();

        let speech_key = speech.resolve_api_key();
        let speech_region = speech.resolve_region();
        let translator_key = translator.resolve_api_key();
        let translator_endpoint = translator.resolve_endpoint();

        let mut missing = Vec::new();
        if speech_key.is_none() {
            missing.push("speech.api_key (or AZURE_SPEECH_KEY)".to_string());
        }
        if speech_region.is_none() {
            missing.push("speech.region (or AZURE_SPEECH_REGION)".to_string());
        }
        if translator_key.is_none() {
            missing.push("translator.api_key (or AZURE_TRANSLATOR_KEY)".to_string());
        }
        if translator_endpoint.is_none() {
            missing.push("translator.endpoint (or AZURE_TRANSLATOR_ENDPOINT)".to_string());
        }

        match (speech_key, speech_region, translator_key, translator_endpoint) {
            (Some(speech_key), Some(speech_region), Some(translator_key), Some(translator_endpoint)) => {
                Ok(Self {
                    speech_key,
                    speech_region,
                    translator_key,
                    translator_endpoint,
                    translator_region: translator.resolve_region(),
                })
            }
            _ => Err(VoxlateError::MissingCredentials(missing)),
        }
    }
}

// Keys are never printed.
impl std::fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("speech_region", &self.speech_region)
            .field("translator_endpoint", &self.translator_endpoint)
            .field("translator_region", &self.translator_region)
            .finish_non_exhaustive()
    }
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    ///
    /// A missing file yields the default config, so env-only deployments work.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse config text (JSON5) after `${ENV_VAR}` substitution.
    pub fn parse(raw: &str) -> Result<Self> {
        let substituted = substitute_env_vars(raw);
        json5::from_str(&substituted).map_err(|e| VoxlateError::Config(e.to_string()))
    }

    /// Default config file path: `~/.voxlate/config.json`.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Expand `~` in a user-supplied config path.
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).as_ref())
    }

    pub fn server_port(&self) -> u16 {
        self.server.as_ref().map(|s| s.port).unwrap_or_else(default_port)
    }

    pub fn bind_addr(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn max_body_bytes(&self) -> usize {
        self.server
            .as_ref()
            .map(|s| s.max_body_bytes)
            .unwrap_or_else(default_max_body_bytes)
    }

    pub fn timeouts(&self) -> TimeoutsConfig {
        self.timeouts.clone().unwrap_or_default()
    }

    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts().recognition_ms)
    }

    pub fn translation_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts().translation_ms)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts().synthesis_ms)
    }

    pub fn retry(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Err(VoxlateError::MissingCredentials(missing)) = ServiceCredentials::resolve(self) {
            for option in missing {
                errors.push(format!("Missing required option: {option}"));
            }
        }

        if let Some(server) = &self.server {
            if server.port == 0 {
                errors.push("Server port cannot be 0".to_string());
            }
            if server.max_body_bytes == 0 {
                errors.push("server.max_body_bytes cannot be 0".to_string());
            }
        }

        let timeouts = self.timeouts();
        for (name, ms) in [
            ("recognition_ms", timeouts.recognition_ms),
            ("translation_ms", timeouts.translation_ms),
            ("synthesis_ms", timeouts.synthesis_ms),
        ] {
            if ms == 0 {
                errors.push(format!("timeouts.{name} cannot be 0"));
            } else if ms > 60_000 {
                warnings.push(format!("timeouts.{name} is {ms}ms; requests may hang for over a minute"));
            }
        }

        let retry = self.retry();
        if retry.initial_backoff_ms > retry.max_backoff_ms {
            warnings.push(format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                retry.initial_backoff_ms, retry.max_backoff_ms
            ));
        }

        if let Some(languages) = &self.languages {
            for lang in languages {
                if lang.name.trim().is_empty() || lang.locale.trim().is_empty() {
                    errors.push("Language entries need both a name and a locale".to_string());
                } else if lang.voices.is_empty() {
                    warnings.push(format!("Language '{}' has no voices configured", lang.name));
                }
            }
        }

        (warnings, errors)
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for Voxlate data: `~/.voxlate/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".voxlate")
}
