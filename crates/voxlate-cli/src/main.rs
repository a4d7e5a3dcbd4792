use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use voxlate_core::config::{Config, ServiceCredentials};
use voxlate_core::types::TranslationRequest;
use voxlate_media::codec::encode_base64;
use voxlate_pipeline::Pipeline;
use voxlate_providers::{Collaborators, RetryPolicy};

mod logging;

/// Transcript the stub recognizer returns for any audio containing speech.
const STUB_TRANSCRIPT: &str = "This is a test of the speech translation pipeline.";

#[derive(Parser)]
#[command(
    name = "voxlate",
    about = "Speech-to-speech translation over Azure Speech and Translator",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (default: 8080)
        #[arg(long)]
        port: Option<u16>,

        /// Use offline stub collaborators instead of Azure
        #[arg(long)]
        stub: bool,
    },

    /// Translate a WAV file once and write the result
    Translate {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Source language (e.g. "English" or "en-US")
        #[arg(long)]
        from: String,

        /// Target language (e.g. "French" or "fr-FR")
        #[arg(long)]
        to: String,

        /// Voice label or service voice name
        #[arg(long, default_value = "Female Voice 1")]
        voice: String,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Use offline stub collaborators instead of Azure
        #[arg(long)]
        stub: bool,
    },

    /// List supported languages and voices
    Languages,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration with secrets redacted
    Show,
    /// Check configuration and credentials
    Validate,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(Config::expand_path)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    logging::init(&config.logging.clone().unwrap_or_default(), cli.verbose);

    match cli.command {
        Commands::Serve { port, stub } => {
            check_config(&config, stub)?;
            let port = port.unwrap_or_else(|| config.server_port());
            let collaborators = collaborators(&config, stub)?;
            let pipeline = Pipeline::from_config(&config, collaborators);
            let state = Arc::new(voxlate_gateway::GatewayState::new(Arc::new(config), pipeline));
            tracing::info!(port, stub, "Starting Voxlate gateway");
            voxlate_gateway::start_gateway(state, port).await?;
        }
        Commands::Translate {
            input,
            from,
            to,
            voice,
            output,
            stub,
        } => {
            check_config(&config, stub)?;
            let pipeline = Pipeline::from_config(&config, collaborators(&config, stub)?);
            translate_file(&pipeline, &input, &from, &to, &voice, &output).await?;
        }
        Commands::Languages => {
            let pipeline = Pipeline::from_config(&config, Collaborators::stub(STUB_TRANSCRIPT));
            for language in pipeline.catalog().languages() {
                println!(
                    "{} ({}, translator: {})",
                    language.name, language.locale, language.translator_code
                );
                for voice in &language.voices {
                    println!("    {:<16} {}", voice.label, voice.name);
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
            }
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for w in &warnings {
                    println!("warning: {w}");
                }
                for e in &errors {
                    println!("error: {e}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path.display());
                }
                println!("Configuration OK ({})", config_path.display());
            }
            ConfigAction::Init => {
                if config_path.exists() {
                    anyhow::bail!("{} already exists", config_path.display());
                }
                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                default_template().save(&config_path)?;
                println!("Wrote {}", config_path.display());
            }
        },
    }

    Ok(())
}

/// Log warnings; refuse to start on errors. Credentials are not needed in stub mode.
fn check_config(config: &Config, stub: bool) -> anyhow::Result<()> {
    let (warnings, errors) = config.validate();
    for w in &warnings {
        tracing::warn!("Config: {w}");
    }
    let errors: Vec<String> = errors
        .into_iter()
        .filter(|e| !(stub && e.starts_with("Missing required option")))
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }
    Ok(())
}

fn collaborators(config: &Config, stub: bool) -> anyhow::Result<Collaborators> {
    if stub {
        tracing::warn!("Using stub collaborators; no audio leaves this machine");
        return Ok(Collaborators::stub(STUB_TRANSCRIPT));
    }
    let credentials = ServiceCredentials::resolve(config)?;
    tracing::debug!(?credentials, "Resolved service credentials");
    Ok(Collaborators::azure(
        &credentials,
        config.speech.as_ref(),
        RetryPolicy::from_config(&config.retry()),
    ))
}

async fn translate_file(
    pipeline: &Pipeline,
    input: &Path,
    from: &str,
    to: &str,
    voice: &str,
    output: &Path,
) -> anyhow::Result<()> {
    let audio = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let request = TranslationRequest::new(from, to, voice, encode_base64(&audio));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let speech = pipeline.run(&request, &cancel).await?;

    tokio::fs::write(output, &speech.wav)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if speech.no_speech {
        println!("No speech detected; wrote silent WAV to {}", output.display());
    } else {
        println!("Heard:      {}", speech.transcript);
        if let Some(translation) = &speech.translation {
            println!("Translated: {translation}");
        }
        println!("Wrote {} bytes to {}", speech.wav.len(), output.display());
    }
    Ok(())
}

/// Copy of the config with every secret replaced.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if let Some(speech) = &mut config.speech {
        if speech.api_key.is_some() {
            speech.api_key = Some("********".into());
        }
    }
    if let Some(translator) = &mut config.translator {
        if translator.api_key.is_some() {
            translator.api_key = Some("********".into());
        }
    }
    config
}

/// Starter config: env-var references for secrets, defaults spelled out.
fn default_template() -> Config {
    Config::parse(
        r#"{
            server: { port: 8080, bind: "0.0.0.0" },
            speech: { api_key_env: "AZURE_SPEECH_KEY", region_env: "AZURE_SPEECH_REGION" },
            translator: {
                api_key_env: "AZURE_TRANSLATOR_KEY",
                endpoint: "https://api.cognitive.microsofttranslator.com",
                region_env: "AZURE_TRANSLATOR_REGION",
            },
            timeouts: {},
            retry: {},
            logging: {},
        }"#,
    )
    .unwrap_or_default()
}
