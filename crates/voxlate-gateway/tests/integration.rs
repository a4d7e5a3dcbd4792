//! Gateway integration tests: start a real server on a free port and call it over HTTP.
//!
//! Run with: `cargo test -p voxlate-gateway --test integration`

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use voxlate_core::config::Config;
use voxlate_media::AudioFormat;
use voxlate_media::codec::{decode_wav, encode, encode_base64};
use voxlate_pipeline::Pipeline;
use voxlate_providers::stub::{StubRecognizer, StubSynthesizer, StubTranslator};
use voxlate_providers::{Collaborators, ProviderError};

/// Find an available port.
fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

struct TestGateway {
    state: Arc<voxlate_gateway::GatewayState>,
    base: String,
    translator: Arc<StubTranslator>,
    synthesizer: Arc<StubSynthesizer>,
}

/// Start a stub-backed gateway and wait until `/health` answers.
async fn start_test_gateway(translator: StubTranslator) -> TestGateway {
    let port = find_free_port();
    let config = Config::parse(r#"{ server: { bind: "127.0.0.1" } }"#).unwrap();

    let translator = Arc::new(translator);
    let synthesizer = Arc::new(StubSynthesizer::new());
    let collaborators = Collaborators::new(
        Arc::new(StubRecognizer::new("Where is the train station?")),
        translator.clone(),
        synthesizer.clone(),
    );
    let pipeline = Pipeline::from_config(&config, collaborators);
    let state = Arc::new(voxlate_gateway::GatewayState::new(Arc::new(config), pipeline));

    let state_clone = state.clone();
    tokio::spawn(async move {
        let _ = voxlate_gateway::start_gateway(state_clone, port).await;
    });

    let base = format!("http://127.0.0.1:{port}");
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if reqwest::get(format!("{base}/health")).await.is_ok() {
            break;
        }
    }

    TestGateway {
        state,
        base,
        translator,
        synthesizer,
    }
}

fn wav_b64(amplitude: i32) -> String {
    let samples: Vec<i32> = (0..16_000)
        .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
        .collect();
    encode_base64(&encode(&samples, AudioFormat::SPEECH_16K).unwrap())
}

fn body(target: &str, voice: &str, audio_data: String) -> serde_json::Value {
    json!({
        "source_language": "English",
        "target_language": target,
        "neural_voice": voice,
        "audio_data": audio_data,
    })
}

async fn post(gw: &TestGateway, body: &serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/translate", gw.base))
        .json(body)
        .send()
        .await
        .expect("translate request failed")
}

#[tokio::test]
async fn test_health_endpoint() {
    let gw = start_test_gateway(StubTranslator::new()).await;

    let resp = reqwest::get(format!("{}/health", gw.base))
        .await
        .expect("Health request failed");

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert!(body["uptime_secs"].is_u64());
}

#[tokio::test]
async fn test_english_to_french_returns_speech() {
    let gw = start_test_gateway(StubTranslator::new()).await;

    let resp = post(&gw, &body("French", "Female Voice 1", wav_b64(3_000))).await;

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "audio/wav");
    assert_eq!(resp.headers()["x-voxlate-no-speech"], "false");
    let bytes = resp.bytes().await.unwrap();
    let audio = decode_wav(&bytes).unwrap();
    assert_eq!(audio.format, AudioFormat::SPEECH_16K);
    assert!(!audio.is_empty());
    assert_eq!(gw.synthesizer.voices(), vec!["fr-FR-DeniseNeural"]);
}

#[tokio::test]
async fn test_invalid_base64_is_rejected_at_decoding() {
    let gw = start_test_gateway(StubTranslator::new()).await;

    let resp = post(&gw, &body("French", "Female Voice 1", "@@ not base64 @@".into())).await;

    assert_eq!(resp.status(), 400);
    let err: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(err["stage"], "Decoding");
    assert!(err["error"].is_string());
}

#[tokio::test]
async fn test_silence_returns_empty_wav_without_downstream_calls() {
    let gw = start_test_gateway(StubTranslator::new()).await;

    let resp = post(&gw, &body("French", "Female Voice 1", wav_b64(0))).await;

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-voxlate-no-speech"], "true");
    let bytes = resp.bytes().await.unwrap();
    assert!(decode_wav(&bytes).unwrap().is_empty());
    assert_eq!(gw.translator.calls(), 0);
    assert_eq!(gw.synthesizer.calls(), 0);
}

#[tokio::test]
async fn test_unsupported_target_is_422() {
    let gw = start_test_gateway(StubTranslator::new()).await;

    let resp = post(&gw, &body("Klingon", "Female Voice 1", wav_b64(3_000))).await;

    assert_eq!(resp.status(), 422);
    let err: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(err["stage"], "Translating");
    assert_eq!(gw.synthesizer.calls(), 0);
}

#[tokio::test]
async fn test_translator_outage_is_502_at_translating() {
    let gw = start_test_gateway(StubTranslator::failing(ProviderError::ServiceUnavailable(
        "HTTP 503".into(),
    )))
    .await;

    let resp = post(&gw, &body("French", "Female Voice 1", wav_b64(3_000))).await;

    assert_eq!(resp.status(), 502);
    let err: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(err["stage"], "Translating");
    assert_eq!(err["kind"], "ServiceUnavailable");
    assert_eq!(gw.translator.calls(), 1);
    assert_eq!(gw.synthesizer.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_are_isolated() {
    let gw = Arc::new(start_test_gateway(StubTranslator::new()).await);

    let mut handles = Vec::new();
    for (target, voice) in [
        ("French", "Male Voice 1"),
        ("German", "Female Voice 1"),
        ("Spanish", "Male Voice 2"),
        ("Italian", "Female Voice 2"),
    ] {
        let gw = gw.clone();
        handles.push(tokio::spawn(async move {
            let resp = post(&gw, &body(target, voice, wav_b64(3_000))).await;
            (resp.status().as_u16(), resp.bytes().await.unwrap())
        }));
    }

    let mut outputs = Vec::new();
    for handle in handles {
        let (status, bytes) = handle.await.unwrap();
        assert_eq!(status, 200);
        outputs.push(bytes);
    }
    // Each target renders different translated text, so no two responses match
    for (i, a) in outputs.iter().enumerate() {
        for b in &outputs[i + 1..] {
            assert_ne!(a, b);
        }
    }
    assert_eq!(gw.synthesizer.calls(), 4);
}

#[tokio::test]
async fn test_shutdown_token_stops_server() {
    let gw = start_test_gateway(StubTranslator::new()).await;

    gw.state.shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let result = reqwest::get(format!("{}/health", gw.base)).await;
    assert!(result.is_err());
}
