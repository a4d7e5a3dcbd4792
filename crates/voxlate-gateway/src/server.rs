//! Axum-based HTTP server.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use voxlate_core::types::{ResponseEncoding, TranslationRequest};
use voxlate_media::codec::encode_base64;
use voxlate_pipeline::{StageError, TranslatedSpeech};

use crate::error::ApiError;
use crate::state::GatewayState;

pub const NO_SPEECH_HEADER: &str = "x-voxlate-no-speech";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the router with all routes and layers.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let max_body = state.config.max_body_bytes();
    Router::new()
        .route("/translate", post(translate_handler))
        .route("/health", get(health_handler))
        .route("/languages", get(languages_handler))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl+C or `state.shutdown` is cancelled.
pub async fn start_gateway(state: Arc<GatewayState>, port: u16) -> anyhow::Result<()> {
    let bind_addr = state.config.bind_addr();
    let shutdown = state.shutdown.clone();

    #[allow(unused_mut)]
    let mut app = build_router(state.clone());

    #[cfg(feature = "metrics")]
    match crate::metrics::install_prometheus_recorder() {
        Ok(handle) => {
            app = app.merge(crate::metrics::router(handle));
            info!("Prometheus metrics available at /metrics");
        }
        Err(e) => warn!(%e, "Metrics recorder not installed, /metrics disabled"),
    }

    let addr = format!("{bind_addr}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        collaborators = %state.pipeline.collaborators().describe(),
        languages = state.pipeline.catalog().len(),
        "Gateway listening on {addr}"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

async fn translate_handler(
    State(state): State<Arc<GatewayState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = Uuid::new_v4().simple().to_string();
    let span = info_span!("translate", request_id = %request_id);

    let mut response = async {
        let body = match body {
            Ok(body) => body,
            Err(rejection) => {
                warn!(status = %rejection.status(), "Unreadable request body");
                #[cfg(feature = "metrics")]
                crate::metrics::record_rejected();
                return ApiError::unreadable_body(rejection.status(), rejection.body_text())
                    .into_response();
            }
        };

        let request: TranslationRequest = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                #[cfg(feature = "metrics")]
                crate::metrics::record_rejected();
                return ApiError::from(StageError::validation(format!(
                    "request body is not a valid JSON object: {e}"
                )))
                .into_response();
            }
        };

        // Cancelled on shutdown, or when this future is dropped because the client went away
        let cancel = state.shutdown.child_token();
        let _on_drop = cancel.clone().drop_guard();

        let outcome = state.pipeline.run(&request, &cancel).await;

        #[cfg(feature = "metrics")]
        crate::metrics::record_outcome(&outcome);

        match outcome {
            Ok(speech) => success_response(speech, request.response_encoding),
            Err(e) => ApiError::from(e).into_response(),
        }
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn success_response(speech: TranslatedSpeech, encoding: ResponseEncoding) -> Response {
    let no_speech = HeaderValue::from_static(if speech.no_speech { "true" } else { "false" });
    let no_speech_header = HeaderName::from_static(NO_SPEECH_HEADER);
    match encoding {
        ResponseEncoding::Wav => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("audio/wav")),
                (no_speech_header, no_speech),
            ],
            speech.wav,
        )
            .into_response(),
        ResponseEncoding::Base64 => (
            StatusCode::OK,
            [(no_speech_header, no_speech)],
            Json(json!({
                "audio_data": encode_base64(&speech.wav),
                "no_speech": speech.no_speech,
            })),
        )
            .into_response(),
    }
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime_secs(),
    }))
}

async fn languages_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(json!({ "languages": state.pipeline.catalog().languages() }))
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                warn!(%e, "Failed to install Ctrl+C handler, waiting for programmatic shutdown");
                shutdown.cancelled().await;
            }
        },
        _ = shutdown.cancelled() => info!("Shutdown requested"),
    }
    shutdown.cancel();
}
