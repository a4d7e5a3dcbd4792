//! Prometheus metrics recording and endpoint.

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use voxlate_pipeline::PipelineOutcome;

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// `GET /metrics` rendering the recorder's current state.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || async move { handle.render() }))
}

/// Record one finished `/translate` request.
pub fn record_outcome(outcome: &PipelineOutcome) {
    match outcome {
        Ok(speech) => {
            let label = if speech.no_speech { "no_speech" } else { "ok" };
            metrics::counter!("translate_requests_total", "outcome" => label).increment(1);
            for timing in &speech.timings {
                metrics::histogram!(
                    "pipeline_stage_duration_seconds",
                    "stage" => timing.stage.as_str()
                )
                .record(timing.elapsed.as_secs_f64());
            }
        }
        Err(e) => {
            metrics::counter!("translate_requests_total", "outcome" => "error").increment(1);
            metrics::counter!(
                "pipeline_failures_total",
                "stage" => e.stage.as_str(),
                "kind" => e.kind()
            )
            .increment(1);
        }
    }
}

/// Record a request rejected before the pipeline ran (unreadable or non-JSON body).
pub fn record_rejected() {
    metrics::counter!("translate_requests_total", "outcome" => "error").increment(1);
    metrics::counter!(
        "pipeline_failures_total",
        "stage" => "Validating",
        "kind" => "ValidationError"
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use voxlate_pipeline::{Stage, StageError};

    use super::*;

    #[test]
    fn test_install_prometheus_recorder() {
        // Only one recorder per process; this is the only test that installs one
        let handle = install_prometheus_recorder().unwrap();
        record_outcome(&Err(StageError::validation("x")));
        let output = handle.render();
        assert!(output.contains("translate_requests_total"));
    }

    #[test]
    fn test_record_outcome_does_not_panic() {
        record_outcome(&Err(StageError::cancelled(Stage::Recognizing)));
        record_rejected();
    }
}
