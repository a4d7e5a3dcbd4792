//! Gateway shared state.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use voxlate_core::config::Config;
use voxlate_pipeline::Pipeline;

/// Shared state for all handlers. Immutable apart from the shutdown token.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub pipeline: Pipeline,
    /// Cancelled on shutdown; every request token is a child of it.
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(config: Arc<Config>, pipeline: Pipeline) -> Self {
        Self {
            config,
            pipeline,
            shutdown: CancellationToken::new(),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
