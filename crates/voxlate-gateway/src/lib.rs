//! HTTP gateway for the speech translation pipeline.
//!
//! Exposes `POST /translate`, `GET /health`, `GET /languages`, and with the
//! `metrics` feature `GET /metrics`. Each translate request runs the pipeline
//! under a cancellation token derived from the server's shutdown token.

pub mod error;
pub mod server;
pub mod state;

#[cfg(feature = "metrics")]
pub mod metrics;

pub use server::{build_router, start_gateway};
pub use state::GatewayState;
