//! E-Tutor · Grade 9 English Backend
//!
//! - Axum HTTP + WebSocket API (grammar check, quiz generation, chat tutor)
//! - Gemini `generateContent` as the model gateway
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   GEMINI_API_KEY      : model API key (falls back to API_KEY); checked on first call
//!   GEMINI_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL        : default "gemini-3-flash-preview"
//!   GEMINI_TIMEOUT_SECS : optional request timeout (transport default otherwise)
//!   AGENT_CONFIG_PATH   : path to TOML config (prompts + topic catalog)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod prompts;
mod schema;
mod parser;
mod gemini;
mod state;
mod protocol;
mod logic;
mod routes;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (Gemini client, prompts, topic catalog).
  let state = Arc::new(AppState::from_env()?);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "etutor_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    // Keep serving; the process can still be killed externally.
    tracing::error!(target: "etutor_backend", error = %e, "Failed to install Ctrl-C handler");
    std::future::pending::<()>().await;
  }
  info!(target: "etutor_backend", "Shutdown signal received");
}
