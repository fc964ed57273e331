//! Application state: model gateway, prompts, and the quiz topic catalog.
//!
//! Everything here is read-only after startup. Per-session data (chat
//! history, quiz attempts) lives in the WebSocket task or in the client,
//! never in shared state.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::config::{default_topics, load_agent_config_from_env, AgentConfig, GatewayConfig, Prompts};
use crate::domain::Topic;
use crate::error::Result;
use crate::gemini::{GeminiClient, ModelGateway};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn ModelGateway>,
    pub prompts: Prompts,
    pub topics: Vec<Topic>,
}

impl AppState {
    /// Build state from env: load TOML config, build the Gemini client.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self> {
        let cfg = load_agent_config_from_env().unwrap_or_default();

        let gw_cfg = GatewayConfig::from_env();
        let client = GeminiClient::new(&gw_cfg)?;
        if client.has_key() {
            info!(target: "etutor_backend", base_url = %client.base_url, model = %client.model, "Gemini enabled.");
        } else {
            error!(target: "etutor_backend", base_url = %client.base_url, model = %client.model, "GEMINI_API_KEY not set; model calls will fail with auth_error.");
        }

        Ok(Self::with_gateway(Arc::new(client), cfg))
    }

    /// Build state around any gateway (tests use stubs here).
    pub fn with_gateway(gateway: Arc<dyn ModelGateway>, cfg: AgentConfig) -> Self {
        let topics = if cfg.topics.is_empty() { default_topics() } else { cfg.topics };
        for t in &topics {
            if !(crate::domain::UNIT_MIN..=crate::domain::UNIT_MAX).contains(&t.unit) {
                error!(target: "quiz", unit = t.unit, title = %t.title, "Configured topic outside curriculum units");
            }
        }
        info!(target: "quiz", topics = topics.len(), "Topic catalog ready");

        Self { gateway, prompts: cfg.prompts, topics }
    }

    /// Curriculum unit for a topic title, if the catalog knows it.
    pub fn unit_for_topic(&self, title: &str) -> Option<i64> {
        self.topics.iter().find(|t| t.title == title).map(|t| t.unit)
    }
}
