//! Application State

use std::sync::Arc;

use manus_core::{AgentConfig, ModelGateway, ToolRegistry};

use crate::sessions::SessionStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Model gateway (Gemini, etc.)
    pub gateway: Arc<dyn ModelGateway>,

    /// Enabled built-in tools; each run gets its own clone
    pub tools: ToolRegistry,

    /// Loop settings applied to every run
    pub agent: AgentConfig,

    pub sessions: SessionStore,
}
