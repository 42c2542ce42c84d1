//! Server Configuration

use std::str::FromStr;

use manus_core::{AgentConfig, GenerationOptions, ToolFailurePolicy};
use manus_tools::ToolsConfig;

/// Everything the server reads from the environment at startup
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
    pub memory: MemoryConfig,
}

/// Session memory settings
#[derive(Clone, Debug)]
pub struct MemoryConfig {
    pub enabled: bool,
    /// Exchanges (instruction + answer) kept per session
    pub max_history: usize,
    pub expire_hours: i64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_history: 5,
            expire_hours: 24,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = AgentConfig::default();
        let memory = MemoryConfig::default();

        let agent = AgentConfig {
            system_directive: var("MANUS_SYSTEM_PROMPT").unwrap_or(defaults.system_directive),
            max_steps: parsed("MANUS_MAX_STEPS")
                .filter(|&steps| steps > 0)
                .unwrap_or(defaults.max_steps),
            generation: GenerationOptions {
                model: var("MANUS_MODEL").unwrap_or(defaults.generation.model),
                temperature: parsed("MANUS_TEMPERATURE").unwrap_or(defaults.generation.temperature),
                max_tokens: parsed("MANUS_MAX_TOKENS").unwrap_or(defaults.generation.max_tokens),
            },
            failure_policy: if flag("MANUS_ABORT_ON_TOOL_FAILURE", false) {
                ToolFailurePolicy::AbortStep
            } else {
                ToolFailurePolicy::Continue
            },
            concurrent_tools: flag("MANUS_CONCURRENT_TOOLS", defaults.concurrent_tools),
        };

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            agent,
            tools: ToolsConfig::from_env(),
            memory: MemoryConfig {
                enabled: flag("MANUS_ENABLE_MEMORY", memory.enabled),
                max_history: parsed("MANUS_MAX_HISTORY").unwrap_or(memory.max_history),
                expire_hours: parsed("MANUS_MEMORY_EXPIRE_HOURS").unwrap_or(memory.expire_hours),
            },
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(name: &str) -> Option<T> {
    let raw = var(name)?;
    let value = raw.trim().parse().ok();
    if value.is_none() {
        tracing::warn!(var = name, value = %raw, "Ignoring unparsable setting");
    }
    value
}

fn flag(name: &str, default: bool) -> bool {
    match var(name).map(|v| v.trim().to_lowercase()).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
