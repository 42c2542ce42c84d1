//! Model Gateway
//!
//! The agent talks to a language model exclusively through [`ModelGateway`].
//! Transports (Gemini, OpenAI-compatible endpoints, test doubles) implement it;
//! retry and timeout policy belong to the implementation, not to the loop.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use manus_core::gateway::ModelGateway;
//!
//! let gateway: Arc<dyn ModelGateway> = Arc::new(GeminiGateway::from_env()?);
//! let agent = AgentBuilder::new().gateway(gateway).build()?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::message::{ToolRequest, Turn};
use crate::tool::CapabilityDescriptor;

/// Sampling configuration shared by planning and synthesis calls
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gemini-2.0-flash")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate in the synthesis pass
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    8192
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// One planning round: should the model call tools?
#[derive(Clone, Copy, Debug)]
pub struct DecisionRequest<'a> {
    pub transcript: &'a [Turn],
    pub capabilities: &'a [CapabilityDescriptor],
    pub system_directive: &'a str,
    pub options: &'a GenerationOptions,
}

/// The model's answer to a planning round
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Text remark or direct answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Requested invocations, in the order the model issued them
    #[serde(default)]
    pub tool_requests: Vec<ToolRequest>,
}

impl Decision {
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_requests: Vec::new(),
        }
    }

    pub fn call(requests: Vec<ToolRequest>) -> Self {
        Self {
            text: None,
            tool_requests: requests,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Text with blank strings treated as absent
    pub fn remark(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// One completion for the synthesis pass
#[derive(Clone, Copy, Debug)]
pub struct CompletionRequest<'a> {
    pub transcript: &'a [Turn],
    pub system_directive: &'a str,
    pub options: &'a GenerationOptions,
    /// The loop always sends `false` and awaits exactly one response object
    pub stream: bool,
}

/// Strategy trait for model transports
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Ask the model whether to call tools for the current transcript
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision>;

    /// Produce one completion; the raw response object is returned and its
    /// text is located by [`crate::extract::extract_text`]
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(opts.max_tokens, 8192);
        assert_eq!(opts.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_blank_remark_is_absent() {
        assert_eq!(Decision::answer("  \n").remark(), None);
        assert_eq!(Decision::answer("ok").remark(), Some("ok"));
    }
}
