//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Model gateway returned an error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Model gateway unreachable or not responding
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Model gateway throttled the request
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Tool not found in registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments did not match the tool's declared parameters
    #[error("invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    /// Tool failed while executing
    #[error("tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    pub fn invalid_arguments(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::GatewayUnavailable(_) | AgentError::RateLimited(_) | AgentError::Io(_)
        )
    }

    /// Check if error came from the model transport
    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            AgentError::Gateway(_) | AgentError::GatewayUnavailable(_) | AgentError::RateLimited(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Gateway(_) => "The AI service encountered an error.".into(),
            AgentError::GatewayUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            AgentError::RateLimited(_) => "Too many requests. Please wait a moment.".into(),
            AgentError::UnknownTool(name) => format!("The tool '{name}' is not available."),
            AgentError::InvalidArguments { tool, .. } => {
                format!("The tool '{tool}' was called with invalid input.")
            }
            AgentError::ToolExecution { tool, .. } => format!("The tool '{tool}' failed."),
            AgentError::Config(_) => "The agent is misconfigured.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_errors_are_distinguishable() {
        let bad_args = AgentError::invalid_arguments("calculator", "missing required parameter 'expression'");
        let internal = AgentError::tool_execution("calculator", "overflow");

        assert!(bad_args.to_string().starts_with("invalid arguments for tool 'calculator':"));
        assert!(internal.to_string().starts_with("tool 'calculator' failed:"));
    }

    #[test]
    fn test_retryable() {
        assert!(AgentError::RateLimited("429".into()).is_retryable());
        assert!(!AgentError::UnknownTool("x".into()).is_retryable());
        assert!(AgentError::GatewayUnavailable("down".into()).is_gateway());
    }
}
