//! # manus-runtime
//!
//! Model gateways for the manus agent.
//!
//! ## Gateways
//!
//! - **Gemini** (default): `generateContent` with native function calling
//!
//! ## Usage
//!
//! ```rust,ignore
//! use manus_runtime::GeminiGateway;
//!
//! let gateway = GeminiGateway::from_env()?;
//! let agent = AgentBuilder::new()
//!     .gateway(Arc::new(gateway))
//!     .build()?;
//! ```

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiGateway};

// Re-export core types for convenience
pub use manus_core::{Agent, AgentBuilder, AgentError, ModelGateway, Result, Tool, ToolRegistry, Turn};
