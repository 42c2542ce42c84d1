//! # manus-core
//!
//! Tool-augmented reasoning loop with a pluggable model gateway.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Agent                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  Reasoning  │  │    Tool     │  │   ModelGateway      │  │
//! │  │    Loop     │──│   Registry  │──│   (Strategy)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop plans with the gateway, dispatches requested tools through the
//! registry, folds results back into the transcript, and finishes with either
//! the model's direct answer or a dedicated synthesis pass.

pub mod error;
pub mod extract;
pub mod gateway;
pub mod message;
pub mod reasoning;
pub mod tool;

#[cfg(test)]
mod testing;

pub use error::{AgentError, Result};
pub use extract::extract_text;
pub use gateway::{CompletionRequest, Decision, DecisionRequest, GenerationOptions, ModelGateway};
pub use message::{Content, Part, Role, ToolRequest, Turn};
pub use reasoning::{
    Agent, AgentBuilder, AgentConfig, ExhaustReason, RunOutput, Termination, ToolFailurePolicy,
};
pub use tool::{CapabilityDescriptor, ParameterSpec, Tool, ToolArgs, ToolOutcome, ToolRegistry, ToolSpec};
