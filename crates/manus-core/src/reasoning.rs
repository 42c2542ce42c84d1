//! Reasoning Loop
//!
//! Bounded plan/act loop. Each step asks the gateway for a decision; requested
//! tools are dispatched and their results folded back as one assistant turn
//! plus one tool turn. A direct text answer ends the run immediately;
//! otherwise, once the step budget is spent (or the model gives up), a
//! synthesis pass writes the final answer.
//!
//! ```text
//!  PLANNING ──text only──────────────────────────────► ANSWERED ─┐
//!     │  ▲                                                       │
//!  tools│  │next step                                            ▼
//!     ▼  │                                                     DONE
//!  EXECUTING          gateway error / no action / budget ─► EXHAUSTED
//!                                                               │
//!                                                          SYNTHESIZING ─► DONE
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::extract::extract_text;
use crate::gateway::{CompletionRequest, Decision, DecisionRequest, GenerationOptions, ModelGateway};
use crate::message::{ToolRequest, Turn};
use crate::tool::{CapabilityDescriptor, Tool, ToolOutcome, ToolRegistry};

const DEFAULT_SYSTEM_DIRECTIVE: &str = "You are a capable AI assistant that can use a variety of tools to solve problems. \
Analyze the user's question carefully, decide whether tools are needed, and produce a detailed final answer.";

const SYNTHESIS_PROMPT: &str =
    "Based on the conversation and tool results above, write the final, complete, user-friendly answer.";

/// Substituted when the synthesis call itself fails
pub const SYNTHESIS_FAILED_ANSWER: &str =
    "Sorry, something went wrong while writing the final reply. Please try again.";

/// Substituted when the synthesis reply carries no usable text
pub const NO_REPLY_ANSWER: &str = "Sorry, I could not produce a valid reply.";

const SKIPPED_AFTER_FAILURE: &str = "skipped because an earlier tool in this step failed";

const LOG_PREVIEW_CHARS: usize = 200;

/// What to do with the rest of a step once one tool fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailurePolicy {
    /// Run every requested tool and keep looping
    #[default]
    Continue,
    /// Skip the step's remaining tools and go straight to synthesis
    AbortStep,
}

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System directive sent with every gateway call
    pub system_directive: String,

    /// Maximum planning calls per run
    pub max_steps: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// Behaviour when a tool fails mid-step
    pub failure_policy: ToolFailurePolicy,

    /// Dispatch a step's tools concurrently (results keep request order)
    pub concurrent_tools: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_directive: DEFAULT_SYSTEM_DIRECTIVE.into(),
            max_steps: 10,
            generation: GenerationOptions::default(),
            failure_policy: ToolFailurePolicy::default(),
            concurrent_tools: false,
        }
    }
}

/// Why the loop stopped without a direct answer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustReason {
    StepBudget,
    GatewayError,
    NoAction,
    ToolFailure,
}

/// How a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum Termination {
    /// The model answered directly; no synthesis pass
    Answered,
    /// The loop ran out and the answer came from synthesis
    Exhausted(ExhaustReason),
}

/// Result of one run
#[derive(Clone, Debug, Serialize)]
pub struct RunOutput {
    /// Human-readable log of each step
    pub steps: Vec<String>,

    /// Final answer; never empty
    pub answer: String,

    /// Last result per tool name
    pub tool_results: BTreeMap<String, Value>,

    /// Failure reason per tool name
    pub failures: BTreeMap<String, String>,

    /// Caller-visible history after the run, ending with the answer
    pub history: Vec<Turn>,

    pub termination: Termination,

    /// Number of planning calls made
    pub planning_calls: usize,

    /// Last planning transport failure, if any
    pub gateway_error: Option<String>,
}

/// Mutable bookkeeping for one run
struct RunState {
    transcript: Vec<Turn>,
    steps: Vec<String>,
    tool_results: BTreeMap<String, Value>,
    failures: BTreeMap<String, String>,
    gateway_error: Option<String>,
}

impl RunState {
    fn new(instruction: &str, history: Option<&[Turn]>) -> Self {
        let mut transcript = history.map(<[Turn]>::to_vec).unwrap_or_default();
        transcript.push(Turn::user(instruction));
        Self {
            transcript,
            steps: Vec::new(),
            tool_results: BTreeMap::new(),
            failures: BTreeMap::new(),
            gateway_error: None,
        }
    }

    fn log(&mut self, line: String) {
        self.steps.push(line);
    }

    fn finish(self, answer: String, termination: Termination, planning_calls: usize) -> RunOutput {
        let mut history = self.transcript;
        history.push(Turn::assistant(answer.clone()));
        RunOutput {
            steps: self.steps,
            answer,
            tool_results: self.tool_results,
            failures: self.failures,
            history,
            termination,
            planning_calls,
            gateway_error: self.gateway_error,
        }
    }
}

/// Outcome of one planning call
enum Plan {
    Answer(String),
    Execute(Decision),
    NoAction,
    GatewayFailed(AgentError),
}

/// The main Agent struct
pub struct Agent {
    gateway: Arc<dyn ModelGateway>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(gateway: Arc<dyn ModelGateway>, tools: ToolRegistry, config: AgentConfig) -> Self {
        Self {
            gateway,
            tools,
            config,
        }
    }

    /// Create with default configuration and no tools
    pub fn with_defaults(gateway: Arc<dyn ModelGateway>) -> Self {
        Self::new(gateway, ToolRegistry::new(), AgentConfig::default())
    }

    pub fn register_tool<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.register(tool);
    }

    pub fn register_tools(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        self.tools.register_many(tools);
    }

    /// Run one instruction to a final answer.
    ///
    /// `history` is copied, never modified; the updated history is returned in
    /// [`RunOutput::history`]. Gateway and tool failures are absorbed, so this
    /// always produces an answer.
    pub async fn run(&self, instruction: &str, history: Option<&[Turn]>) -> RunOutput {
        if let Some(history) = history {
            tracing::debug!(turns = history.len(), "Seeding transcript from history");
        }
        let mut state = RunState::new(instruction, history);
        // Registry is not mutated during a run, so every step sees the same list.
        let capabilities = self.tools.describe_all();
        let max_steps = self.config.max_steps;
        let mut planning_calls = 0;

        let reason = loop {
            if planning_calls >= max_steps {
                tracing::info!(max_steps, "Step budget exhausted");
                break ExhaustReason::StepBudget;
            }
            planning_calls += 1;
            let step = planning_calls;
            tracing::info!(step, max_steps, "Planning");

            match self.plan(&state, &capabilities, step).await {
                Plan::Answer(text) => {
                    tracing::info!(step, "Model answered without tools");
                    state.log(format!("step {step}: answered directly"));
                    let answer = text.trim().to_string();
                    return state.finish(answer, Termination::Answered, planning_calls);
                }
                Plan::NoAction => {
                    tracing::warn!(step, "Model returned neither text nor tool requests");
                    state.log(format!("step {step}: model returned no action"));
                    break ExhaustReason::NoAction;
                }
                Plan::GatewayFailed(e) => {
                    tracing::error!(step, error = %e, "Planning call failed");
                    state.log(format!("step {step}: gateway error: {e}"));
                    state.gateway_error = Some(e.to_string());
                    break ExhaustReason::GatewayError;
                }
                Plan::Execute(decision) => {
                    if !self.execute_step(&mut state, step, decision).await {
                        break ExhaustReason::ToolFailure;
                    }
                }
            }
        };

        let answer = self.synthesize(&mut state).await;
        state.finish(answer, Termination::Exhausted(reason), planning_calls)
    }

    async fn plan(&self, state: &RunState, capabilities: &[CapabilityDescriptor], step: usize) -> Plan {
        let request = DecisionRequest {
            transcript: &state.transcript,
            capabilities,
            system_directive: &self.config.system_directive,
            options: &self.config.generation,
        };

        match self.gateway.decide(request).await {
            Err(e) => Plan::GatewayFailed(e),
            Ok(decision) if !decision.tool_requests.is_empty() => Plan::Execute(decision),
            Ok(decision) => match decision.remark() {
                Some(text) => Plan::Answer(text.to_string()),
                None => {
                    tracing::debug!(step, "Empty decision");
                    Plan::NoAction
                }
            },
        }
    }

    /// Run a step's tools and fold the results back. Returns `false` when the
    /// failure policy ends the loop.
    async fn execute_step(&self, state: &mut RunState, step: usize, decision: Decision) -> bool {
        let remark = decision.remark().map(str::to_string);
        if let Some(remark) = &remark {
            tracing::debug!(step, remark = %preview(remark), "Model remark");
            state.log(format!("step {step}: model remark: {}", preview(remark)));
        }

        let requests: Vec<ToolRequest> = decision
            .tool_requests
            .into_iter()
            .map(|mut r| {
                r.id.get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
                r
            })
            .collect();

        let outcomes = self.dispatch_all(&requests).await;

        let mut responses = Vec::with_capacity(requests.len());
        let mut any_failed = false;
        for (request, outcome) in requests.iter().zip(&outcomes) {
            match outcome {
                ToolOutcome::Success(value) => {
                    state.log(format!(
                        "step {step}: tool {} returned {}",
                        request.name,
                        preview(&value.to_string())
                    ));
                    state.tool_results.insert(request.name.clone(), value.clone());
                }
                ToolOutcome::Failure(reason) => {
                    any_failed = true;
                    tracing::warn!(step, tool = %request.name, call_id = ?request.id, %reason, "Tool failed");
                    state.log(format!("step {step}: tool {} failed: {reason}", request.name));
                    state.failures.insert(request.name.clone(), reason.clone());
                    state
                        .tool_results
                        .insert(request.name.clone(), outcome.response_payload());
                }
            }
            responses.push((request.name.clone(), outcome.response_payload()));
        }

        state
            .transcript
            .push(Turn::tool_requests(remark.as_deref(), &requests));
        state.transcript.push(Turn::tool_responses(responses));
        tracing::debug!(step, parts = requests.len(), "Folded tool results");

        !(any_failed && self.config.failure_policy == ToolFailurePolicy::AbortStep)
    }

    /// Dispatch every request; the result vector is index-aligned with `requests`
    async fn dispatch_all(&self, requests: &[ToolRequest]) -> Vec<ToolOutcome> {
        if self.config.concurrent_tools {
            return join_all(requests.iter().map(|r| self.dispatch_one(r))).await;
        }

        let mut outcomes = Vec::with_capacity(requests.len());
        let mut aborted = false;
        for request in requests {
            if aborted {
                outcomes.push(ToolOutcome::Failure(SKIPPED_AFTER_FAILURE.into()));
                continue;
            }
            let outcome = self.dispatch_one(request).await;
            aborted = outcome.is_failure() && self.config.failure_policy == ToolFailurePolicy::AbortStep;
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn dispatch_one(&self, request: &ToolRequest) -> ToolOutcome {
        tracing::info!(tool = %request.name, call_id = ?request.id, "Dispatching tool");
        let result: Result<Value> = self.tools.dispatch_value(&request.name, &request.arguments).await;
        ToolOutcome::from(result)
    }

    /// Synthesis pass. Leaves the transcript without the synthesis prompt.
    async fn synthesize(&self, state: &mut RunState) -> String {
        tracing::info!(failures = state.failures.len(), "Synthesizing final answer");
        state
            .transcript
            .push(Turn::user(synthesis_prompt(
                &state.failures,
                state.gateway_error.as_deref(),
            )));

        let request = CompletionRequest {
            transcript: &state.transcript,
            system_directive: &self.config.system_directive,
            options: &self.config.generation,
            stream: false,
        };
        let result = self.gateway.complete(request).await;
        state.transcript.pop();

        match result {
            Err(e) => {
                tracing::error!(error = %e, "Synthesis call failed");
                state.log(format!("synthesis: gateway error: {e}"));
                SYNTHESIS_FAILED_ANSWER.into()
            }
            Ok(response) => match extract_text(&response) {
                Some(text) => text.trim().to_string(),
                None => {
                    state.log("synthesis: no text in model response".into());
                    NO_REPLY_ANSWER.into()
                }
            },
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Instruction appended for the synthesis pass. Tool failures and an
/// aborted planning call are disclosed so the model does not invent data.
fn synthesis_prompt(failures: &BTreeMap<String, String>, gateway_error: Option<&str>) -> String {
    let mut details: Vec<String> = failures
        .iter()
        .map(|(name, reason)| format!("- {name}: {reason}"))
        .collect();
    if let Some(error) = gateway_error {
        details.push(format!("- model request: {error} (no further tools could be run)"));
    }
    if details.is_empty() {
        return SYNTHESIS_PROMPT.into();
    }

    format!(
        "While writing the final answer, note that the following steps failed:\n{}\n\
         Tell the user which information could not be obtained instead of making it up, \
         then give the best final answer the available information and conversation allow.",
        details.join("\n")
    )
}

fn preview(text: &str) -> String {
    if text.chars().count() <= LOG_PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    format!("{head}...")
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    gateway: Option<Arc<dyn ModelGateway>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            gateway: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn gateway(mut self, gateway: Arc<dyn ModelGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.register_many(tools);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn system_directive(mut self, directive: impl Into<String>) -> Self {
        self.config.system_directive = directive.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.generation.max_tokens = max_tokens;
        self
    }

    pub fn max_steps(mut self, max: usize) -> Self {
        self.config.max_steps = max;
        self
    }

    pub fn failure_policy(mut self, policy: ToolFailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn concurrent_tools(mut self, enabled: bool) -> Self {
        self.config.concurrent_tools = enabled;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let gateway = self
            .gateway
            .ok_or_else(|| AgentError::Config("Model gateway is required".into()))?;

        if self.config.max_steps == 0 {
            return Err(AgentError::Config("max_steps must be at least 1".into()));
        }

        Ok(Agent::new(gateway, self.tools, self.config))
    }
}
