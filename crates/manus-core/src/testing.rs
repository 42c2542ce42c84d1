//! Test doubles: a scripted gateway and a handful of fake tools.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::gateway::{CompletionRequest, Decision, DecisionRequest, ModelGateway};
use crate::message::{ToolRequest, Turn};
use crate::tool::{ParameterSpec, Tool, ToolArgs, ToolSpec};

pub fn request(name: &str, arguments: Value) -> ToolRequest {
    ToolRequest::from_value(name, arguments)
}

/// One scripted planning reply
#[derive(Clone, Debug)]
pub enum Reply {
    Decide(Decision),
    Fail(String),
}

/// Gateway that plays back scripted decisions and records what it was sent
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Reply>>,
    repeat: Option<Reply>,
    completion: Option<Value>,
    decide_transcripts: Mutex<Vec<Vec<Turn>>>,
    complete_transcripts: Mutex<Vec<Vec<Turn>>>,
    capability_counts: Mutex<Vec<usize>>,
    streamed: Mutex<bool>,
}

impl ScriptedGateway {
    fn build(replies: Vec<Reply>, repeat: Option<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            repeat,
            completion: None,
            decide_transcripts: Mutex::default(),
            complete_transcripts: Mutex::default(),
            capability_counts: Mutex::default(),
            streamed: Mutex::new(false),
        }
    }

    /// Replies in order; once exhausted every call fails
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self::build(replies, None))
    }

    /// The same decision on every planning call
    pub fn repeating(decision: Decision) -> Arc<Self> {
        Arc::new(Self::build(Vec::new(), Some(Reply::Decide(decision))))
    }

    /// Response object returned by `complete`; without one, `complete` fails
    pub fn with_completion(self: Arc<Self>, response: Value) -> Arc<Self> {
        let mut inner = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("gateway already shared"));
        inner.completion = Some(response);
        Arc::new(inner)
    }

    pub fn decide_calls(&self) -> usize {
        self.decide_transcripts.lock().unwrap().len()
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_transcripts.lock().unwrap().len()
    }

    pub fn decide_transcripts(&self) -> Vec<Vec<Turn>> {
        self.decide_transcripts.lock().unwrap().clone()
    }

    pub fn complete_transcripts(&self) -> Vec<Vec<Turn>> {
        self.complete_transcripts.lock().unwrap().clone()
    }

    pub fn capability_counts(&self) -> Vec<usize> {
        self.capability_counts.lock().unwrap().clone()
    }

    pub fn complete_streamed(&self) -> bool {
        *self.streamed.lock().unwrap()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision> {
        self.decide_transcripts
            .lock()
            .unwrap()
            .push(request.transcript.to_vec());
        self.capability_counts
            .lock()
            .unwrap()
            .push(request.capabilities.len());

        let next = self.replies.lock().unwrap().pop_front().or_else(|| self.repeat.clone());
        match next {
            Some(Reply::Decide(decision)) => Ok(decision),
            Some(Reply::Fail(message)) => Err(AgentError::GatewayUnavailable(message)),
            None => Err(AgentError::Gateway("script exhausted".into())),
        }
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Value> {
        self.complete_transcripts
            .lock()
            .unwrap()
            .push(request.transcript.to_vec());
        *self.streamed.lock().unwrap() |= request.stream;

        self.completion
            .clone()
            .ok_or_else(|| AgentError::Gateway("no completion scripted".into()))
    }
}

/// Returns a fixed value and counts invocations
pub struct RecordingTool {
    name: String,
    result: Value,
    required: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl RecordingTool {
    pub fn new(name: &str, result: Value) -> Self {
        Self {
            name: name.into(),
            result,
            required: None,
            calls: Arc::default(),
        }
    }

    pub fn requiring(mut self, param: &str) -> Self {
        self.required = Some(param.into());
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn spec(&self) -> ToolSpec {
        let spec = ToolSpec::new(&self.name, "returns a fixed value");
        match &self.required {
            Some(param) => spec.param(param, ParameterSpec::new("string", "required input")),
            None => spec,
        }
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

/// Always returns `Err`
pub struct FailingTool {
    name: String,
    message: String,
}

impl FailingTool {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(&self.name, "always fails")
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<Value> {
        Err(AgentError::Other(self.message.clone()))
    }
}

/// Panics inside `execute`
pub struct PanickingTool {
    name: String,
}

impl PanickingTool {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Tool for PanickingTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(&self.name, "panics")
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<Value> {
        panic!("tool exploded");
    }
}

/// Sleeps before answering with its own name
pub struct SlowTool {
    name: String,
    delay: Duration,
}

impl SlowTool {
    pub fn new(name: &str, delay_ms: u64) -> Self {
        Self {
            name: name.into(),
            delay: Duration::from_millis(delay_ms),
        }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(&self.name, "sleeps")
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<Value> {
        tokio::time::sleep(self.delay).await;
        Ok(json!({ "tool": self.name }))
    }
}
