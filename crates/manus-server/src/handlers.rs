//! HTTP Handlers

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use manus_core::{Agent, CapabilityDescriptor, Termination};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub tools: usize,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub answer: String,
    pub steps: Vec<String>,
    /// Echoed back for remembered sessions; absent for one-shot requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub termination: Termination,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model: state.agent.generation.model.clone(),
        tools: state.tools.len(),
    })
}

/// Capability descriptors of every enabled tool
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<CapabilityDescriptor>> {
    Json(state.tools.describe_all())
}

/// Run the agent on one instruction
pub async fn run_handler(
    State(state): State<AppState>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "EMPTY_MESSAGE",
            "message must not be empty",
        ));
    }

    // Without a session id the run is one-shot and leaves nothing in the store
    let session_id = payload
        .session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    let guard = match &session_id {
        Some(id) => Some(state.sessions.try_begin(id).ok_or_else(|| {
            tracing::info!(session = %id, "Rejected run, session busy");
            api_error(
                StatusCode::CONFLICT,
                "SESSION_BUSY",
                "A previous message in this session is still being processed",
            )
        })?),
        None => None,
    };

    let history = guard
        .as_ref()
        .map(|g| state.sessions.history(g.id()))
        .unwrap_or_default();
    let agent = Agent::new(state.gateway.clone(), state.tools.clone(), state.agent.clone());
    let output = agent.run(message, Some(history.as_slice())).await;

    if let Some(error) = &output.gateway_error {
        tracing::warn!(session = ?session_id, %error, "Run ended on gateway error");
    }
    if let Some(guard) = guard {
        state.sessions.record_exchange(guard.id(), message, &output.answer);
    }

    Ok(Json(RunResponse {
        answer: output.answer,
        steps: output.steps,
        session_id,
        termination: output.termination,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::Request,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use manus_core::{
        AgentConfig, CompletionRequest, Decision, DecisionRequest, ModelGateway, Result as CoreResult,
        Role, ToolRegistry,
    };

    use super::*;
    use crate::{config::MemoryConfig, sessions::SessionStore};

    /// Answers every instruction directly, reporting how many turns it saw
    struct EchoGateway {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelGateway for EchoGateway {
        async fn decide(&self, request: DecisionRequest<'_>) -> CoreResult<Decision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let last = request
                .transcript
                .iter()
                .rev()
                .find(|t| t.role == Role::User)
                .and_then(|t| t.text_content())
                .unwrap_or_default();
            Ok(Decision::answer(format!(
                "echo: {last} ({} turns)",
                request.transcript.len()
            )))
        }

        async fn complete(&self, _request: CompletionRequest<'_>) -> CoreResult<Value> {
            Ok(json!({"text": "unused"}))
        }
    }

    fn app() -> (Router, AppState) {
        let mut tools = ToolRegistry::new();
        tools.register_many(manus_tools::builtin_tools(&manus_tools::ToolsConfig::default()));
        let state = AppState {
            gateway: Arc::new(EchoGateway {
                calls: AtomicUsize::new(0),
            }),
            tools,
            agent: AgentConfig::default(),
            sessions: SessionStore::new(MemoryConfig::default()),
        };
        (crate::app(state.clone()), state)
    }

    async fn post_run(router: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::post("/api/run")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_anonymous_run_is_one_shot() {
        let (router, state) = app();
        for _ in 0..3 {
            let (status, body) = post_run(router.clone(), json!({"message": "hello"})).await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["answer"], "echo: hello (1 turns)");
            assert_eq!(body["termination"]["state"], "answered");
            assert!(body.get("session_id").is_none());
        }
        assert_eq!(state.sessions.len(), 0);
    }

    #[tokio::test]
    async fn test_session_history_is_replayed() {
        let (router, state) = app();
        let first = json!({"message": "first", "session_id": "s1"});
        let second = json!({"message": "second", "session_id": "s1"});

        post_run(router.clone(), first).await;
        let (_, body) = post_run(router, second).await;

        assert_eq!(body["answer"], "echo: second (3 turns)");
        assert_eq!(body["session_id"], "s1");
        assert_eq!(state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (router, _) = app();
        let (status, body) = post_run(router, json!({"message": "   "})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "EMPTY_MESSAGE");
    }

    #[tokio::test]
    async fn test_busy_session_rejected() {
        let (router, state) = app();
        let _guard = state.sessions.try_begin("busy").unwrap();

        let (status, body) = post_run(router, json!({"message": "hi", "session_id": "busy"})).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "SESSION_BUSY");
    }

    #[tokio::test]
    async fn test_list_tools() {
        let (router, _) = app();
        let response = router
            .oneshot(Request::get("/api/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let tools: Value = serde_json::from_slice(&bytes).unwrap();

        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(names, vec!["calculator", "datetime"]);
        assert_eq!(tools[0]["parameters"]["required"], json!(["expression"]));
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app();
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health["tools"], 2);
    }
}
