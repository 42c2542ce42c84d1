//! Gemini Model Gateway
//!
//! Implementation of `ModelGateway` over the Gemini `generateContent` REST API
//! with native function calling.

use std::time::Duration;

use async_trait::async_trait;
use manus_core::{
    error::{AgentError, Result},
    gateway::{CompletionRequest, Decision, DecisionRequest, GenerationOptions, ModelGateway},
    message::{Content, Part, Role, ToolRequest, Turn},
    tool::CapabilityDescriptor,
};
use serde_json::{Map, Value, json};

/// Gemini gateway configuration
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`
    pub api_key: String,

    /// API base URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            timeout_secs: 60,
        }
    }
}

impl GeminiConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config("GEMINI_API_KEY is not set".into()))?;
        let defaults = Self::default();
        let base_url = std::env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url);
        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(defaults.timeout_secs);

        Ok(Self {
            api_key,
            base_url,
            timeout_secs,
        })
    }
}

/// Gemini model gateway
pub struct GeminiGateway {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiGateway {
    pub fn from_config(config: GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("http client error: {e}")))?;
        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(GeminiConfig::from_env()?)
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn post(&self, model: &str, body: &Value) -> Result<Value> {
        tracing::debug!(model, "Sending Gemini request");
        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AgentError::GatewayUnavailable(format!("Gemini request error: {e}"))
                } else {
                    AgentError::Gateway(format!("Gemini request error: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AgentError::Gateway(format!("Gemini response parse error: {e}")))
    }
}

fn status_error(status: reqwest::StatusCode, body: &str) -> AgentError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        AgentError::RateLimited(format!("Gemini rate limit exceeded: {body}"))
    } else if status.is_server_error() {
        AgentError::GatewayUnavailable(format!("Gemini returned {status}: {body}"))
    } else {
        AgentError::Gateway(format!("Gemini request failed with {status}: {body}"))
    }
}

/// Convert transcript turns to Gemini `contents`
fn to_contents(transcript: &[Turn]) -> Vec<Value> {
    transcript
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "model",
                Role::Tool => "function",
            };
            let parts: Vec<Value> = match &turn.content {
                Content::Text(text) => vec![json!({ "text": text })],
                Content::Parts(parts) => parts.iter().map(to_part).collect(),
            };
            json!({ "role": role, "parts": parts })
        })
        .collect()
}

fn to_part(part: &Part) -> Value {
    match part {
        Part::Text(text) => json!({ "text": text }),
        Part::ToolRequest(request) => json!({
            "functionCall": { "name": request.name, "args": request.arguments }
        }),
        Part::ToolResponse { name, response } => json!({
            "functionResponse": { "name": name, "response": { "content": response } }
        }),
    }
}

/// Convert capability descriptors to Gemini function declarations.
/// Gemini's schema subset has no `default`, and types are upper-case.
fn to_declarations(capabilities: &[CapabilityDescriptor]) -> Vec<Value> {
    capabilities
        .iter()
        .map(|cap| {
            let mut declaration = json!({ "name": cap.name, "description": cap.description });
            if !cap.parameters.properties.is_empty() {
                let properties: Map<String, Value> = cap
                    .parameters
                    .properties
                    .iter()
                    .map(|(name, param)| {
                        let mut schema = json!({
                            "type": param.param_type.to_uppercase(),
                            "description": param.description,
                        });
                        if let Some(values) = &param.enum_values {
                            schema["enum"] = json!(values);
                        }
                        (name.clone(), schema)
                    })
                    .collect();
                declaration["parameters"] = json!({
                    "type": "OBJECT",
                    "properties": properties,
                    "required": cap.parameters.required,
                });
            }
            declaration
        })
        .collect()
}

fn request_body(
    transcript: &[Turn],
    system_directive: &str,
    options: &GenerationOptions,
    capabilities: Option<&[CapabilityDescriptor]>,
) -> Value {
    let mut body = json!({
        "contents": to_contents(transcript),
        "systemInstruction": { "parts": [{ "text": system_directive }] },
        "generationConfig": {
            "temperature": options.temperature,
            "maxOutputTokens": options.max_tokens,
        },
    });
    if let Some(capabilities) = capabilities.filter(|c| !c.is_empty()) {
        body["tools"] = json!([{ "functionDeclarations": to_declarations(capabilities) }]);
    }
    body
}

/// Read text and function calls from a `generateContent` response
fn parse_decision(response: &Value) -> Result<Decision> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(AgentError::Gateway(message));
    }

    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut texts = Vec::new();
    let mut tool_requests = Vec::new();
    for part in parts {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            texts.push(text);
        } else if let Some(call) = part.get("functionCall") {
            let Some(name) = call.get("name").and_then(Value::as_str) else {
                tracing::warn!(?call, "Ignoring function call without a name");
                continue;
            };
            let args = call.get("args").cloned().unwrap_or(Value::Null);
            tool_requests.push(ToolRequest::from_value(name, args));
        }
    }

    let text = texts.concat();
    Ok(Decision {
        text: (!text.trim().is_empty()).then_some(text),
        tool_requests,
    })
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision> {
        let body = request_body(
            request.transcript,
            request.system_directive,
            request.options,
            Some(request.capabilities),
        );
        let response = self.post(&request.options.model, &body).await?;
        let decision = parse_decision(&response)?;
        tracing::debug!(
            tool_requests = decision.tool_requests.len(),
            has_text = decision.text.is_some(),
            "Gemini decision"
        );
        Ok(decision)
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Value> {
        if request.stream {
            return Err(AgentError::Gateway(
                "streaming completions are not supported by this gateway".into(),
            ));
        }
        let body = request_body(
            request.transcript,
            request.system_directive,
            request.options,
            None,
        );
        self.post(&request.options.model, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manus_core::tool::{ParameterSpec, ToolSpec};

    #[test]
    fn test_config_defaults() {
        let config = GeminiConfig::default();
        assert_eq!(config.base_url, "https://generativelanguage.googleapis.com/v1beta");
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_transcript_conversion() {
        let mut args = Map::new();
        args.insert("expression".into(), json!("2+2"));
        let requests = vec![ToolRequest::new("calculator", args)];
        let transcript = vec![
            Turn::user("What is 2+2?"),
            Turn::tool_requests(Some("Calculating."), &requests),
            Turn::tool_responses([("calculator".to_string(), json!({"result": 4}))]),
        ];

        let contents = to_contents(&transcript);

        assert_eq!(contents[0], json!({"role": "user", "parts": [{"text": "What is 2+2?"}]}));
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0], json!({"text": "Calculating."}));
        assert_eq!(
            contents[1]["parts"][1],
            json!({"functionCall": {"name": "calculator", "args": {"expression": "2+2"}}})
        );
        assert_eq!(contents[2]["role"], "function");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["content"]["result"],
            4
        );
    }

    #[test]
    fn test_declarations_strip_defaults() {
        let spec = ToolSpec::new("datetime", "Current time")
            .param(
                "format",
                ParameterSpec::new("string", "Output format")
                    .with_default(json!("human"))
                    .with_enum(vec![json!("human"), json!("iso")]),
            )
            .param("label", ParameterSpec::new("string", "Label"));

        let declarations = to_declarations(&[spec.describe()]);
        let params = &declarations[0]["parameters"];

        assert_eq!(params["type"], "OBJECT");
        assert_eq!(params["properties"]["format"]["type"], "STRING");
        assert!(params["properties"]["format"].get("default").is_none());
        assert_eq!(params["properties"]["format"]["enum"], json!(["human", "iso"]));
        assert_eq!(params["required"], json!(["label"]));
    }

    #[test]
    fn test_parameterless_declaration_omits_schema() {
        let declarations = to_declarations(&[ToolSpec::new("ping", "Ping").describe()]);
        assert!(declarations[0].get("parameters").is_none());
    }

    #[test]
    fn test_tools_omitted_when_no_capabilities() {
        let body = request_body(&[Turn::user("hi")], "sys", &GenerationOptions::default(), Some(&[][..]));
        assert!(body.get("tools").is_none());
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn test_parse_decision_with_calls() {
        let response = json!({"candidates": [{"content": {"role": "model", "parts": [
            {"text": "Let me look."},
            {"functionCall": {"name": "web_search", "args": {"query": "rust"}}},
            {"functionCall": {"name": "datetime"}}
        ]}}]});

        let decision = parse_decision(&response).unwrap();

        assert_eq!(decision.text.as_deref(), Some("Let me look."));
        assert_eq!(decision.tool_requests.len(), 2);
        assert_eq!(decision.tool_requests[0].arguments["query"], "rust");
        assert_eq!(decision.tool_requests[1].arguments, json!({}));
    }

    #[test]
    fn test_parse_decision_empty_and_error() {
        assert_eq!(parse_decision(&json!({"candidates": []})).unwrap(), Decision::default());
        let err = parse_decision(&json!({"error": {"code": 400, "message": "bad key"}})).unwrap_err();
        assert!(matches!(err, AgentError::Gateway(m) if m == "bad key"));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, ""),
            AgentError::RateLimited(_)
        ));
        assert!(matches!(
            status_error(reqwest::StatusCode::BAD_GATEWAY, ""),
            AgentError::GatewayUnavailable(_)
        ));
        assert!(matches!(
            status_error(reqwest::StatusCode::BAD_REQUEST, ""),
            AgentError::Gateway(_)
        ));
    }

    #[tokio::test]
    async fn test_streaming_completion_rejected() {
        let gateway = GeminiGateway::from_config(GeminiConfig::default()).unwrap();
        let transcript = [Turn::user("hi")];
        let options = GenerationOptions::default();
        let request = CompletionRequest {
            transcript: &transcript,
            system_directive: "sys",
            options: &options,
            stream: true,
        };
        assert!(matches!(gateway.complete(request).await, Err(AgentError::Gateway(_))));
    }
}
