//! Web Search Tool
//!
//! Queries Serper (Google results) or Bing and returns the top organic hits.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use manus_core::{
    Result as CoreResult, Tool, ToolArgs, ToolSpec,
    tool::{ParameterSpec, arg_f64_or, arg_str},
};

const NAME: &str = "web_search";
const MAX_RESULTS: usize = 10;

/// Search backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchEngine {
    #[default]
    Serper,
    Bing,
}

impl SearchEngine {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "serper" | "google" => Some(Self::Serper),
            "bing" => Some(Self::Bing),
            _ => None,
        }
    }

    pub fn default_url(self) -> &'static str {
        match self {
            Self::Serper => "https://google.serper.dev/search",
            Self::Bing => "https://api.bing.microsoft.com/v7.0/search",
        }
    }
}

/// Search configuration
#[derive(Clone, Debug, Default)]
pub struct SearchConfig {
    pub engine: SearchEngine,
    pub api_key: Option<String>,
    /// Overrides the engine's default endpoint
    pub url: Option<String>,
}

impl SearchConfig {
    fn endpoint(&self) -> &str {
        self.url.as_deref().unwrap_or_else(|| self.engine.default_url())
    }
}

/// One search hit
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Tool for searching the web
pub struct WebSearchTool {
    http: reqwest::Client,
    config: SearchConfig,
}

impl WebSearchTool {
    pub fn new(config: SearchConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("building search http client")?;
        Ok(Self { http, config })
    }

    async fn search(&self, api_key: &str, query: &str, limit: usize) -> anyhow::Result<Vec<SearchHit>> {
        let endpoint = self.config.endpoint();
        let response = match self.config.engine {
            SearchEngine::Serper => self
                .http
                .post(endpoint)
                .header("X-API-KEY", api_key)
                .json(&json!({ "q": query, "num": limit }))
                .send()
                .await,
            SearchEngine::Bing => self
                .http
                .get(endpoint)
                .header("Ocp-Apim-Subscription-Key", api_key)
                .query(&[("q", query), ("count", &limit.to_string())])
                .send()
                .await,
        }
        .with_context(|| format!("search request to {endpoint}"))?
        .error_for_status()
        .context("search API returned an error status")?;

        let body: Value = response.json().await.context("decoding search response")?;
        let hits = match self.config.engine {
            SearchEngine::Serper => parse_serper(&body),
            SearchEngine::Bing => parse_bing(&body),
        };
        Ok(hits.into_iter().take(limit).collect())
    }
}

fn hit(item: &Value, title: &str, link: &str, snippet: &str) -> Option<SearchHit> {
    let text = |key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);
    Some(SearchHit {
        title: text(title)?,
        link: text(link)?,
        snippet: text(snippet).unwrap_or_default(),
    })
}

fn parse_serper(body: &Value) -> Vec<SearchHit> {
    body.get("organic")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|i| hit(i, "title", "link", "snippet")).collect())
        .unwrap_or_default()
}

fn parse_bing(body: &Value) -> Vec<SearchHit> {
    body.pointer("/webPages/value")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|i| hit(i, "name", "url", "snippet")).collect())
        .unwrap_or_default()
}

#[async_trait]
impl Tool for WebSearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            NAME,
            "Search the web for current information. Returns titles, links and snippets.",
        )
        .param("query", ParameterSpec::new("string", "Search query"))
        .param(
            "num_results",
            ParameterSpec::new("integer", "Number of results to return (1-10)").with_default(json!(5)),
        )
    }

    async fn execute(&self, args: &ToolArgs) -> CoreResult<Value> {
        let query = arg_str(NAME, args, "query")?.trim();
        if query.is_empty() {
            return Ok(json!({ "error": "query must not be empty" }));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let limit = arg_f64_or(NAME, args, "num_results", 5.0)?.clamp(1.0, MAX_RESULTS as f64) as usize;

        let Some(api_key) = self.config.api_key.as_deref() else {
            return Ok(json!({ "error": "web search is not configured (missing API key)" }));
        };

        let hits = self.search(api_key, query, limit).await?;
        tracing::debug!(query, hits = hits.len(), "Search finished");
        Ok(json!({ "query": query, "results": hits }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_parsing() {
        assert_eq!(SearchEngine::parse("Serper"), Some(SearchEngine::Serper));
        assert_eq!(SearchEngine::parse("bing"), Some(SearchEngine::Bing));
        assert_eq!(SearchEngine::parse("altavista"), None);
    }

    #[test]
    fn test_parse_serper() {
        let body = json!({"organic": [
            {"title": "Rust", "link": "https://rust-lang.org", "snippet": "A language"},
            {"title": "No link"},
            {"title": "Book", "link": "https://doc.rust-lang.org/book"}
        ]});
        let hits = parse_serper(&body);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].link, "https://rust-lang.org");
        assert_eq!(hits[1].snippet, "");
    }

    #[test]
    fn test_parse_bing() {
        let body = json!({"webPages": {"value": [
            {"name": "Tokio", "url": "https://tokio.rs", "snippet": "Async runtime"}
        ]}});
        assert_eq!(
            parse_bing(&body),
            vec![SearchHit {
                title: "Tokio".into(),
                link: "https://tokio.rs".into(),
                snippet: "Async runtime".into(),
            }]
        );
        assert!(parse_bing(&json!({})).is_empty());
    }

    #[test]
    fn test_endpoint_override() {
        let config = SearchConfig {
            engine: SearchEngine::Bing,
            api_key: None,
            url: Some("http://localhost:9000/search".into()),
        };
        assert_eq!(config.endpoint(), "http://localhost:9000/search");
        assert_eq!(SearchConfig::default().endpoint(), "https://google.serper.dev/search");
    }

    #[tokio::test]
    async fn test_missing_key_is_structured_error() {
        let tool = WebSearchTool::new(SearchConfig::default()).unwrap();
        let mut args = ToolArgs::new();
        args.insert("query".into(), json!("rust"));

        let result = tool.execute(&args).await.unwrap();
        assert!(result["error"].as_str().unwrap().contains("missing API key"));
    }
}
