//! # manus-tools
//!
//! Built-in tools for the manus agent.
//!
//! | Tool          | Purpose                               | Needs            |
//! |---------------|---------------------------------------|------------------|
//! | `calculator`  | Arithmetic expressions                | -                |
//! | `datetime`    | Current date and time at a UTC offset | -                |
//! | `weather`     | Current weather, forecast, indices    | an API key       |
//! | `web_search`  | Serper or Bing web search             | an API key       |
//!
//! ```rust,ignore
//! let config = manus_tools::ToolsConfig::from_env();
//! let agent = AgentBuilder::new()
//!     .gateway(gateway)
//!     .tools(manus_tools::builtin_tools(&config))
//!     .build()?;
//! ```

use std::sync::Arc;

use manus_core::Tool;

pub mod svckit;

pub use svckit::{SearchConfig, SearchEngine, WeatherConfig};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{CalculatorTool, DateTimeTool, WeatherTool, WebSearchTool};
}

/// Which built-in tools to register
#[derive(Clone, Debug)]
pub struct ToolsConfig {
    pub enable_calculator: bool,
    pub enable_datetime: bool,
    pub enable_search: bool,
    pub enable_weather: bool,
    pub search: SearchConfig,
    pub weather: WeatherConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enable_calculator: true,
            enable_datetime: true,
            enable_search: true,
            enable_weather: true,
            search: SearchConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

impl ToolsConfig {
    /// Read `MANUS_ENABLE_*`, `MANUS_SEARCH_ENGINE`, `MANUS_SEARCH_URL`, the
    /// engine's API key (`SERPER_API_KEY` or `BING_API_KEY`) and the weather
    /// settings (`WEATHER_API_KEY`, `MANUS_WEATHER_URL`,
    /// `MANUS_WEATHER_FORECAST_URL`, `MANUS_WEATHER_INDEX_URL`).
    pub fn from_env() -> Self {
        let engine = std::env::var("MANUS_SEARCH_ENGINE")
            .ok()
            .and_then(|name| {
                let parsed = SearchEngine::parse(&name);
                if parsed.is_none() {
                    tracing::warn!(engine = %name, "Unknown search engine, using serper");
                }
                parsed
            })
            .unwrap_or_default();
        let weather = WeatherConfig::default();
        let key_var = match engine {
            SearchEngine::Serper => "SERPER_API_KEY",
            SearchEngine::Bing => "BING_API_KEY",
        };

        Self {
            enable_calculator: env_flag("MANUS_ENABLE_CALCULATOR", true),
            enable_datetime: env_flag("MANUS_ENABLE_DATETIME", true),
            enable_search: env_flag("MANUS_ENABLE_SEARCH", true),
            enable_weather: env_flag("MANUS_ENABLE_WEATHER", true),
            search: SearchConfig {
                engine,
                api_key: non_empty_var(key_var),
                url: non_empty_var("MANUS_SEARCH_URL"),
            },
            weather: WeatherConfig {
                api_key: non_empty_var("WEATHER_API_KEY"),
                weather_url: non_empty_var("MANUS_WEATHER_URL").unwrap_or(weather.weather_url),
                forecast_url: non_empty_var("MANUS_WEATHER_FORECAST_URL").unwrap_or(weather.forecast_url),
                index_url: non_empty_var("MANUS_WEATHER_INDEX_URL").unwrap_or(weather.index_url),
            },
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name).map_or(default, |v| parse_flag(&v).unwrap_or(default))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Instantiate every enabled built-in tool.
///
/// Web search and weather are skipped when their API key is not configured
/// or the HTTP client cannot be built.
pub fn builtin_tools(config: &ToolsConfig) -> Vec<Arc<dyn Tool>> {
    let mut enabled: Vec<Arc<dyn Tool>> = Vec::new();

    if config.enable_calculator {
        enabled.push(Arc::new(tools::CalculatorTool));
    }
    if config.enable_datetime {
        enabled.push(Arc::new(tools::DateTimeTool));
    }
    if config.enable_search {
        if config.search.api_key.is_none() {
            tracing::warn!(engine = ?config.search.engine, "Web search enabled but no API key set, skipping");
        } else {
            match tools::WebSearchTool::new(config.search.clone()) {
                Ok(tool) => enabled.push(Arc::new(tool)),
                Err(e) => tracing::warn!(error = %e, "Web search unavailable"),
            }
        }
    }

    if config.enable_weather {
        if config.weather.api_key.is_none() {
            tracing::warn!("Weather enabled but no API key set, skipping");
        } else {
            match tools::WeatherTool::new(config.weather.clone()) {
                Ok(tool) => enabled.push(Arc::new(tool)),
                Err(e) => tracing::warn!(error = %e, "Weather unavailable"),
            }
        }
    }

    tracing::info!(count = enabled.len(), "Built-in tools ready");
    enabled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tools: &[Arc<dyn Tool>]) -> Vec<String> {
        tools.iter().map(|t| t.spec().name).collect()
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_search_skipped_without_key() {
        let tools = builtin_tools(&ToolsConfig::default());
        assert_eq!(names(&tools), vec!["calculator", "datetime"]);
    }

    #[test]
    fn test_search_registered_with_key() {
        let config = ToolsConfig {
            enable_calculator: false,
            enable_datetime: false,
            enable_search: true,
            enable_weather: false,
            search: SearchConfig {
                api_key: Some("test-key".into()),
                ..SearchConfig::default()
            },
            weather: WeatherConfig::default(),
        };
        assert_eq!(names(&builtin_tools(&config)), vec!["web_search"]);
    }

    #[test]
    fn test_weather_registered_with_key() {
        let config = ToolsConfig {
            weather: WeatherConfig {
                api_key: Some("test-key".into()),
                ..WeatherConfig::default()
            },
            ..ToolsConfig::default()
        };
        assert_eq!(names(&builtin_tools(&config)), vec!["calculator", "datetime", "weather"]);
    }

    #[test]
    fn test_everything_disabled() {
        let config = ToolsConfig {
            enable_calculator: false,
            enable_datetime: false,
            enable_search: false,
            enable_weather: false,
            search: SearchConfig::default(),
            weather: WeatherConfig {
                api_key: Some("test-key".into()),
                ..WeatherConfig::default()
            },
        };
        assert!(builtin_tools(&config).is_empty());
    }
}
