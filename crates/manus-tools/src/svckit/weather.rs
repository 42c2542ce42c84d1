//! Weather Tool
//!
//! Current conditions, multi-day forecasts and living indices from an
//! ALAPI-style weather service (`{code, msg, data}` envelopes).

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use manus_core::{
    Result as CoreResult, Tool, ToolArgs, ToolSpec,
    tool::{ParameterSpec, arg_f64_or, arg_str, arg_str_or},
};

const NAME: &str = "weather";
const MAX_FORECAST_DAYS: usize = 7;

/// Weather service endpoints and credentials
#[derive(Clone, Debug)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub weather_url: String,
    pub forecast_url: String,
    pub index_url: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            weather_url: "https://v3.alapi.cn/api/tianqi".into(),
            forecast_url: "https://v3.alapi.cn/api/tianqi/seven".into(),
            index_url: "https://v3.alapi.cn/api/tianqi/index".into(),
        }
    }
}

/// Conditions right now
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CurrentWeather {
    pub city: String,
    pub weather: String,
    pub temperature: Option<String>,
    pub low: Option<String>,
    pub high: Option<String>,
    pub wind: Option<String>,
    pub humidity: Option<String>,
}

/// One forecast day
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForecastDay {
    pub date: String,
    pub weather: String,
    pub low: Option<String>,
    pub high: Option<String>,
    pub wind: Option<String>,
}

/// One living index (clothing, UV, sport...)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LivingIndex {
    pub name: String,
    pub level: Option<String>,
    pub advice: Option<String>,
}

/// Tool for looking up the weather of a city
pub struct WeatherTool {
    http: reqwest::Client,
    config: WeatherConfig,
}

impl WeatherTool {
    pub fn new(config: WeatherConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("building weather http client")?;
        Ok(Self { http, config })
    }

    async fn fetch(&self, url: &str, api_key: &str, city: &str) -> anyhow::Result<Value> {
        self.http
            .get(url)
            .query(&[("token", api_key), ("city", city)])
            .send()
            .await
            .with_context(|| format!("weather request to {url}"))?
            .error_for_status()
            .context("weather API returned an error status")?
            .json()
            .await
            .context("decoding weather response")
    }
}

/// Field as text, accepting numbers too
fn field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match item.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Unwrap the `{code, msg, data}` envelope
fn envelope(body: &Value) -> Result<&Value, String> {
    let code = body.get("code").and_then(Value::as_i64).unwrap_or(200);
    if code != 200 {
        let message = field(body, &["msg", "message"]).unwrap_or_else(|| "unknown error".into());
        return Err(format!("weather service error {code}: {message}"));
    }
    body.get("data")
        .filter(|data| !data.is_null())
        .ok_or_else(|| "weather service returned no data".to_string())
}

/// Entries of `data`, whether it is a list or wraps one under `list`
fn entries(data: &Value) -> &[Value] {
    data.as_array()
        .or_else(|| data.get("list").and_then(Value::as_array))
        .map_or(&[][..], Vec::as_slice)
}

fn parse_current(body: &Value) -> Result<CurrentWeather, String> {
    let data = envelope(body)?;
    Ok(CurrentWeather {
        city: field(data, &["city"]).unwrap_or_default(),
        weather: field(data, &["weather", "wea"]).unwrap_or_default(),
        temperature: field(data, &["temp", "tem"]),
        low: field(data, &["min_temp", "tem_night"]),
        high: field(data, &["max_temp", "tem_day"]),
        wind: field(data, &["wind", "win"]),
        humidity: field(data, &["humidity"]),
    })
}

fn parse_forecast(body: &Value, days: usize) -> Result<Vec<ForecastDay>, String> {
    let data = envelope(body)?;
    Ok(entries(data)
        .iter()
        .filter_map(|day| {
            Some(ForecastDay {
                date: field(day, &["date"])?,
                weather: field(day, &["wea_day", "weather", "wea"]).unwrap_or_default(),
                low: field(day, &["temp_night", "min_temp", "tem_night"]),
                high: field(day, &["temp_day", "max_temp", "tem_day"]),
                wind: field(day, &["wind_day", "wind", "win"]),
            })
        })
        .take(days)
        .collect())
}

fn parse_index(body: &Value) -> Result<Vec<LivingIndex>, String> {
    let data = envelope(body)?;
    Ok(entries(data)
        .iter()
        .filter_map(|item| {
            Some(LivingIndex {
                name: field(item, &["name", "type"])?,
                level: field(item, &["level"]),
                advice: field(item, &["content", "tips"]),
            })
        })
        .collect())
}

#[async_trait]
impl Tool for WeatherTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            NAME,
            "Look up the weather of a city: current conditions, a multi-day forecast or living indices.",
        )
        .param("city", ParameterSpec::new("string", "City name, e.g. 'Beijing'"))
        .param(
            "kind",
            ParameterSpec::new("string", "What to fetch: 'current', 'forecast' or 'index'")
                .with_default(json!("current"))
                .with_enum(vec![json!("current"), json!("forecast"), json!("index")]),
        )
        .param(
            "days",
            ParameterSpec::new("integer", "Forecast days (1-7), only for 'forecast'").with_default(json!(3)),
        )
    }

    async fn execute(&self, args: &ToolArgs) -> CoreResult<Value> {
        let city = arg_str(NAME, args, "city")?.trim();
        if city.is_empty() {
            return Ok(json!({ "error": "city must not be empty" }));
        }
        let kind = arg_str_or(NAME, args, "kind", "current")?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let days = arg_f64_or(NAME, args, "days", 3.0)?.clamp(1.0, MAX_FORECAST_DAYS as f64) as usize;

        let Some(api_key) = self.config.api_key.as_deref() else {
            return Ok(json!({ "error": "weather is not configured (missing API key)" }));
        };

        let url = match kind {
            "current" => &self.config.weather_url,
            "forecast" => &self.config.forecast_url,
            "index" => &self.config.index_url,
            other => return Ok(json!({ "error": format!("unknown kind '{other}'") })),
        };
        let body = self.fetch(url, api_key, city).await?;
        tracing::debug!(city, kind, "Weather lookup finished");

        let parsed = match kind {
            "current" => parse_current(&body).map(|now| json!({ "city": city, "current": now })),
            "forecast" => parse_forecast(&body, days)
                .map(|forecast| json!({ "city": city, "forecast": forecast })),
            _ => parse_index(&body).map(|indices| json!({ "city": city, "indices": indices })),
        };
        Ok(parsed.unwrap_or_else(|e| json!({ "error": e })))
    }
}
