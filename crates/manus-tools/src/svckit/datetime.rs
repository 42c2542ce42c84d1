//! DateTime Tool
//!
//! Returns the current date and time in a requested format and UTC offset.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{Value, json};

use manus_core::{
    Result as CoreResult, Tool, ToolArgs, ToolSpec,
    tool::{ParameterSpec, arg_f64_or, arg_str_or},
};

const NAME: &str = "datetime";

/// DateTime tool - returns current time
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(NAME, "Get the current date and time")
            .param(
                "format",
                ParameterSpec::new("string", "Output format: 'human', 'iso', or 'unix'")
                    .with_default(json!("human"))
                    .with_enum(vec![json!("human"), json!("iso"), json!("unix")]),
            )
            .param(
                "utc_offset",
                ParameterSpec::new("number", "Offset from UTC in hours, e.g. 8 for UTC+8")
                    .with_default(json!(0)),
            )
    }

    async fn execute(&self, args: &ToolArgs) -> CoreResult<Value> {
        let format = arg_str_or(NAME, args, "format", "human")?;
        let offset_hours = arg_f64_or(NAME, args, "utc_offset", 0.0)?;

        Ok(render(Utc::now(), format, offset_hours))
    }
}

fn render(now: DateTime<Utc>, format: &str, offset_hours: f64) -> Value {
    if !(-12.0..=14.0).contains(&offset_hours) {
        return json!({ "error": format!("utc_offset {offset_hours} is outside -12..=14 hours") });
    }
    #[allow(clippy::cast_possible_truncation)]
    let offset_secs = (offset_hours * 3600.0).round() as i32;
    let Some(offset) = FixedOffset::east_opt(offset_secs) else {
        return json!({ "error": format!("invalid utc_offset {offset_hours}") });
    };
    let local = now.with_timezone(&offset);

    let datetime = match format {
        "iso" => local.to_rfc3339(),
        "unix" => now.timestamp().to_string(),
        "human" => local.format("%A, %B %d, %Y at %H:%M:%S (UTC%:z)").to_string(),
        other => return json!({ "error": format!("unknown format '{other}'") }),
    };

    json!({
        "datetime": datetime,
        "weekday": local.format("%A").to_string(),
        "utc_offset": offset.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 22, 30, 0).unwrap()
    }

    #[test]
    fn test_formats() {
        assert_eq!(render(fixed_now(), "iso", 0.0)["datetime"], "2024-03-01T22:30:00+00:00");
        assert_eq!(render(fixed_now(), "unix", 8.0)["datetime"], "1709332200");
        assert_eq!(
            render(fixed_now(), "human", 8.0)["datetime"],
            "Saturday, March 02, 2024 at 06:30:00 (UTC+08:00)"
        );
    }

    #[test]
    fn test_invalid_input_is_structured_error() {
        assert!(render(fixed_now(), "iso", 20.0).get("error").is_some());
        assert!(render(fixed_now(), "roman", 0.0).get("error").is_some());
    }

    #[test]
    fn test_spec_has_no_required_parameters() {
        assert!(DateTimeTool.spec().required().is_empty());
    }

    #[tokio::test]
    async fn test_execute_defaults() {
        let result = DateTimeTool.execute(&ToolArgs::new()).await.unwrap();
        assert_eq!(result["utc_offset"], "+00:00");
    }
}
