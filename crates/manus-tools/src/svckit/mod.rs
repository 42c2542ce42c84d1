//! Service Kit - Agent Tools
//!
//! Built-in tools that implement `manus_core::Tool`.

mod calculator;
mod datetime;
mod weather;
mod web_search;

pub use calculator::{CalculatorTool, evaluate};
pub use datetime::DateTimeTool;
pub use weather::{CurrentWeather, ForecastDay, LivingIndex, WeatherConfig, WeatherTool};
pub use web_search::{SearchConfig, SearchEngine, SearchHit, WebSearchTool};
