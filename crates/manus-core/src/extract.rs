//! Response Text Extraction
//!
//! Gateways hand back loosely-typed response objects. Every shape the loop
//! understands is listed in [`ResponseShape`]; anything else is
//! `Unrecognized` and yields no text.

use serde_json::Value;

/// Known layouts of a completion response
#[derive(Debug, PartialEq)]
pub enum ResponseShape<'a> {
    /// `{"candidates": [{"content": {"parts": [{"text": ..}, ..]}}]}`
    Candidates(&'a [Value]),
    /// `{"choices": [{"message": {"content": ..}}]}`
    Choices(&'a [Value]),
    /// `{"message": {"content": ..}}`
    Message(&'a Value),
    /// `{"text": ..}`
    Text(&'a str),
    /// `{"error": ..}` delivered as a body rather than a transport failure
    Error(&'a Value),
    Unrecognized,
}

impl<'a> ResponseShape<'a> {
    pub fn classify(response: &'a Value) -> Self {
        let Some(obj) = response.as_object() else {
            return Self::Unrecognized;
        };

        if let Some(error) = obj.get("error").filter(|e| !e.is_null()) {
            return Self::Error(error);
        }
        if let Some(candidates) = obj.get("candidates").and_then(Value::as_array) {
            return Self::Candidates(candidates);
        }
        if let Some(choices) = obj.get("choices").and_then(Value::as_array) {
            return Self::Choices(choices);
        }
        if let Some(message) = obj.get("message").filter(|m| m.is_object()) {
            return Self::Message(message);
        }
        match obj.get("text") {
            Some(Value::String(text)) => Self::Text(text),
            _ => Self::Unrecognized,
        }
    }

    /// Text carried by this shape, if any
    pub fn text(&self) -> Option<String> {
        let text = match self {
            Self::Candidates(candidates) => {
                let parts = candidates.first()?.get("content")?.get("parts")?.as_array()?;
                let texts: Vec<&str> = parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect();
                texts.concat()
            }
            Self::Choices(choices) => choices
                .first()?
                .get("message")?
                .get("content")?
                .as_str()?
                .to_string(),
            Self::Message(message) => message.get("content")?.as_str()?.to_string(),
            Self::Text(text) => (*text).to_string(),
            Self::Error(_) | Self::Unrecognized => return None,
        };
        Some(text)
    }
}

/// Locate the text of a completion; blank text counts as none
pub fn extract_text(response: &Value) -> Option<String> {
    let shape = ResponseShape::classify(response);
    let text = shape.text();
    if text.is_none() {
        tracing::warn!(?shape, "Could not extract text from model response");
    }
    text.filter(|t| !t.trim().is_empty())
}
