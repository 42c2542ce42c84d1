//! Transcript Turns
//!
//! The conversation exchanged with the model during a run. A turn carries
//! either plain text or a list of structured parts (text, tool requests,
//! tool responses).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a turn's author
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input (including the synthetic synthesis prompt)
    User,
    /// Model output
    Assistant,
    /// Tool results folded back into the conversation
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool invocation requested by the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Tool identifier
    pub name: String,

    /// Arguments as sent by the model; normally an object
    #[serde(default = "empty_arguments")]
    pub arguments: Value,

    /// Call ID for log correlation (assigned by the loop when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>, arguments: serde_json::Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments: Value::Object(arguments),
            id: None,
        }
    }

    /// Build from a JSON value. Absent (`null`) arguments mean none; any
    /// other shape is kept so dispatch can reject it.
    pub fn from_value(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments: if arguments.is_null() { empty_arguments() } else { arguments },
            id: None,
        }
    }

    /// Named arguments, if the model sent an object
    pub fn args(&self) -> Option<&serde_json::Map<String, Value>> {
        self.arguments.as_object()
    }
}

fn empty_arguments() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One structured piece of a turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    /// Free text remark
    Text(String),
    /// Tool invocation request (assistant turns)
    ToolRequest(ToolRequest),
    /// Tool result keyed by tool name (tool turns)
    ToolResponse { name: String, response: Value },
}

/// Turn payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Content {
    #[serde(rename = "content")]
    Text(String),
    #[serde(rename = "parts")]
    Parts(Vec<Part>),
}

/// A single turn in a transcript
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,

    #[serde(flatten)]
    pub content: Content,
}

impl Turn {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Content::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// Assistant turn holding an optional remark followed by every request, in order
    pub fn tool_requests(remark: Option<&str>, requests: &[ToolRequest]) -> Self {
        let mut parts = Vec::with_capacity(requests.len() + 1);
        if let Some(remark) = remark {
            parts.push(Part::Text(remark.to_string()));
        }
        parts.extend(requests.iter().cloned().map(Part::ToolRequest));
        Self {
            role: Role::Assistant,
            content: Content::Parts(parts),
        }
    }

    /// Tool turn holding one response part per `(name, payload)`, in order
    pub fn tool_responses(responses: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            role: Role::Tool,
            content: Content::Parts(
                responses
                    .into_iter()
                    .map(|(name, response)| Part::ToolResponse { name, response })
                    .collect(),
            ),
        }
    }

    pub fn parts(&self) -> &[Part] {
        match &self.content {
            Content::Parts(parts) => parts,
            Content::Text(_) => &[],
        }
    }

    /// Plain text of the turn: the text payload, or all text parts joined
    pub fn text_content(&self) -> Option<String> {
        match &self.content {
            Content::Text(text) => Some(text.clone()),
            Content::Parts(parts) => {
                let texts: Vec<&str> = parts
                    .iter()
                    .filter_map(|p| match p {
                        Part::Text(t) => Some(t.as_str()),
                        _ => None,
                    })
                    .collect();
                (!texts.is_empty()).then(|| texts.join("\n"))
            }
        }
    }

    pub fn request_count(&self) -> usize {
        self.parts()
            .iter()
            .filter(|p| matches!(p, Part::ToolRequest(_)))
            .count()
    }

    pub fn response_count(&self) -> usize {
        self.parts()
            .iter()
            .filter(|p| matches!(p, Part::ToolResponse { .. }))
            .count()
    }
}
