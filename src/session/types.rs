//! Conversation types: turns, roles and model-issued invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Wire name used by chat completion APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A model-issued request to run a named capability.
///
/// `arguments` is kept as the raw JSON text the model produced; it is only
/// parsed and validated by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Correlation token echoed back on the matching tool turn
    pub id: String,
    /// Capability name as requested by the model
    pub name: String,
    /// Raw argument payload
    pub arguments: String,
}

impl Invocation {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }
}

/// One entry of the conversation log.
///
/// Build turns through the role constructors; a turn is never mutated after
/// it has been appended to a [`Session`](super::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    /// Text for system, user, final assistant and tool turns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Invocations for an assistant turn that requested capabilities
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invocations: Vec<Invocation>,
    /// Invocation this tool turn answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    /// Capability that produced this tool turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn with_content(role: Role, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            invocations: Vec::new(),
            invocation_id: None,
            capability: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: &str) -> Self {
        Self::with_content(Role::System, content)
    }

    pub fn user(content: &str) -> Self {
        Self::with_content(Role::User, content)
    }

    /// Final natural-language assistant answer.
    pub fn assistant(content: &str) -> Self {
        Self::with_content(Role::Assistant, content)
    }

    /// Assistant turn carrying a batch of invocations and no text.
    pub fn assistant_invocations(invocations: Vec<Invocation>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            invocations,
            invocation_id: None,
            capability: None,
            timestamp: Utc::now(),
        }
    }

    /// Result of one invocation, correlated by id.
    pub fn tool_result(invocation_id: &str, capability: &str, text: &str) -> Self {
        Self {
            role: Role::Tool,
            content: Some(text.to_string()),
            invocations: Vec::new(),
            invocation_id: Some(invocation_id.to_string()),
            capability: Some(capability.to_string()),
            timestamp: Utc::now(),
        }
    }

    pub fn has_invocations(&self) -> bool {
        !self.invocations.is_empty()
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool
    }

    /// Text content, or an empty string for invocation-only turns.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}
