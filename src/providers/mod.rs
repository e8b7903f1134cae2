//! Providers module - LLM backends
//!
//! The agent loop only talks to the [`LLMProvider`] trait. A provider turns
//! the conversation and an optional tool catalog into a [`ModelReply`]:
//! either a final textual answer or an ordered batch of invocations.
//! Providers never retry; transport failures come back as
//! [`RobotError::ModelUnavailable`](crate::error::RobotError::ModelUnavailable).

pub mod openai;

pub use openai::OpenAiCompatProvider;

use async_trait::async_trait;

use crate::error::Result;
use crate::session::{Invocation, Turn};
use crate::tools::ToolDefinition;

/// Whether the model may request tools on this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
        }
    }
}

/// One model call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub turns: &'a [Turn],
    pub tools: Option<&'a [ToolDefinition]>,
    pub tool_choice: ToolChoice,
}

impl<'a> CompletionRequest<'a> {
    /// Request offering the full catalog, tool choice left to the model.
    pub fn with_tools(model: &'a str, turns: &'a [Turn], tools: &'a [ToolDefinition]) -> Self {
        Self {
            model,
            turns,
            tools: Some(tools),
            tool_choice: ToolChoice::Auto,
        }
    }

    /// Request without a catalog, forcing a textual answer.
    pub fn text_only(model: &'a str, turns: &'a [Turn]) -> Self {
        Self {
            model,
            turns,
            tools: None,
            tool_choice: ToolChoice::None,
        }
    }
}

/// What the model answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    FinalAnswer(String),
    InvocationBatch(Vec<Invocation>),
}

impl ModelReply {
    pub fn is_final(&self) -> bool {
        matches!(self, ModelReply::FinalAnswer(_))
    }
}

/// A chat model that understands tool calling.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Send the conversation and return the model's reply.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply>;
}
