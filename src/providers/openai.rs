//! OpenAI-compatible Chat Completions provider
//!
//! Works with any endpoint that speaks the Chat Completions protocol with
//! function calling; the default base URL is OpenRouter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, RobotError};
use crate::session::{Invocation, Role, Turn};
use crate::tools::ToolDefinition;

use super::{CompletionRequest, LLMProvider, ModelReply};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Provider for OpenAI-compatible chat completion APIs.
pub struct OpenAiCompatProvider {
    client: HttpClient,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatProvider {
    /// Create a provider with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Config`] if the HTTP client cannot be built.
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RobotError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ChatFunction<'a>,
}

#[derive(Debug, Serialize)]
struct ChatFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: ChatToolCallFunction,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatToolCall>>,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

fn to_message(turn: &Turn) -> ChatMessage {
    let tool_calls = turn.has_invocations().then(|| {
        turn.invocations
            .iter()
            .map(|inv| ChatToolCall {
                id: inv.id.clone(),
                call_type: function_type(),
                function: ChatToolCallFunction {
                    name: inv.name.clone(),
                    arguments: inv.arguments.clone(),
                },
            })
            .collect()
    });

    ChatMessage {
        role: turn.role.as_str(),
        content: turn.content.clone(),
        tool_calls,
        tool_call_id: turn.invocation_id.clone(),
        name: match turn.role {
            Role::Tool => turn.capability.clone(),
            _ => None,
        },
    }
}

fn build_request<'a>(request: &CompletionRequest<'a>) -> ChatRequest<'a> {
    let tools = request.tools.map(|defs: &'a [ToolDefinition]| {
        defs.iter()
            .map(|d| ChatTool {
                tool_type: "function",
                function: ChatFunction {
                    name: &d.name,
                    description: &d.description,
                    parameters: &d.parameters,
                },
            })
            .collect()
    });

    ChatRequest {
        model: request.model,
        messages: request.turns.iter().map(to_message).collect(),
        tool_choice: tools.as_ref().map(|_| request.tool_choice.as_str()),
        tools,
    }
}

fn parse_response(body: &str) -> Result<ModelReply> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| RobotError::ModelUnavailable(format!("invalid response body: {}", e)))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| RobotError::ModelUnavailable("response contained no choices".into()))?;

    match choice.message.tool_calls {
        Some(calls) if !calls.is_empty() => Ok(ModelReply::InvocationBatch(
            calls
                .into_iter()
                .map(|c| Invocation {
                    id: c.id,
                    name: c.function.name,
                    arguments: c.function.arguments,
                })
                .collect(),
        )),
        _ => Ok(ModelReply::FinalAnswer(
            choice.message.content.unwrap_or_default(),
        )),
    }
}

#[async_trait]
impl LLMProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply> {
        let body = build_request(&request);
        debug!(
            model = request.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map_or(0, Vec::len),
            "Sending chat completion"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RobotError::ModelUnavailable("request timed out".into())
                } else {
                    RobotError::ModelUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RobotError::ModelUnavailable(e.to_string()))?;

        if !status.is_success() {
            warn!(%status, "Chat completion failed");
            return Err(RobotError::ModelUnavailable(format!(
                "HTTP {}: {}",
                status,
                text.chars().take(500).collect::<String>()
            )));
        }

        parse_response(&text)
    }
}
