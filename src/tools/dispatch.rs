//! Dispatcher - runs model-issued invocations against the registry
//!
//! [`Dispatcher::execute`] never fails. Unknown names, malformed argument
//! payloads, handler errors and timeouts all come back as an
//! [`InvocationResult`] whose text is fed to the model so it can retry or
//! explain the problem to the user.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::RobotError;
use crate::session::Invocation;

use super::{required_fields, Tool, ToolContext, ToolRegistry};

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    Ok,
    NotImplemented,
    MalformedArguments,
    Failed,
    TimedOut,
    Cancelled,
}

/// Textual outcome of one invocation, correlated by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub invocation_id: String,
    pub capability: String,
    pub status: InvocationStatus,
    pub text: String,
}

impl InvocationResult {
    fn new(invocation: &Invocation, status: InvocationStatus, text: String) -> Self {
        Self {
            invocation_id: invocation.id.clone(),
            capability: invocation.name.clone(),
            status,
            text,
        }
    }

    /// Result recorded for an invocation that was never started.
    pub fn cancelled(invocation: &Invocation) -> Self {
        Self::new(
            invocation,
            InvocationStatus::Cancelled,
            "Execution Error: cancelled before execution".to_string(),
        )
    }

    pub fn is_ok(&self) -> bool {
        self.status == InvocationStatus::Ok
    }
}

/// Stateless executor over an immutable [`ToolRegistry`].
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Bound every handler call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one invocation and normalize its outcome to text.
    ///
    /// # Example
    /// ```rust
    /// use std::sync::Arc;
    /// use robotcli::session::Invocation;
    /// use robotcli::tools::{Dispatcher, InvocationStatus, ToolContext, ToolRegistry};
    ///
    /// # tokio_test::block_on(async {
    /// let dispatcher = Dispatcher::new(Arc::new(ToolRegistry::builtin().unwrap()));
    /// let inv = Invocation::new("call_1", "frobnicate", "{}");
    /// let result = dispatcher.execute(&inv, &ToolContext::new()).await;
    /// assert_eq!(result.status, InvocationStatus::NotImplemented);
    /// # });
    /// ```
    pub async fn execute(&self, invocation: &Invocation, ctx: &ToolContext) -> InvocationResult {
        let name = invocation.name.as_str();

        let Some(tool) = self.registry.lookup(name) else {
            warn!(tool = name, "Model requested unknown tool");
            return InvocationResult::new(
                invocation,
                InvocationStatus::NotImplemented,
                format!("Error: {}", RobotError::ToolNotFound(name.to_string())),
            );
        };

        let args = match validate_arguments(tool, invocation) {
            Ok(args) => args,
            Err(detail) => {
                warn!(tool = name, %detail, "Malformed tool arguments");
                return malformed(invocation, &detail);
            }
        };

        debug!(tool = name, id = %invocation.id, "Executing tool");
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, tool.execute(args, ctx)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(tool = name, "Tool timed out");
                    return InvocationResult::new(
                        invocation,
                        InvocationStatus::TimedOut,
                        format!(
                            "Execution Error: {} timed out after {}s",
                            name,
                            limit.as_secs()
                        ),
                    );
                }
            },
            None => tool.execute(args, ctx).await,
        };

        match outcome {
            Ok(text) => InvocationResult::new(invocation, InvocationStatus::Ok, text),
            Err(RobotError::InvalidArguments(detail)) => {
                warn!(tool = name, %detail, "Tool rejected arguments");
                malformed(invocation, &detail)
            }
            Err(e) => {
                warn!(tool = name, error = %e, "Tool execution failed");
                InvocationResult::new(
                    invocation,
                    InvocationStatus::Failed,
                    format!("Execution Error: {}", e),
                )
            }
        }
    }
}

/// Parse the raw payload and check it against the tool's declared parameters.
fn validate_arguments(tool: &dyn Tool, invocation: &Invocation) -> std::result::Result<Value, String> {
    let raw = invocation.arguments.trim();
    let args: Value = if raw.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(raw).map_err(|e| e.to_string())?
    };

    let Some(fields) = args.as_object() else {
        return Err(format!("expected a JSON object, got {}", args));
    };

    let schema = tool.parameters();
    let missing: Vec<&str> = required_fields(&schema)
        .into_iter()
        .filter(|field| fields.get(*field).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing required parameter(s): {}", missing.join(", ")));
    }

    Ok(args)
}

fn malformed(invocation: &Invocation, detail: &str) -> InvocationResult {
    InvocationResult::new(
        invocation,
        InvocationStatus::MalformedArguments,
        format!(
            "Execution Error: invalid arguments for {}: {}",
            invocation.name, detail
        ),
    )
}
