//! The orchestration loop.
//!
//! One call to [`AgentLoop::process_turn`] takes a user message through the
//! turn state machine:
//!
//! ```text
//! AwaitingUserInput -> ModelRequested -> FinalReceived -> AwaitingUserInput
//!                                     \
//!                                      -> InvocationsReceived -> Executing
//!                                         -> SynthesisRequested -> FinalReceived
//! ```
//!
//! Tools are offered once per user turn. After a batch has run, the model is
//! asked for a text-only synthesis; it is never offered tools again in the
//! same turn.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, RobotError};
use crate::providers::{CompletionRequest, LLMProvider, ModelReply};
use crate::session::{Invocation, Session, Turn};
use crate::tools::{Dispatcher, InvocationResult, InvocationStatus, ToolContext, ToolDefinition};

use super::events::{emit, AgentEvent, EventSender};

/// States of a single user turn.
#[derive(Debug)]
enum TurnState {
    AwaitingUserInput,
    ModelRequested,
    InvocationsReceived(Vec<Invocation>),
    Executing(Vec<Invocation>),
    SynthesisRequested,
    FinalReceived(String),
}

impl TurnState {
    fn name(&self) -> &'static str {
        match self {
            TurnState::AwaitingUserInput => "awaiting_user_input",
            TurnState::ModelRequested => "model_requested",
            TurnState::InvocationsReceived(_) => "invocations_received",
            TurnState::Executing(_) => "executing",
            TurnState::SynthesisRequested => "synthesis_requested",
            TurnState::FinalReceived(_) => "final_received",
        }
    }
}

/// Drives conversations between a user, a model and the tool registry.
///
/// The loop holds no conversation state of its own; each call borrows the
/// [`Session`] it advances, so one loop can serve several independent
/// sessions.
pub struct AgentLoop {
    provider: Arc<dyn LLMProvider>,
    dispatcher: Dispatcher,
    catalog: Vec<ToolDefinition>,
    tool_ctx: ToolContext,
    model_retries: u32,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn LLMProvider>, dispatcher: Dispatcher) -> Self {
        let catalog = dispatcher.registry().definitions();
        Self {
            provider,
            dispatcher,
            catalog,
            tool_ctx: ToolContext::new(),
            model_retries: 0,
        }
    }

    pub fn with_tool_context(mut self, ctx: ToolContext) -> Self {
        self.tool_ctx = ctx;
        self
    }

    /// Retry the first model call of a turn this many extra times when the
    /// model is unavailable.
    pub fn with_model_retries(mut self, retries: u32) -> Self {
        self.model_retries = retries;
        self
    }

    /// Catalog advertised to the model.
    pub fn catalog(&self) -> &[ToolDefinition] {
        &self.catalog
    }

    /// Process one user message to completion.
    ///
    /// Emits `Status` events while tools run and exactly one `Content` event
    /// at the end. On failure the `Content` event carries the error and the
    /// session keeps every turn appended so far.
    pub async fn process_turn(
        &self,
        session: &mut Session,
        input: &str,
        events: &EventSender,
    ) -> Result<String> {
        self.process_turn_with_cancel(session, input, events, &CancellationToken::new())
            .await
    }

    /// Like [`process_turn`](Self::process_turn), stopping at the next model
    /// call or tool call once `cancel` fires.
    pub async fn process_turn_with_cancel(
        &self,
        session: &mut Session,
        input: &str,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<String> {
        info!(session = %session.id, model = session.model(), "Processing user turn");

        let outcome = self.run_turn(session, input, events, cancel).await;
        match outcome {
            Ok(ref answer) => emit(events, AgentEvent::Content(answer.clone())),
            Err(ref e) => {
                warn!(session = %session.id, error = %e, "Turn ended with error");
                emit(events, AgentEvent::Content(format!("Error: {}", e)));
            }
        }
        outcome
    }

    async fn run_turn(
        &self,
        session: &mut Session,
        input: &str,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut state = TurnState::AwaitingUserInput;
        loop {
            debug!(state = state.name(), turns = session.len(), "Turn state");
            state = match state {
                TurnState::AwaitingUserInput => {
                    session.append(Turn::user(input))?;
                    TurnState::ModelRequested
                }
                TurnState::ModelRequested => match self.request_with_tools(session, events, cancel).await? {
                    ModelReply::FinalAnswer(text) => TurnState::FinalReceived(text),
                    ModelReply::InvocationBatch(batch) => TurnState::InvocationsReceived(batch),
                },
                TurnState::InvocationsReceived(batch) => {
                    info!(count = batch.len(), "Model requested tools");
                    session.append(Turn::assistant_invocations(batch.clone()))?;
                    TurnState::Executing(batch)
                }
                TurnState::Executing(batch) => {
                    self.execute_batch(session, &batch, events, cancel).await?;
                    if cancel.is_cancelled() {
                        return Err(RobotError::Cancelled);
                    }
                    TurnState::SynthesisRequested
                }
                TurnState::SynthesisRequested => {
                    let request = CompletionRequest::text_only(session.model(), session.turns());
                    match self.call_model(request, cancel).await? {
                        ModelReply::FinalAnswer(text) => TurnState::FinalReceived(text),
                        ModelReply::InvocationBatch(batch) => {
                            return Err(RobotError::UnexpectedReply(format!(
                                "model requested {} tool call(s) during synthesis",
                                batch.len()
                            )));
                        }
                    }
                }
                TurnState::FinalReceived(text) => {
                    session.append(Turn::assistant(&text))?;
                    debug!(state = TurnState::AwaitingUserInput.name(), "Turn complete");
                    return Ok(text);
                }
            };
        }
    }

    /// First model call of the turn, with the catalog and loop-level retries.
    async fn request_with_tools(
        &self,
        session: &Session,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<ModelReply> {
        let mut attempt = 0;
        loop {
            let request =
                CompletionRequest::with_tools(session.model(), session.turns(), &self.catalog);
            match self.call_model(request, cancel).await {
                Err(RobotError::ModelUnavailable(reason)) if attempt < self.model_retries => {
                    attempt += 1;
                    warn!(%reason, attempt, "Model unavailable, retrying");
                    emit(
                        events,
                        AgentEvent::Status(format!(
                            "Model unavailable, retrying ({}/{})...",
                            attempt, self.model_retries
                        )),
                    );
                }
                other => return other,
            }
        }
    }

    async fn call_model(
        &self,
        request: CompletionRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<ModelReply> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RobotError::Cancelled),
            reply = self.provider.complete(request) => reply,
        }
    }

    /// Run every invocation in issue order, appending each result as soon as
    /// it is available. Once cancelled, the remaining invocations are
    /// recorded as cancelled so the batch stays fully answered.
    async fn execute_batch(
        &self,
        session: &mut Session,
        batch: &[Invocation],
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for invocation in batch {
            let result = if cancel.is_cancelled() {
                InvocationResult::cancelled(invocation)
            } else {
                emit(
                    events,
                    AgentEvent::Status(format!("Running {}...", invocation.name)),
                );
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => InvocationResult::cancelled(invocation),
                    result = self.dispatcher.execute(invocation, &self.tool_ctx) => result,
                };
                if result.status != InvocationStatus::Cancelled {
                    emit(
                        events,
                        AgentEvent::Status(format!("Completed {}.", invocation.name)),
                    );
                }
                result
            };

            debug!(
                tool = %result.capability,
                id = %result.invocation_id,
                status = ?result.status,
                "Invocation finished"
            );
            session.append(Turn::tool_result(
                &result.invocation_id,
                &result.capability,
                &result.text,
            ))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::events::channel;
    use crate::session::Role;
    use crate::tools::{Tool, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records which calls offered tools.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<ModelReply>>>,
        offered_tools: Mutex<Vec<bool>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<ModelReply>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                offered_tools: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply> {
            self.offered_tools
                .lock()
                .unwrap()
                .push(request.tools.is_some());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RobotError::ModelUnavailable("script exhausted".into())))
        }
    }

    struct PingTool;

    #[async_trait]
    impl Tool for PingTool {
        fn name(&self) -> &str {
            "ping"
        }
        fn description(&self) -> &str {
            "Reply pong"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String> {
            Ok("pong".into())
        }
    }

    fn agent(provider: Arc<ScriptedProvider>) -> AgentLoop {
        let registry = ToolRegistry::new(vec![Box::new(PingTool)]).unwrap();
        AgentLoop::new(provider, Dispatcher::new(Arc::new(registry)))
    }

    fn drain(rx: &mut crate::agent::EventReceiver) -> Vec<AgentEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e);
        }
        out
    }

    #[tokio::test]
    async fn test_direct_final_answer() {
        let provider = ScriptedProvider::new(vec![Ok(ModelReply::FinalAnswer("hi".into()))]);
        let agent = agent(provider.clone());
        let mut session = Session::new("sys", "m");
        let (tx, mut rx) = channel();

        let answer = agent.process_turn(&mut session, "hello", &tx).await.unwrap();
        assert_eq!(answer, "hi");
        assert_eq!(session.len(), 3);
        assert_eq!(drain(&mut rx), vec![AgentEvent::Content("hi".into())]);
        assert_eq!(*provider.offered_tools.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn test_batch_then_synthesis_without_tools() {
        let provider = ScriptedProvider::new(vec![
            Ok(ModelReply::InvocationBatch(vec![Invocation::new("c1", "ping", "{}")])),
            Ok(ModelReply::FinalAnswer("got pong".into())),
        ]);
        let agent = agent(provider.clone());
        let mut session = Session::new("sys", "m");
        let (tx, mut rx) = channel();

        agent.process_turn(&mut session, "ping it", &tx).await.unwrap();

        let roles: Vec<Role> = session.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(session.turns()[3].text(), "pong");
        assert_eq!(*provider.offered_tools.lock().unwrap(), vec![true, false]);
        assert_eq!(
            drain(&mut rx),
            vec![
                AgentEvent::Status("Running ping...".into()),
                AgentEvent::Status("Completed ping.".into()),
                AgentEvent::Content("got pong".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_tools_requested_during_synthesis_ends_turn() {
        let provider = ScriptedProvider::new(vec![
            Ok(ModelReply::InvocationBatch(vec![Invocation::new("c1", "ping", "{}")])),
            Ok(ModelReply::InvocationBatch(vec![Invocation::new("c2", "ping", "{}")])),
        ]);
        let agent = agent(provider);
        let mut session = Session::new("sys", "m");
        let (tx, mut rx) = channel();

        let err = agent.process_turn(&mut session, "go", &tx).await.unwrap_err();
        assert!(matches!(err, RobotError::UnexpectedReply(_)));
        // user, assistant batch, tool result; no final answer
        assert_eq!(session.len(), 4);
        let events = drain(&mut rx);
        assert!(events.last().unwrap().text().starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_retry_on_model_unavailable() {
        let provider = ScriptedProvider::new(vec![
            Err(RobotError::ModelUnavailable("503".into())),
            Ok(ModelReply::FinalAnswer("recovered".into())),
        ]);
        let agent = agent(provider).with_model_retries(1);
        let mut session = Session::new("sys", "m");
        let (tx, mut rx) = channel();

        let answer = agent.process_turn(&mut session, "hi", &tx).await.unwrap();
        assert_eq!(answer, "recovered");
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events[0].text().contains("retrying (1/1)"));
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let provider = ScriptedProvider::new(vec![
            Err(RobotError::ModelUnavailable("503".into())),
            Ok(ModelReply::FinalAnswer("never".into())),
        ]);
        let agent = agent(provider);
        let mut session = Session::new("sys", "m");
        let (tx, _rx) = channel();
        assert!(agent.process_turn(&mut session, "hi", &tx).await.is_err());
        assert_eq!(session.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_model_call() {
        let provider = ScriptedProvider::new(vec![Ok(ModelReply::FinalAnswer("late".into()))]);
        let agent = agent(provider);
        let mut session = Session::new("sys", "m");
        let (tx, mut rx) = channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = agent
            .process_turn_with_cancel(&mut session, "hi", &tx, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RobotError::Cancelled));
        assert_eq!(session.len(), 2);
        assert_eq!(
            drain(&mut rx),
            vec![AgentEvent::Content("Error: request cancelled".into())]
        );
    }

    /// Cancels the turn from inside its own execution, then never finishes.
    struct CancellingTool {
        token: CancellationToken,
    }

    #[async_trait]
    impl Tool for CancellingTool {
        fn name(&self) -> &str {
            "hang"
        }
        fn description(&self) -> &str {
            "Cancel the turn and wait"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String> {
            self.token.cancel();
            std::future::pending::<()>().await;
            Ok("unreachable".into())
        }
    }

    #[tokio::test]
    async fn test_cancelled_mid_batch_answers_every_invocation() {
        let cancel = CancellationToken::new();
        let provider = ScriptedProvider::new(vec![
            Ok(ModelReply::InvocationBatch(vec![
                Invocation::new("c1", "ping", "{}"),
                Invocation::new("c2", "hang", "{}"),
                Invocation::new("c3", "ping", "{}"),
            ])),
            Ok(ModelReply::FinalAnswer("fresh start".into())),
        ]);
        let registry = ToolRegistry::new(vec![
            Box::new(PingTool),
            Box::new(CancellingTool {
                token: cancel.clone(),
            }),
        ])
        .unwrap();
        let agent = AgentLoop::new(provider.clone(), Dispatcher::new(Arc::new(registry)));
        let mut session = Session::new("sys", "m");
        let (tx, mut rx) = channel();

        let err = agent
            .process_turn_with_cancel(&mut session, "go", &tx, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RobotError::Cancelled));

        let results: Vec<&Turn> = session.turns().iter().filter(|t| t.is_tool_result()).collect();
        let ids: Vec<&str> = results
            .iter()
            .map(|t| t.invocation_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(results[0].text(), "pong");
        assert_eq!(results[1].text(), "Execution Error: cancelled before execution");
        assert_eq!(results[2].text(), "Execution Error: cancelled before execution");
        assert!(session.pending_invocations().is_none());

        // No synthesis was requested
        assert_eq!(*provider.offered_tools.lock().unwrap(), vec![true]);
        assert_eq!(
            drain(&mut rx),
            vec![
                AgentEvent::Status("Running ping...".into()),
                AgentEvent::Status("Completed ping.".into()),
                AgentEvent::Status("Running hang...".into()),
                AgentEvent::Content("Error: request cancelled".into()),
            ]
        );

        let answer = agent.process_turn(&mut session, "again", &tx).await.unwrap();
        assert_eq!(answer, "fresh start");
        assert_eq!(session.len(), 8);
        assert_eq!(session.last().unwrap().text(), "fresh start");
    }

    #[test]
    fn test_state_names() {
        assert_eq!(TurnState::AwaitingUserInput.name(), "awaiting_user_input");
        assert_eq!(TurnState::Executing(Vec::new()).name(), "executing");
    }
}
