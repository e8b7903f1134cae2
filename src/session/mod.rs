//! Session module - Conversation state for one interactive run
//!
//! A [`Session`] owns the ordered, append-only log of turns that forms the
//! model's context, plus the identifier of the model currently in use.
//! Sessions live only as long as the process; nothing is persisted.
//!
//! # Example
//!
//! ```
//! use robotcli::session::{Session, Turn};
//!
//! let session = Session::new("You are helpful.", "google/gemini-2.0-flash-001");
//! assert_eq!(session.len(), 1);
//! assert_eq!(session.system_turn().text(), "You are helpful.");
//! ```

pub mod types;

pub use types::{Invocation, Role, Turn};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Result, RobotError};

/// Conversation state for one interactive run.
///
/// The first turn is always the system turn given to [`Session::new`]; it is
/// never removed or replaced. Turns are only added through
/// [`Session::append`], which rejects any turn that would break the
/// correlation between an assistant invocation batch and its tool results.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// When the session was started
    pub created_at: DateTime<Utc>,
    turns: Vec<Turn>,
    model: String,
}

impl Session {
    /// Start a session with its fixed system turn and an initial model.
    pub fn new(system_prompt: &str, model: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            turns: vec![Turn::system(system_prompt)],
            model: model.to_string(),
        }
    }

    /// All turns in chronological order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false: a session holds at least its system turn.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn system_turn(&self) -> &Turn {
        &self.turns[0]
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Model identifier used for the next request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Swap the model between turns. The conversation is kept as is.
    pub fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    /// Invocations of the latest assistant batch that have no result yet.
    ///
    /// Returns the batch and the number of results already appended, or
    /// `None` when no batch is waiting for results.
    pub fn pending_invocations(&self) -> Option<(&[Invocation], usize)> {
        let answered = self
            .turns
            .iter()
            .rev()
            .take_while(|t| t.is_tool_result())
            .count();
        let batch_index = self.turns.len().checked_sub(answered + 1)?;
        let batch = &self.turns[batch_index];
        if batch.role == Role::Assistant && answered < batch.invocations.len() {
            Some((batch.invocations.as_slice(), answered))
        } else {
            None
        }
    }

    /// Append a turn, enforcing the conversation invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Session`] when the turn is a second system
    /// turn, a tool result that does not answer the next outstanding
    /// invocation, or any other turn while invocations are still awaiting
    /// results.
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        let pending = self.pending_invocations();
        match turn.role {
            Role::System => {
                return Err(RobotError::Session(
                    "the system turn is fixed at session start".into(),
                ));
            }
            Role::Tool => {
                let (batch, answered) = pending.ok_or_else(|| {
                    RobotError::Session("tool result without an outstanding invocation".into())
                })?;
                let expected = &batch[answered].id;
                if turn.invocation_id.as_deref() != Some(expected.as_str()) {
                    return Err(RobotError::Session(format!(
                        "tool result for {:?} out of order, expected {}",
                        turn.invocation_id, expected
                    )));
                }
            }
            Role::User | Role::Assistant => {
                if let Some((batch, answered)) = pending {
                    return Err(RobotError::Session(format!(
                        "{} invocation(s) still awaiting results",
                        batch.len() - answered
                    )));
                }
            }
        }
        self.turns.push(turn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("system prompt", "test-model")
    }

    #[test]
    fn test_new_session_has_system_turn() {
        let s = session();
        assert_eq!(s.len(), 1);
        assert_eq!(s.system_turn().role, Role::System);
        assert_eq!(s.model(), "test-model");
        assert!(!s.is_empty());
    }

    #[test]
    fn test_second_system_turn_rejected() {
        let mut s = session();
        let err = s.append(Turn::system("override")).unwrap_err();
        assert!(matches!(err, RobotError::Session(_)));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_full_tool_exchange() {
        let mut s = session();
        s.append(Turn::user("list files")).unwrap();
        s.append(Turn::assistant_invocations(vec![
            Invocation::new("call_1", "list_directory", "{}"),
            Invocation::new("call_2", "read_file", "{}"),
        ]))
        .unwrap();

        let (batch, answered) = s.pending_invocations().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(answered, 0);

        s.append(Turn::tool_result("call_1", "list_directory", "ok"))
            .unwrap();
        assert_eq!(s.pending_invocations().unwrap().1, 1);
        s.append(Turn::tool_result("call_2", "read_file", "ok"))
            .unwrap();
        assert!(s.pending_invocations().is_none());

        s.append(Turn::assistant("done")).unwrap();
        assert_eq!(s.len(), 6);
    }

    #[test]
    fn test_out_of_order_result_rejected() {
        let mut s = session();
        s.append(Turn::user("go")).unwrap();
        s.append(Turn::assistant_invocations(vec![
            Invocation::new("a", "x", "{}"),
            Invocation::new("b", "y", "{}"),
        ]))
        .unwrap();
        assert!(s.append(Turn::tool_result("b", "y", "ok")).is_err());
        assert!(s.append(Turn::tool_result("a", "x", "ok")).is_ok());
    }

    #[test]
    fn test_orphan_tool_result_rejected() {
        let mut s = session();
        s.append(Turn::user("hi")).unwrap();
        assert!(s.append(Turn::tool_result("call_1", "x", "ok")).is_err());
    }

    #[test]
    fn test_answer_blocked_while_results_pending() {
        let mut s = session();
        s.append(Turn::user("hi")).unwrap();
        s.append(Turn::assistant_invocations(vec![Invocation::new(
            "a", "x", "{}",
        )]))
        .unwrap();
        let err = s.append(Turn::assistant("too early")).unwrap_err();
        assert!(err.to_string().contains("awaiting results"));
    }

    #[test]
    fn test_set_model_keeps_history() {
        let mut s = session();
        s.append(Turn::user("hi")).unwrap();
        s.set_model("other-model");
        assert_eq!(s.model(), "other-model");
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut a = session();
        let b = session();
        a.append(Turn::user("only in a")).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
        assert_ne!(a.id, b.id);
    }
}
