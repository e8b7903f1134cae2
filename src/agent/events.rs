//! Progress events emitted by the agent loop.

use tokio::sync::mpsc;

/// Something the observer (usually the terminal UI) should render.
///
/// Every user turn produces zero or more `Status` events followed by exactly
/// one `Content` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// In-progress notification such as "Running list_directory..."
    Status(String),
    /// Final answer, or the error that ended the turn
    Content(String),
}

impl AgentEvent {
    pub fn is_content(&self) -> bool {
        matches!(self, AgentEvent::Content(_))
    }

    pub fn text(&self) -> &str {
        match self {
            AgentEvent::Status(t) | AgentEvent::Content(t) => t,
        }
    }
}

/// Sending half handed to the loop. Unbounded so the loop never waits on
/// the observer.
pub type EventSender = mpsc::UnboundedSender<AgentEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<AgentEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send an event; a closed observer is not an error for the loop.
pub(crate) fn emit(events: &EventSender, event: AgentEvent) {
    let _ = events.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let status = AgentEvent::Status("Running x...".into());
        assert!(!status.is_content());
        assert_eq!(status.text(), "Running x...");
        assert!(AgentEvent::Content("done".into()).is_content());
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (tx, rx) = channel();
        drop(rx);
        emit(&tx, AgentEvent::Status("ignored".into()));
    }
}
