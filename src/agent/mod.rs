//! Agent module - Core conversation and tool orchestration
//!
//! This module provides the orchestration loop for RobotCLI. The agent is
//! responsible for:
//!
//! - Appending user input to the session's conversation
//! - Calling the LLM provider with the tool catalog
//! - Executing requested tools in order through the dispatcher
//! - Asking the model for a final, tool-free synthesis
//! - Emitting progress and answer events for the UI
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Terminal   │────>│  AgentLoop  │────>│ LLMProvider │
//! │  (input)    │     │             │     │ (OpenRouter)│
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                   │
//!        │ AgentEvent        │
//!        │                   ▼
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Events    │<────│   Session   │     │ Dispatcher/ │
//! │  (mpsc)     │     │   (turns)   │     │  Registry   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use robotcli::agent::{self, AgentLoop};
//! use robotcli::providers::OpenAiCompatProvider;
//! use robotcli::session::Session;
//! use robotcli::tools::{Dispatcher, ToolRegistry};
//!
//! async fn run_agent() {
//!     let provider = OpenAiCompatProvider::new("key", "https://openrouter.ai/api/v1", timeout).unwrap();
//!     let dispatcher = Dispatcher::new(Arc::new(ToolRegistry::builtin().unwrap()));
//!     let agent = AgentLoop::new(Arc::new(provider), dispatcher);
//!
//!     let mut session = Session::new("You are helpful.", "google/gemini-2.0-flash-001");
//!     let (tx, mut rx) = agent::channel();
//!     agent.process_turn(&mut session, "list files in Downloads", &tx).await.ok();
//!     while let Ok(event) = rx.try_recv() {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

pub mod events;
mod r#loop;

pub use events::{channel, AgentEvent, EventReceiver, EventSender};
pub use r#loop::AgentLoop;
