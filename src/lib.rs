//! RobotCLI - a conversational system agent
//!
//! RobotCLI keeps a dialogue between a user and a language model, offers the
//! model a fixed catalog of filesystem and git tools, runs the tools the
//! model asks for, and returns the model's final answer.
//!
//! - [`agent`]: the orchestration loop and its progress events
//! - [`session`]: conversation state
//! - [`providers`]: the model client abstraction and an OpenAI-compatible client
//! - [`tools`]: tool trait, registry, dispatcher and built-in tools
//! - [`config`]: settings from file and environment

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod tools;

pub use agent::{AgentEvent, AgentLoop};
pub use config::Config;
pub use error::{Result, RobotError};
pub use session::Session;
