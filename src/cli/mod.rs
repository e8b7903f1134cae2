//! Interactive terminal front end.
//!
//! The shell reads a line, hands it to the [`AgentLoop`], and renders the
//! loop's events while the turn runs. Lines starting with `/` are local
//! commands and never reach the model.

use std::sync::Arc;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::agent::{self, AgentEvent, AgentLoop};
use crate::config::{Config, API_KEY_ENV};
use crate::providers::OpenAiCompatProvider;
use crate::session::Session;
use crate::tools::{Dispatcher, ToolContext, ToolRegistry};

/// A parsed line of user input.
#[derive(Debug, PartialEq, Eq)]
pub enum ShellCommand<'a> {
    Exit,
    SetModel(&'a str),
    ListModels,
    History,
    Help,
    Unknown(&'a str),
    Empty,
    Message(&'a str),
}

pub fn parse_line(line: &str) -> ShellCommand<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ShellCommand::Empty;
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return ShellCommand::Exit;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ShellCommand::Message(line);
    };
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(n, r)| (n, r.trim()))
        .unwrap_or((command, ""));
    match name {
        "exit" | "quit" => ShellCommand::Exit,
        "model" if !rest.is_empty() => ShellCommand::SetModel(rest),
        "models" => ShellCommand::ListModels,
        "history" => ShellCommand::History,
        "help" => ShellCommand::Help,
        _ => ShellCommand::Unknown(line),
    }
}

/// Resolve the API key from config/environment, prompting when missing.
pub fn api_key(config: &Config) -> Result<String> {
    if let Some(ref key) = config.api_key {
        return Ok(key.clone());
    }
    eprintln!("{} not found in environment.", API_KEY_ENV);
    let key = rpassword::prompt_password("Please enter your OpenRouter API Key: ")
        .context("failed to read API key")?;
    let key = key.trim().to_string();
    if key.is_empty() {
        anyhow::bail!("API key is required to proceed");
    }
    Ok(key)
}

/// Build the agent described by `config`.
pub fn build_agent(config: &Config, api_key: &str) -> Result<AgentLoop> {
    let provider =
        OpenAiCompatProvider::new(api_key, &config.base_url, config.request_timeout())?;

    let mut dispatcher = Dispatcher::new(Arc::new(ToolRegistry::builtin()?));
    if let Some(timeout) = config.tool_timeout() {
        dispatcher = dispatcher.with_timeout(timeout);
    }

    let mut ctx = ToolContext::new().with_trash_dir(config.trash_dir());
    ctx.workspace = config.workspace.clone();

    Ok(AgentLoop::new(Arc::new(provider), dispatcher)
        .with_tool_context(ctx)
        .with_model_retries(config.model_retries))
}

fn print_models(config: &Config, current: Option<&str>) {
    println!("Available models:");
    for model in &config.models {
        let marker = if Some(model.as_str()) == current { "*" } else { "-" };
        println!("  {} {}", marker, model);
    }
}

/// `robotcli models`
pub fn list_models(config: &Config) {
    print_models(config, Some(&config.model));
}

/// `robotcli start`
pub async fn interactive_session(config: Config, model: Option<String>) -> Result<()> {
    let key = api_key(&config)?;
    let agent = build_agent(&config, &key)?;
    let model = model.unwrap_or_else(|| config.model.clone());
    let mut session = Session::new(&config.system_prompt, &model);
    info!(session = %session.id, %model, "Session started");

    println!("RobotCLI - System Intelligence Online");
    println!("Initialized with {}.", model);
    println!("Type 'exit' or 'quit' to stop, '/help' for commands.");

    let mut editor = DefaultEditor::new().context("failed to initialize line editor")?;

    loop {
        let line = match editor.readline("\nYou > ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };
        let _ = editor.add_history_entry(line.as_str());

        match parse_line(&line) {
            ShellCommand::Empty => continue,
            ShellCommand::Exit => break,
            ShellCommand::SetModel(m) => {
                session.set_model(m);
                println!("Switched model to {}.", m);
            }
            ShellCommand::ListModels => print_models(&config, Some(session.model())),
            ShellCommand::History => {
                println!("{} turns in this session.", session.len());
            }
            ShellCommand::Help => {
                println!("/model <id>  switch model");
                println!("/models      list models");
                println!("/history     show conversation size");
                println!("exit, quit   leave");
            }
            ShellCommand::Unknown(cmd) => println!("Unknown command: {}", cmd),
            ShellCommand::Message(text) => run_turn(&agent, &mut session, text).await,
        }
    }

    println!("\nSession ended.");
    Ok(())
}

/// Run one turn, rendering events as they arrive. Ctrl-C cancels the turn.
async fn run_turn(agent: &AgentLoop, session: &mut Session, text: &str) {
    let (tx, mut rx) = agent::channel();
    let cancel = CancellationToken::new();

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let render = async {
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::Status(status) => eprintln!("  ... {}", status),
                AgentEvent::Content(content) => {
                    println!("\nRobot >\n{}", content);
                    break;
                }
            }
        }
    };

    let turn = async {
        // The outcome is already rendered through the Content event
        let _ = agent
            .process_turn_with_cancel(session, text, &tx, &cancel)
            .await;
    };

    tokio::join!(turn, render);
    watcher.abort();
}
