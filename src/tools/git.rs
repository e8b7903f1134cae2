//! Git tool for RobotCLI
//!
//! This module provides a tool that initializes, stages, commits and
//! optionally pushes a repository by running the `git` binary. Each step runs
//! in a subprocess with a timeout.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{Result, RobotError};

use super::{parse_args, paths, Tool, ToolContext};

/// Timeout for each git subprocess.
const STEP_TIMEOUT: Duration = Duration::from_secs(60);

/// Tool for simple repository management.
///
/// # Parameters
/// - `repo_path`: Repository folder (required)
/// - `remote_url`: Remote to push to (optional)
/// - `commit_message`: Commit message, defaults to "Update" (optional)
///
/// A commit with nothing to commit, or a failed push, does not fail the tool;
/// the step's output and exit code are included in the result instead.
pub struct GitManagerTool;

#[derive(Deserialize)]
struct GitArgs {
    repo_path: String,
    remote_url: Option<String>,
    #[serde(default = "default_message")]
    commit_message: String,
}

fn default_message() -> String {
    "Update".to_string()
}

/// Combined output of one git step.
struct StepOutput {
    success: bool,
    text: String,
}

async fn run_git(repo: &Path, args: &[&str]) -> Result<StepOutput> {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(repo);
    run_step(cmd, &format!("git {}", args[0]), STEP_TIMEOUT).await
}

/// Run one subprocess, killing it if `timeout` elapses first.
async fn run_step(mut cmd: Command, label: &str, timeout: Duration) -> Result<StepOutput> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| {
            RobotError::Tool(format!("{} timed out after {}s", label, timeout.as_secs()))
        })?
        .map_err(|e| RobotError::Tool(format!("Failed to run {}: {}", label, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let mut text = String::new();
    if !stdout.trim().is_empty() {
        text.push_str(stdout.trim());
    }
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim());
    }
    if !output.status.success() {
        let exit_code = output.status.code().unwrap_or(-1);
        text.push_str(&format!("\n[Exit code: {}]", exit_code));
    }

    Ok(StepOutput {
        success: output.status.success(),
        text,
    })
}

#[async_trait]
impl Tool for GitManagerTool {
    fn name(&self) -> &str {
        "git_manager"
    }

    fn description(&self) -> &str {
        "Manage git repo (init, add, commit, push)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "repo_path": {"type": "string"},
                "remote_url": {"type": "string"},
                "commit_message": {"type": "string"}
            },
            "required": ["repo_path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: GitArgs = parse_args(args)?;
        let repo = paths::resolve(&args.repo_path, ctx);
        if !repo.is_dir() {
            return Err(RobotError::Tool(format!("Path {} not found", args.repo_path)));
        }

        let mut report = Vec::new();

        if !repo.join(".git").exists() {
            let init = run_git(&repo, &["init"]).await?;
            if !init.success {
                return Err(RobotError::Tool(format!("git init failed: {}", init.text)));
            }
            report.push("Initialized repository.".to_string());
        }

        let add = run_git(&repo, &["add", "."]).await?;
        if !add.success {
            return Err(RobotError::Tool(format!("git add failed: {}", add.text)));
        }

        let commit = run_git(&repo, &["commit", "-m", args.commit_message.as_str()]).await?;
        if commit.success {
            report.push(format!("Committed: {}", args.commit_message));
        } else {
            report.push(format!("Commit skipped: {}", commit.text));
        }

        if let Some(ref remote) = args.remote_url {
            let push = run_git(&repo, &["push", remote.as_str()]).await?;
            if push.success {
                report.push(format!("Pushed to {}", remote));
            } else {
                report.push(format!("Push failed: {}", push.text));
            }
        }

        Ok(report.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_git_missing_path() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new().with_workspace(dir.path().to_str().unwrap());
        let err = GitManagerTool
            .execute(json!({"repo_path": "missing"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_git_init_on_new_folder() {
        if !git_available().await {
            return;
        }
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("code.txt"), "hi").unwrap();
        let ctx = ToolContext::new();

        let result = GitManagerTool
            .execute(json!({"repo_path": dir.path().to_str().unwrap()}), &ctx)
            .await
            .unwrap();
        assert!(result.contains("Initialized repository."));
        assert!(dir.path().join(".git").exists());
    }

    #[tokio::test]
    async fn test_git_missing_repo_path_argument() {
        let err = GitManagerTool
            .execute(json!({}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RobotError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_step_timeout_reports_error() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = match run_step(cmd, "sleep", Duration::from_millis(50)).await {
            Err(e) => e.to_string(),
            Ok(_) => panic!("expected a timeout"),
        };
        // No `sleep` binary on this platform
        if err.starts_with("Failed to run") {
            return;
        }
        assert_eq!(err, "sleep timed out after 0s");
    }

    #[test]
    fn test_git_tool_parameters() {
        let params = GitManagerTool.parameters();
        assert!(params.is_object());
        assert_eq!(params["type"], "object");
        assert!(params["properties"]["remote_url"].is_object());
        assert_eq!(params["required"][0], "repo_path");
    }
}
