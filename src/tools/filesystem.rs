//! Basic file and folder tools.
//!
//! Each tool resolves its paths through [`paths::resolve`] and reports
//! problems as `Err`, which the dispatcher turns into an execution error
//! the model can read.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

use crate::error::{Result, RobotError};

use super::{parse_args, paths, Tool, ToolContext};

/// Entries shown by `list_directory` before truncating.
const LIST_LIMIT: usize = 50;
/// Characters returned by `read_file` before truncating.
const READ_LIMIT: usize = 2000;

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct ContentArgs {
    path: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TransferArgs {
    source: String,
    destination: String,
}

fn not_found(path: &str) -> RobotError {
    RobotError::Tool(format!("{} not found", path))
}

fn path_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": {"type": "string", "description": description}
        },
        "required": ["path"]
    })
}

fn transfer_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "source": {"type": "string", "description": "File or folder to take"},
            "destination": {"type": "string", "description": "Target path or folder"}
        },
        "required": ["source", "destination"]
    })
}

/// Create a new file, refusing to overwrite.
pub struct CreateFileTool;

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn description(&self) -> &str {
        "Create a new file with optional content."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: ContentArgs = parse_args(args)?;
        let p = paths::resolve(&args.path, ctx);
        if p.exists() {
            return Err(RobotError::Tool(format!("File {} already exists", args.path)));
        }
        write_file(&p, &args.content).await?;
        Ok(format!("File created: {}", p.display()))
    }
}

/// Overwrite a file's content, creating it if needed.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_to_file"
    }

    fn description(&self) -> &str {
        "Overwrite file content."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: ContentArgs = parse_args(args)?;
        let p = paths::resolve(&args.path, ctx);
        write_file(&p, &args.content).await?;
        Ok(format!("Wrote {} bytes to {}", args.content.len(), p.display()))
    }
}

async fn write_file(p: &Path, content: &str) -> Result<()> {
    if let Some(parent) = p.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(p, content).await?;
    Ok(())
}

pub struct AppendFileTool;

#[async_trait]
impl Tool for AppendFileTool {
    fn name(&self) -> &str {
        "append_to_file"
    }

    fn description(&self) -> &str {
        "Append content to a file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: ContentArgs = parse_args(args)?;
        let p = paths::resolve(&args.path, ctx);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&p)
            .await?;
        file.write_all(args.content.as_bytes()).await?;
        file.flush().await?;
        Ok("Appended successfully.".to_string())
    }
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read text from a file."
    }

    fn parameters(&self) -> Value {
        path_schema("File to read")
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: PathArgs = parse_args(args)?;
        let p = paths::resolve(&args.path, ctx);
        if !p.exists() {
            return Err(not_found(&args.path));
        }
        let bytes = tokio::fs::read(&p).await?;
        let text = String::from_utf8_lossy(&bytes);
        let mut out: String = text.chars().take(READ_LIMIT).collect();
        if text.chars().count() > READ_LIMIT {
            out.push_str("...");
        }
        Ok(out)
    }
}

/// Delete a file or folder; `safe` moves it into the trash directory.
pub struct DeleteFileTool;

#[derive(Deserialize)]
struct DeleteArgs {
    path: String,
    #[serde(default = "default_safe")]
    safe: bool,
}

fn default_safe() -> bool {
    true
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file. safe=True moves it to the trash folder."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "safe": {"type": "boolean"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: DeleteArgs = parse_args(args)?;
        let p = paths::resolve(&args.path, ctx);
        if !p.exists() {
            return Err(not_found(&args.path));
        }

        if args.safe {
            let trash = ctx.trash_dir.as_ref().ok_or_else(|| {
                RobotError::Tool("no trash folder configured, use safe=false".into())
            })?;
            tokio::fs::create_dir_all(trash).await?;
            let file_name = p
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "item".to_string());
            let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
            let target = trash.join(format!("{}-{}", stamp, file_name));
            move_path(&p, &target).await?;
            return Ok(format!("Moved to trash: {}", target.display()));
        }

        if p.is_dir() {
            tokio::fs::remove_dir_all(&p).await?;
        } else {
            tokio::fs::remove_file(&p).await?;
        }
        Ok(format!("Permanently deleted: {}", p.display()))
    }
}

pub struct RenameFileTool;

#[derive(Deserialize)]
struct RenameArgs {
    path: String,
    new_name: String,
}

#[async_trait]
impl Tool for RenameFileTool {
    fn name(&self) -> &str {
        "rename_file"
    }

    fn description(&self) -> &str {
        "Rename a file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "new_name": {"type": "string"}
            },
            "required": ["path", "new_name"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: RenameArgs = parse_args(args)?;
        let p = paths::resolve(&args.path, ctx);
        if !p.exists() {
            return Err(not_found(&args.path));
        }
        let target = p
            .parent()
            .map(|parent| parent.join(&args.new_name))
            .unwrap_or_else(|| PathBuf::from(&args.new_name));
        tokio::fs::rename(&p, &target).await?;
        Ok(format!("Renamed to: {}", target.display()))
    }
}

pub struct FileInfoTool;

#[async_trait]
impl Tool for FileInfoTool {
    fn name(&self) -> &str {
        "get_file_info"
    }

    fn description(&self) -> &str {
        "Get size, creation date, etc."
    }

    fn parameters(&self) -> Value {
        path_schema("File or folder to inspect")
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: PathArgs = parse_args(args)?;
        let p = paths::resolve(&args.path, ctx);
        if !p.exists() {
            return Err(not_found(&args.path));
        }
        let meta = tokio::fs::metadata(&p).await?;
        let created = meta.created().or_else(|_| meta.modified()).ok();
        let name = p
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| p.display().to_string());
        Ok(format!(
            "File: {}\nSize: {:.2} MB\nCreated: {}\nRead-Only: {}",
            name,
            meta.len() as f64 / (1024.0 * 1024.0),
            format_time(created),
            meta.permissions().readonly()
        ))
    }
}

fn format_time(time: Option<SystemTime>) -> String {
    time.map(|t| {
        DateTime::<Local>::from(t)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    })
    .unwrap_or_else(|| "unknown".to_string())
}

pub struct MoveFileTool;

#[async_trait]
impl Tool for MoveFileTool {
    fn name(&self) -> &str {
        "move_file"
    }

    fn description(&self) -> &str {
        "Move a file or folder."
    }

    fn parameters(&self) -> Value {
        transfer_schema()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: TransferArgs = parse_args(args)?;
        let src = paths::resolve(&args.source, ctx);
        if !src.exists() {
            return Err(RobotError::Tool(format!("Source {} not found", src.display())));
        }
        let dst = into_directory(&src, paths::resolve(&args.destination, ctx));
        move_path(&src, &dst).await?;
        Ok(format!("Moved to {}", dst.display()))
    }
}

pub struct CopyFileTool;

#[async_trait]
impl Tool for CopyFileTool {
    fn name(&self) -> &str {
        "copy_file"
    }

    fn description(&self) -> &str {
        "Copy a file or folder."
    }

    fn parameters(&self) -> Value {
        transfer_schema()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: TransferArgs = parse_args(args)?;
        let src = paths::resolve(&args.source, ctx);
        if !src.exists() {
            return Err(RobotError::Tool(format!("Source {} not found", src.display())));
        }
        let dst = into_directory(&src, paths::resolve(&args.destination, ctx));
        if src.is_dir() {
            reject_nested(&src, &dst)?;
            let (from, to) = (src.clone(), dst.clone());
            tokio::task::spawn_blocking(move || copy_tree(&from, &to))
                .await
                .map_err(|e| RobotError::Tool(format!("copy task failed: {}", e)))??;
        } else {
            if let Some(parent) = dst.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&src, &dst).await?;
        }
        Ok(format!("Copied to {}", dst.display()))
    }
}

/// Existing directory destinations receive the source under its own name.
fn into_directory(src: &Path, dst: PathBuf) -> PathBuf {
    match src.file_name() {
        Some(name) if dst.is_dir() => dst.join(name),
        _ => dst,
    }
}

/// Rename, falling back to copy-and-delete across filesystems.
async fn move_path(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        reject_nested(src, dst)?;
    }
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::rename(src, dst).await.is_ok() {
        return Ok(());
    }
    if src.is_dir() {
        let (from, to) = (src.to_path_buf(), dst.to_path_buf());
        tokio::task::spawn_blocking(move || copy_tree(&from, &to))
            .await
            .map_err(|e| RobotError::Tool(format!("move task failed: {}", e)))??;
        tokio::fs::remove_dir_all(src).await?;
    } else {
        tokio::fs::copy(src, dst).await?;
        tokio::fs::remove_file(src).await?;
    }
    Ok(())
}

/// Absolute form of `path`, canonicalizing its longest existing prefix.
fn normalized(path: &Path) -> PathBuf {
    if let Ok(real) = path.canonicalize() {
        return real;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => normalized(parent).join(name),
        _ => path.to_path_buf(),
    }
}

/// A folder cannot be copied or moved into itself.
fn reject_nested(src: &Path, dst: &Path) -> Result<()> {
    let (src, dst) = (normalized(src), normalized(dst));
    if dst.starts_with(&src) {
        return Err(RobotError::Tool(format!(
            "Cannot place {} inside itself ({})",
            src.display(),
            dst.display()
        )));
    }
    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| RobotError::Tool(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| RobotError::Tool(e.to_string()))?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

pub struct MakeDirectoryTool;

#[async_trait]
impl Tool for MakeDirectoryTool {
    fn name(&self) -> &str {
        "make_directory"
    }

    fn description(&self) -> &str {
        "Create a directory recursively."
    }

    fn parameters(&self) -> Value {
        path_schema("Directory to create")
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: PathArgs = parse_args(args)?;
        let p = paths::resolve(&args.path, ctx);
        tokio::fs::create_dir_all(&p).await?;
        Ok(format!("Directory created: {}", p.display()))
    }
}

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List contents of a directory."
    }

    fn parameters(&self) -> Value {
        path_schema("Directory to list")
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: PathArgs = parse_args(args)?;
        let p = paths::resolve(&args.path, ctx);
        if !p.exists() {
            return Err(RobotError::Tool(format!("Path {} not found", args.path)));
        }
        if !p.is_dir() {
            return Err(RobotError::Tool(format!("{} is not a directory", args.path)));
        }

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&p).await?;
        while let Some(entry) = dir.next_entry().await? {
            let is_dir = entry.file_type().await?.is_dir();
            entries.push((is_dir, entry.file_name().to_string_lossy().to_string()));
        }
        entries.sort_by(|a, b| a.1.cmp(&b.1));

        if entries.is_empty() {
            return Ok(format!("{} is empty.", p.display()));
        }

        let mut lines: Vec<String> = entries
            .iter()
            .take(LIST_LIMIT)
            .map(|(is_dir, name)| format!("[{}] {}", if *is_dir { "DIR" } else { "FILE" }, name))
            .collect();
        if entries.len() > LIST_LIMIT {
            lines.push(format!("... and {} more.", entries.len() - LIST_LIMIT));
        }
        Ok(lines.join("\n"))
    }
}

/// Sort a folder's files into `<ext>s/` subfolders.
pub struct OrganizeByExtensionTool;

#[async_trait]
impl Tool for OrganizeByExtensionTool {
    fn name(&self) -> &str {
        "organize_files_by_extension"
    }

    fn description(&self) -> &str {
        "Sort files in a folder into subfolders by type."
    }

    fn parameters(&self) -> Value {
        path_schema("Folder to organize")
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: PathArgs = parse_args(args)?;
        let p = paths::resolve(&args.path, ctx);
        if !p.is_dir() {
            return Err(RobotError::Tool("Path is not a directory".into()));
        }

        let mut files = Vec::new();
        let mut dir = tokio::fs::read_dir(&p).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_file() && !name.starts_with('.') {
                files.push((entry.path(), name));
            }
        }

        let mut moved = 0usize;
        for (path, name) in files {
            let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
                continue;
            };
            if ext.is_empty() {
                continue;
            }
            let folder = p.join(format!("{}s", ext));
            tokio::fs::create_dir_all(&folder).await?;
            move_path(&path, &folder.join(&name)).await?;
            moved += 1;
        }
        Ok(format!("Organized {} files into extension folders.", moved))
    }
}
