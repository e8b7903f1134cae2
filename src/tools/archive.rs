//! Zip compression and extraction.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, RobotError};

use super::{parse_args, paths, Tool, ToolContext};

fn zip_error(e: zip::result::ZipError) -> RobotError {
    RobotError::Tool(format!("zip error: {}", e))
}

async fn blocking<F>(f: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RobotError::Tool(format!("archive task failed: {}", e)))?
}

/// Compress a folder into a `.zip` file.
pub struct ZipFolderTool;

#[derive(Deserialize)]
struct ZipArgs {
    folder_path: String,
    output_path: String,
}

#[async_trait]
impl Tool for ZipFolderTool {
    fn name(&self) -> &str {
        "zip_folder"
    }

    fn description(&self) -> &str {
        "Compress folder to zip."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "folder_path": {"type": "string"},
                "output_path": {"type": "string"}
            },
            "required": ["folder_path", "output_path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: ZipArgs = parse_args(args)?;
        let src = paths::resolve(&args.folder_path, ctx);
        if !src.is_dir() {
            return Err(RobotError::Tool(format!(
                "{} is not a directory",
                args.folder_path
            )));
        }
        let mut out = paths::resolve(&args.output_path, ctx);
        let has_zip_ext = out
            .extension()
            .map(|e| e.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);
        if !has_zip_ext {
            out.set_extension("zip");
        }

        let target = out.clone();
        blocking(move || write_zip(&src, &target)).await?;
        Ok(format!("Zipped to {}", out.display()))
    }
}

fn write_zip(src: &Path, out: &Path) -> Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(File::create(out)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(src).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        // The archive must not try to contain itself
        if path == out || !entry.file_type().is_file() {
            continue;
        }
        let name = path
            .strip_prefix(src)
            .map_err(|e| RobotError::Tool(e.to_string()))?
            .to_string_lossy()
            .replace('\\', "/");
        writer.start_file(name.as_str(), options).map_err(zip_error)?;
        let mut file = File::open(path)?;
        io::copy(&mut file, &mut writer)?;
    }
    writer.finish().map_err(zip_error)?;
    Ok(())
}

/// Unpack a zip archive into a folder.
pub struct ExtractArchiveTool;

#[derive(Deserialize)]
struct ExtractArgs {
    archive_path: String,
    output_path: String,
}

#[async_trait]
impl Tool for ExtractArchiveTool {
    fn name(&self) -> &str {
        "extract_archive"
    }

    fn description(&self) -> &str {
        "Unzip an archive."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "archive_path": {"type": "string"},
                "output_path": {"type": "string"}
            },
            "required": ["archive_path", "output_path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: ExtractArgs = parse_args(args)?;
        let archive = paths::resolve(&args.archive_path, ctx);
        if !archive.is_file() {
            return Err(RobotError::Tool(format!("{} not found", args.archive_path)));
        }
        let out: PathBuf = paths::resolve(&args.output_path, ctx);

        let target = out.clone();
        blocking(move || {
            std::fs::create_dir_all(&target)?;
            let mut zip = ZipArchive::new(File::open(&archive)?).map_err(zip_error)?;
            zip.extract(&target).map_err(zip_error)
        })
        .await?;
        Ok(format!("Extracted to {}", out.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_zip_then_extract() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("project/src")).unwrap();
        std::fs::write(dir.path().join("project/src/main.txt"), "fn main").unwrap();
        std::fs::write(dir.path().join("project/readme.md"), "hello").unwrap();
        let ctx = ToolContext::new().with_workspace(dir.path().to_str().unwrap());

        let zipped = ZipFolderTool
            .execute(
                json!({"folder_path": "project", "output_path": "backup"}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(zipped.ends_with("backup.zip"));
        assert!(dir.path().join("backup.zip").is_file());

        ExtractArchiveTool
            .execute(
                json!({"archive_path": "backup.zip", "output_path": "restored"}),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("restored/src/main.txt")).unwrap(),
            "fn main"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("restored/readme.md")).unwrap(),
            "hello"
        );
    }

    #[tokio::test]
    async fn test_zip_missing_folder() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new().with_workspace(dir.path().to_str().unwrap());
        let err = ZipFolderTool
            .execute(json!({"folder_path": "nope", "output_path": "x.zip"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[tokio::test]
    async fn test_extract_missing_archive() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new().with_workspace(dir.path().to_str().unwrap());
        let err = ExtractArchiveTool
            .execute(json!({"archive_path": "nope.zip", "output_path": "out"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
