//! Recursive scanning tools: name search, large files and duplicates.
//!
//! Directory walks are blocking and run on the blocking thread pool.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{Result, RobotError};

use super::{parse_args, paths, Tool, ToolContext};

/// Files inspected by `search_files` before giving up.
const SCAN_LIMIT: usize = 10_000;
const SEARCH_RESULTS: usize = 50;
const REPORT_RESULTS: usize = 20;
const DEFAULT_LARGE_MB: u64 = 100;

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RobotError::Tool(format!("scan task failed: {}", e)))?
}

fn files_under(root: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
}

fn existing_dir(raw: &str, ctx: &ToolContext) -> Result<PathBuf> {
    let root = paths::resolve(raw, ctx);
    if !root.is_dir() {
        return Err(RobotError::Tool(format!("{} is not a directory", raw)));
    }
    Ok(root)
}

/// SHA-256 of a file, streamed from disk.
fn file_digest(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_vec())
}

/// Case-insensitive file name search.
pub struct SearchFilesTool;

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    search_path: Option<String>,
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search recursively by name or extension."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Name fragment or extension such as .pdf"},
                "search_path": {"type": "string", "description": "Folder to search (default: Documents)"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: SearchArgs = parse_args(args)?;
        let root = match args.search_path {
            Some(ref p) => existing_dir(p, ctx)?,
            None => paths::documents_dir(),
        };
        let query = args.query.to_lowercase();

        let matches = blocking(move || {
            Ok(files_under(&root)
                .take(SCAN_LIMIT)
                .filter(|e| e.file_name().to_string_lossy().to_lowercase().contains(&query))
                .take(SEARCH_RESULTS)
                .map(|e| e.path().display().to_string())
                .collect::<Vec<_>>())
        })
        .await?;

        if matches.is_empty() {
            return Ok(format!("No files matching '{}' found.", args.query));
        }
        Ok(matches.join("\n"))
    }
}

/// Files above a size threshold.
pub struct FindLargeFilesTool;

#[derive(Deserialize)]
struct LargeFilesArgs {
    folder_path: String,
    size_mb_threshold: Option<u64>,
}

#[async_trait]
impl Tool for FindLargeFilesTool {
    fn name(&self) -> &str {
        "find_large_files"
    }

    fn description(&self) -> &str {
        "Find files larger than threshold MB."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "folder_path": {"type": "string"},
                "size_mb_threshold": {"type": "integer", "description": "Minimum size in MB (default: 100)"}
            },
            "required": ["folder_path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: LargeFilesArgs = parse_args(args)?;
        let root = existing_dir(&args.folder_path, ctx)?;
        let threshold_mb = args.size_mb_threshold.unwrap_or(DEFAULT_LARGE_MB);
        let limit = threshold_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            RobotError::InvalidArguments(format!(
                "size_mb_threshold {} is too large",
                threshold_mb
            ))
        })?;

        let found = blocking(move || {
            Ok(files_under(&root)
                .filter_map(|e| {
                    let size = e.metadata().ok()?.len();
                    (size > limit).then(|| {
                        format!(
                            "{} ({:.1} MB)",
                            e.path().display(),
                            size as f64 / (1024.0 * 1024.0)
                        )
                    })
                })
                .take(REPORT_RESULTS)
                .collect::<Vec<_>>())
        })
        .await?;

        if found.is_empty() {
            return Ok(format!("No files larger than {} MB.", threshold_mb));
        }
        Ok(found.join("\n"))
    }
}

/// Duplicate detection by SHA-256 of file contents.
pub struct FindDuplicatesTool;

#[derive(Deserialize)]
struct FolderArgs {
    folder_path: String,
}

#[async_trait]
impl Tool for FindDuplicatesTool {
    fn name(&self) -> &str {
        "find_duplicates"
    }

    fn description(&self) -> &str {
        "Find duplicate files in a folder."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "folder_path": {"type": "string"}
            },
            "required": ["folder_path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let args: FolderArgs = parse_args(args)?;
        let root = existing_dir(&args.folder_path, ctx)?;

        let dupes = blocking(move || {
            let mut seen: HashMap<Vec<u8>, PathBuf> = HashMap::new();
            let mut dupes = Vec::new();
            let mut entries: Vec<_> = files_under(&root).collect();
            entries.sort_by(|a, b| a.path().cmp(b.path()));
            for entry in entries {
                // Unreadable files are skipped
                let Ok(digest) = file_digest(entry.path()) else {
                    continue;
                };
                match seen.get(&digest) {
                    Some(original) => dupes.push(format!(
                        "{} == {}",
                        entry.path().display(),
                        original.display()
                    )),
                    None => {
                        seen.insert(digest, entry.path().to_path_buf());
                    }
                }
            }
            Ok(dupes)
        })
        .await?;

        if dupes.is_empty() {
            return Ok("No duplicates found.".to_string());
        }
        let shown: Vec<&str> = dupes.iter().take(REPORT_RESULTS).map(String::as_str).collect();
        Ok(format!("Duplicates found:\n{}", shown.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ctx(dir: &Path) -> ToolContext {
        ToolContext::new().with_workspace(dir.to_str().unwrap())
    }

    #[tokio::test]
    async fn test_search_files_case_insensitive() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("Report.PDF"), "").unwrap();
        std::fs::write(dir.path().join("sub/other.pdf"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let result = SearchFilesTool
            .execute(json!({"query": ".pdf", "search_path": "."}), &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(result.lines().count(), 2);
        assert!(result.contains("Report.PDF"));
        assert!(result.contains("other.pdf"));
    }

    #[tokio::test]
    async fn test_search_files_no_match() {
        let dir = tempdir().unwrap();
        let result = SearchFilesTool
            .execute(json!({"query": "zzz", "search_path": "."}), &ctx(dir.path()))
            .await
            .unwrap();
        assert!(result.starts_with("No files matching"));
    }

    #[tokio::test]
    async fn test_search_missing_root_fails() {
        let dir = tempdir().unwrap();
        let err = SearchFilesTool
            .execute(json!({"query": "a", "search_path": "missing"}), &ctx(dir.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[tokio::test]
    async fn test_find_large_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("big.bin"), vec![0u8; 2 * 1024 * 1024]).unwrap();
        std::fs::write(dir.path().join("small.bin"), vec![0u8; 10]).unwrap();

        let result = FindLargeFilesTool
            .execute(
                json!({"folder_path": ".", "size_mb_threshold": 1}),
                &ctx(dir.path()),
            )
            .await
            .unwrap();
        assert!(result.contains("big.bin (2.0 MB)"));
        assert!(!result.contains("small.bin"));
    }

    #[tokio::test]
    async fn test_find_large_files_default_threshold() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("small.bin"), vec![0u8; 10]).unwrap();
        let result = FindLargeFilesTool
            .execute(json!({"folder_path": "."}), &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(result, "No files larger than 100 MB.");
    }

    #[tokio::test]
    async fn test_find_large_files_oversized_threshold() {
        let dir = tempdir().unwrap();
        let err = FindLargeFilesTool
            .execute(
                json!({"folder_path": ".", "size_mb_threshold": 18446744073709u64}),
                &ctx(dir.path()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RobotError::InvalidArguments(_)));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_file_digest_matches_in_memory_hash() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"hello world").unwrap();
        assert_eq!(
            file_digest(&path).unwrap(),
            Sha256::digest(b"hello world").to_vec()
        );
    }

    #[tokio::test]
    async fn test_find_duplicates() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "same").unwrap();
        std::fs::write(dir.path().join("b.txt"), "same").unwrap();
        std::fs::write(dir.path().join("c.txt"), "different").unwrap();

        let result = FindDuplicatesTool
            .execute(json!({"folder_path": "."}), &ctx(dir.path()))
            .await
            .unwrap();
        assert!(result.starts_with("Duplicates found:"));
        assert!(result.contains("b.txt"));
        assert!(result.contains("a.txt"));
        assert!(!result.contains("c.txt"));
    }

    #[tokio::test]
    async fn test_no_duplicates() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one").unwrap();
        let result = FindDuplicatesTool
            .execute(json!({"folder_path": "."}), &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(result, "No duplicates found.");
    }
}
