//! Path resolution shared by the filesystem tools.

use std::path::{Path, PathBuf};

use super::ToolContext;

/// Resolve a user- or model-supplied path.
///
/// Well-known folder names ("downloads", "documents", ...) map to the
/// user's directories. Relative paths go against the workspace when one is
/// set, otherwise against the home directory if that candidate exists, and
/// finally against the current directory.
pub fn resolve(raw: &str, ctx: &ToolContext) -> PathBuf {
    let trimmed = raw.trim();

    if let Some(dir) = well_known_dir(trimmed) {
        return dir;
    }

    let path = Path::new(trimmed);
    if path.is_absolute() {
        return path.to_path_buf();
    }

    if let Some(ref workspace) = ctx.workspace {
        return workspace.join(path);
    }

    if let Some(home) = dirs::home_dir() {
        let candidate = home.join(path);
        if candidate.exists() {
            return candidate;
        }
    }

    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn well_known_dir(name: &str) -> Option<PathBuf> {
    match name.to_lowercase().as_str() {
        "downloads" => dirs::download_dir(),
        "documents" => dirs::document_dir(),
        "desktop" => dirs::desktop_dir(),
        "music" => dirs::audio_dir(),
        "pictures" => dirs::picture_dir(),
        "videos" => dirs::video_dir(),
        _ => None,
    }
}

/// Default root for searches when the model gives none.
pub fn documents_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Documents")))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path_unchanged() {
        let ctx = ToolContext::new().with_workspace("/work");
        assert_eq!(resolve("/etc/hosts", &ctx), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_relative_path_uses_workspace() {
        let ctx = ToolContext::new().with_workspace("/work");
        assert_eq!(resolve("  notes.txt ", &ctx), PathBuf::from("/work/notes.txt"));
    }

    #[test]
    fn test_unknown_relative_without_workspace_is_absolute() {
        let ctx = ToolContext::new();
        let resolved = resolve("robotcli-surely-missing-dir/file", &ctx);
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("robotcli-surely-missing-dir/file"));
    }
}
