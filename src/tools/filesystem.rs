//! Filesystem tools for LoopClaw
//!
//! This module provides tools for reading, writing and appending to files.
//! Relative paths resolve against the working directory in the tool
//! context; when a working directory is configured, no path may escape it.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use crate::error::{LoopError, Result};

use super::{Tool, ToolContext};

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the deepest ancestor of `path` that exists.
fn canonical_existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors().find_map(|p| p.canonicalize().ok())
}

/// Resolve `path` against the context's working directory.
///
/// Without a working directory the path is used as given. With one,
/// relative paths are joined onto it and the normalized result must stay
/// inside it, also after following any symlinks on the existing part of
/// the path.
pub fn resolve_path(path: &str, ctx: &ToolContext) -> Result<PathBuf> {
    let requested = Path::new(path);
    let Some(root) = ctx.working_dir() else {
        return Ok(normalize(requested));
    };

    let root = normalize(&std::path::absolute(root)?);
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };
    let resolved = normalize(&joined);

    let escapes = !resolved.starts_with(&root)
        || match (root.canonicalize(), canonical_existing_ancestor(&resolved)) {
            (Ok(real_root), Some(real)) => !real.starts_with(real_root),
            _ => false,
        };
    if escapes {
        return Err(LoopError::SecurityViolation(format!(
            "Access denied: path '{}' is outside working directory",
            path
        )));
    }
    Ok(resolved)
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| LoopError::Tool(format!("Missing '{}' argument", key)))
}

/// Tool for reading file contents.
///
/// # Parameters
/// - `path`: The path to the file to read (required)
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file and return it as text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let path = required_str(&args, "path")?;
        let full_path = resolve_path(path, ctx)?;

        tokio::fs::read_to_string(&full_path).await.map_err(|e| {
            LoopError::Tool(format!(
                "Failed to read file '{}': {}",
                full_path.display(),
                e
            ))
        })
    }
}

/// Tool for writing content to a file.
///
/// Creates the file (and missing parent directories) or overwrites it.
///
/// # Parameters
/// - `path`: The path to the file to write (required)
/// - `content`: The content to write to the file (required)
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it if it doesn't exist."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let path = required_str(&args, "path")?;
        let content = required_str(&args, "content")?;
        let full_path = resolve_path(path, ctx)?;

        if let Some(parent) = full_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(&full_path, content).await.map_err(|e| {
            LoopError::Tool(format!(
                "Failed to write file '{}': {}",
                full_path.display(),
                e
            ))
        })?;

        Ok(format!("Successfully wrote to {}", full_path.display()))
    }
}

/// Tool for appending to an existing file.
///
/// Large files are written in stages: `write_file` creates the file, then
/// `append_file` adds further sections.
///
/// # Parameters
/// - `path`: The file to append to; it must already exist (required)
/// - `content`: The content to append (required)
pub struct AppendFileTool;

#[async_trait]
impl Tool for AppendFileTool {
    fn name(&self) -> &str {
        "append_file"
    }

    fn description(&self) -> &str {
        "Append content to the end of a file. The file must already exist. \
         Use this to write large files in stages: create the file with write_file first, \
         then append additional sections."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file to append to"
                },
                "content": {
                    "type": "string",
                    "description": "The content to append to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let path = required_str(&args, "path")?;
        let content = required_str(&args, "content")?;
        let full_path = resolve_path(path, ctx)?;

        if !tokio::fs::try_exists(&full_path).await? {
            return Err(LoopError::Tool(format!(
                "file does not exist: {}. Use write_file to create it first.",
                full_path.display()
            )));
        }

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&full_path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        Ok(format!("Successfully appended to {}", full_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ctx_in(dir: &Path) -> ToolContext {
        ToolContext::new().with_working_dir(dir)
    }

    #[tokio::test]
    async fn test_write_then_read_relative() {
        let dir = tempdir().unwrap();
        let ctx = ctx_in(dir.path());

        let out = WriteFileTool
            .execute(json!({"path": "notes/a.txt", "content": "hello"}), &ctx)
            .await
            .unwrap();
        assert!(out.starts_with("Successfully wrote to"));

        let read = ReadFileTool
            .execute(json!({"path": "notes/a.txt"}), &ctx)
            .await
            .unwrap();
        assert_eq!(read, "hello");
    }

    #[tokio::test]
    async fn test_append_requires_existing_file() {
        let dir = tempdir().unwrap();
        let ctx = ctx_in(dir.path());

        let err = AppendFileTool
            .execute(json!({"path": "missing.txt", "content": "x"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("write_file"));

        WriteFileTool
            .execute(json!({"path": "doc.md", "content": "part1\n"}), &ctx)
            .await
            .unwrap();
        AppendFileTool
            .execute(json!({"path": "doc.md", "content": "part2\n"}), &ctx)
            .await
            .unwrap();
        let text = std::fs::read_to_string(dir.path().join("doc.md")).unwrap();
        assert_eq!(text, "part1\npart2\n");
    }

    #[tokio::test]
    async fn test_read_missing_file_errors() {
        let dir = tempdir().unwrap();
        let result = ReadFileTool
            .execute(json!({"path": "nope.txt"}), &ctx_in(dir.path()))
            .await;
        assert!(matches!(result, Err(LoopError::Tool(_))));
    }

    #[tokio::test]
    async fn test_missing_argument() {
        let result = WriteFileTool
            .execute(json!({"path": "a.txt"}), &ToolContext::new())
            .await;
        assert!(result.unwrap_err().to_string().contains("content"));
    }

    #[tokio::test]
    async fn test_path_traversal_blocked() {
        let dir = tempdir().unwrap();
        let result = ReadFileTool
            .execute(json!({"path": "../../etc/passwd"}), &ctx_in(dir.path()))
            .await;
        assert!(matches!(result, Err(LoopError::SecurityViolation(_))));
    }

    #[test]
    fn test_resolve_path_absolute_outside_blocked() {
        let dir = tempdir().unwrap();
        let result = resolve_path("/etc/hosts", &ctx_in(dir.path()));
        assert!(matches!(result, Err(LoopError::SecurityViolation(_))));
    }

    #[test]
    fn test_resolve_path_inner_dotdot_allowed() {
        let dir = tempdir().unwrap();
        let resolved = resolve_path("a/../b.txt", &ctx_in(dir.path())).unwrap();
        assert!(resolved.ends_with("b.txt"));
        assert!(resolved.starts_with(normalize(dir.path())));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_working_dir_blocked() {
        let outside = tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s3cret").unwrap();
        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let ctx = ctx_in(dir.path());

        let read = ReadFileTool
            .execute(json!({"path": "link/secret.txt"}), &ctx)
            .await;
        assert!(matches!(read, Err(LoopError::SecurityViolation(_))));

        let write = WriteFileTool
            .execute(json!({"path": "link/new.txt", "content": "x"}), &ctx)
            .await;
        assert!(matches!(write, Err(LoopError::SecurityViolation(_))));
        assert!(!outside.path().join("new.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_working_dir_allowed() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();
        let resolved = resolve_path("alias/file.txt", &ctx_in(dir.path())).unwrap();
        assert!(resolved.ends_with("alias/file.txt"));
    }

    #[test]
    fn test_resolve_path_without_working_dir() {
        let resolved = resolve_path("./x/y.txt", &ToolContext::new()).unwrap();
        assert_eq!(resolved, PathBuf::from("x/y.txt"));
    }
}
