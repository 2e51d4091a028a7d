//! Bash tool for LoopClaw
//!
//! Runs a command through `bash -c` in the working directory with a fixed
//! timeout. The result is stdout followed by stderr; a non-zero exit code or
//! a timeout is reported inline so the model can react to it.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{LoopError, Result};

use super::{Tool, ToolContext};

/// Default command timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for pipes to drain after the child is killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Tool for executing bash commands.
///
/// # Parameters
/// - `command`: The bash command to execute (required)
///
/// # Example
/// ```rust
/// use loopclaw::tools::{Tool, ToolContext};
/// use loopclaw::tools::shell::BashTool;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let tool = BashTool::new();
/// let result = tool.execute(json!({"command": "echo hello"}), &ToolContext::new()).await;
/// assert_eq!(result.unwrap(), "hello");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct BashTool {
    timeout: Duration,
}

impl BashTool {
    /// Create a bash tool with the default 30 second timeout.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

fn drain<R>(reader: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf).await;
        }
        buf
    })
}

async fn collect(handle: JoinHandle<Vec<u8>>) -> String {
    match tokio::time::timeout(DRAIN_GRACE, handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        _ => String::new(),
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command and return its output (stdout + stderr)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LoopError::Tool("Missing 'command' argument".into()))?;

        let mut cmd = Command::new("bash");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = ctx.working_dir() {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| LoopError::Tool(format!("Failed to start bash: {}", e)))?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        debug!(command = %command, "Running bash command");

        let status = tokio::select! {
            status = child.wait() => Some(status?),
            _ = tokio::time::sleep(self.timeout) => None,
            _ = ctx.cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(LoopError::Cancelled);
            }
        };

        let Some(status) = status else {
            warn!(command = %command, timeout_secs = self.timeout.as_secs(), "Bash command timed out");
            let _ = child.kill().await;
            let out = format!("{}{}", collect(stdout).await, collect(stderr).await);
            return Ok(format!(
                "{}\n[timed out after {}s]",
                out,
                self.timeout.as_secs()
            ));
        };

        let out = format!("{}{}", collect(stdout).await, collect(stderr).await);
        match status.code() {
            Some(0) => Ok(out.trim_end().to_string()),
            Some(code) => Ok(format!("{}\n[exit code {}]", out, code)),
            None => Ok(format!("{}\n[terminated by signal]", out)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_bash_echo() {
        let out = BashTool::new()
            .execute(json!({"command": "echo hello"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_bash_combines_stdout_and_stderr() {
        let out = BashTool::new()
            .execute(
                json!({"command": "echo out; echo err 1>&2"}),
                &ToolContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(out, "out\nerr");
    }

    #[tokio::test]
    async fn test_bash_nonzero_exit_reported() {
        let out = BashTool::new()
            .execute(json!({"command": "echo oops; exit 3"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(out, "oops\n\n[exit code 3]");
    }

    #[tokio::test]
    async fn test_bash_runs_in_working_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let ctx = ToolContext::new().with_working_dir(dir.path());
        let out = BashTool::new()
            .execute(json!({"command": "ls"}), &ctx)
            .await
            .unwrap();
        assert!(out.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_bash_timeout() {
        let tool = BashTool::with_timeout(Duration::from_millis(200));
        let out = tool
            .execute(json!({"command": "exec sleep 5"}), &ToolContext::new())
            .await
            .unwrap();
        assert!(out.ends_with("[timed out after 0s]"));
    }

    #[tokio::test]
    async fn test_bash_cancelled() {
        let cancel = CancellationToken::new();
        let ctx = ToolContext::new().with_cancel(cancel.clone());
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = BashTool::new()
            .execute(json!({"command": "exec sleep 5"}), &ctx)
            .await;
        assert!(matches!(result, Err(LoopError::Cancelled)));
    }

    #[tokio::test]
    async fn test_bash_missing_command() {
        let result = BashTool::new().execute(json!({}), &ToolContext::new()).await;
        assert!(matches!(result, Err(LoopError::Tool(_))));
    }
}
