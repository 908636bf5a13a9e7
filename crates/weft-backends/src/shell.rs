use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use weft_core::config::ToolCommandConfig;
use weft_core::error::{Result, WeftError};
use weft_core::traits::ToolBackend;
use weft_core::types::ToolOutcome;

/// Tool backend that runs each configured tool as a shell command.
///
/// The command gets the params as JSON on stdin. On exit code 0, stdout is
/// parsed as JSON when possible and returned as a string otherwise. A
/// non-zero exit is reported as an unsuccessful outcome carrying stderr.
pub struct ShellToolBackend {
    tools: HashMap<String, ToolCommandConfig>,
}

impl ShellToolBackend {
    pub fn new(tools: HashMap<String, ToolCommandConfig>) -> Self {
        Self { tools }
    }

    /// Configured tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    async fn run(name: &str, tool: &ToolCommandConfig, params: Value) -> Result<ToolOutcome> {
        let exec_err = |message: String| WeftError::ToolExecution {
            tool: name.to_string(),
            message,
        };

        let input = serde_json::to_vec(&params)?;
        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&tool.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| exec_err(format!("spawn failed: {}", e)))?;

        // Writing stdin is part of the timed exchange.
        let exchange = async move {
            if let Some(mut stdin) = child.stdin.take() {
                // A command that ignores stdin may exit before reading it.
                if let Err(e) = stdin.write_all(&input).await {
                    debug!(tool = %name, error = %e, "Tool closed stdin early");
                }
            }
            child.wait_with_output().await
        };

        let timeout = Duration::from_secs(tool.timeout_secs);
        let output = match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(exec_err(e.to_string())),
            Err(_) => {
                return Err(WeftError::ToolTimeout {
                    tool: name.to_string(),
                    timeout_secs: tool.timeout_secs,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            let result = serde_json::from_str(&stdout).unwrap_or(Value::String(stdout));
            Ok(ToolOutcome::success(result))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output.status.code().unwrap_or(-1);
            let detail = if stderr.is_empty() { stdout } else { stderr };
            Ok(ToolOutcome::error(format!("Exit code {}: {}", code, detail)))
        }
    }
}

impl ToolBackend for ShellToolBackend {
    fn execute_tool(&self, name: &str, params: Value) -> BoxFuture<'_, Result<ToolOutcome>> {
        let name = name.to_string();
        Box::pin(async move {
            let tool = self
                .tools
                .get(&name)
                .ok_or_else(|| WeftError::ToolNotFound(name.clone()))?;
            debug!(tool = %name, command = %tool.command, "Executing shell tool");
            Self::run(&name, tool, params).await
        })
    }
}
