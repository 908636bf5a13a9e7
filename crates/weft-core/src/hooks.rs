use tracing::{debug, warn};

use crate::error::{Result, WeftError};

/// Execute hook commands in order with environment variables.
///
/// Each command runs through `sh -c`. The first command that cannot be
/// spawned or exits non-zero stops the sequence and is reported as an error.
pub async fn run_hooks(commands: &[String], env_vars: &[(&str, &str)]) -> Result<()> {
    for cmd in commands {
        let mut command = tokio::process::Command::new("sh");
        command.args(["-c", cmd]);
        for (key, val) in env_vars {
            command.env(key, val);
        }
        command.stdout(std::process::Stdio::null());
        command.stderr(std::process::Stdio::null());
        match command.status().await {
            Ok(s) if !s.success() => {
                warn!(hook = %cmd, code = s.code(), "Hook exited non-zero");
                return Err(WeftError::Hook {
                    hook: cmd.clone(),
                    message: format!("exited with code {}", s.code().unwrap_or(-1)),
                });
            }
            Err(e) => {
                warn!(hook = %cmd, error = %e, "Hook failed to execute");
                return Err(WeftError::Hook {
                    hook: cmd.clone(),
                    message: e.to_string(),
                });
            }
            Ok(_) => debug!(hook = %cmd, "Hook finished"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_hooks() {
        let cmds = vec!["true".to_string(), "test \"$WEFT_NODE_ID\" = n1".to_string()];
        run_hooks(&cmds, &[("WEFT_NODE_ID", "n1")]).await.unwrap();
    }

    #[tokio::test]
    async fn failing_hook_stops_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let cmds = vec![
            "exit 3".to_string(),
            format!("touch {}", marker.display()),
        ];
        let err = run_hooks(&cmds, &[]).await.unwrap_err();
        assert!(matches!(err, WeftError::Hook { .. }));
        assert!(err.to_string().contains("code 3"));
        assert!(!marker.exists());
    }
}
