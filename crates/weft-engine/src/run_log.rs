use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use weft_core::config::LogConfig;
use weft_core::event::EventBus;
use weft_core::types::WorkflowEvent;

/// JSONL run logger.
///
/// Subscribes to the EventBus and writes one JSON object per line to
/// `{log_dir}/{timestamp}.jsonl`. Lines are flushed as they are written, so a
/// crash never leaves a partial file behind earlier entries.
pub struct RunLogger {
    log_dir: PathBuf,
    level: u8,
    stop_after_run: bool,
}

/// A single log entry written to the JSONL file.
#[derive(Debug, Serialize)]
struct LogEntry {
    timestamp: String,
    workflow_id: String,
    execution_id: String,
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
}

impl RunLogger {
    /// `level` controls verbosity: 1 = run events, 2 = run and node events.
    pub fn new(log_dir: PathBuf, level: u8) -> Self {
        Self {
            log_dir,
            level,
            stop_after_run: false,
        }
    }

    pub fn from_config(config: &LogConfig) -> Self {
        Self::new(config.log_dir(), config.level)
    }

    /// Stop after the first run-completed or run-failed event.
    pub fn single_run(mut self) -> Self {
        self.stop_after_run = true;
        self
    }

    /// Subscribe now and write entries on a background task until
    /// cancellation, the bus closing, or (in single-run mode) the end of a run.
    pub fn spawn(self, event_bus: &EventBus, cancel: CancellationToken) -> JoinHandle<()> {
        let rx = event_bus.subscribe();
        tokio::spawn(self.run(rx, cancel))
    }

    async fn run(self, mut rx: broadcast::Receiver<WorkflowEvent>, cancel: CancellationToken) {
        if let Err(e) = tokio::fs::create_dir_all(&self.log_dir).await {
            error!(error = %e, "Failed to create log directory");
            return;
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let log_path = self.log_dir.join(format!("{}.jsonl", timestamp));

        let file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, path = %log_path.display(), "Failed to open log file");
                return;
            }
        };

        info!(path = %log_path.display(), "RunLogger started");
        let mut writer = tokio::io::BufWriter::new(file);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("RunLogger cancelled");
                    break;
                }
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if let Some(entry) = self.event_to_entry(&event) {
                                if let Ok(json) = serde_json::to_string(&entry) {
                                    let line = format!("{}\n", json);
                                    if let Err(e) = writer.write_all(line.as_bytes()).await {
                                        error!(error = %e, "Failed to write log entry");
                                        break;
                                    }
                                    if let Err(e) = writer.flush().await {
                                        error!(error = %e, "Failed to flush log");
                                    }
                                }
                            }

                            if self.stop_after_run && event.is_terminal() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            debug!(skipped = n, "RunLogger lagged, skipped events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("EventBus closed, RunLogger stopping");
                            break;
                        }
                    }
                }
            }
        }

        writer.flush().await.ok();
        debug!(path = %log_path.display(), "RunLogger finished");
    }

    /// Convert an event to a log entry (returns None if filtered by level).
    fn event_to_entry(&self, event: &WorkflowEvent) -> Option<LogEntry> {
        let entry = |workflow_id: &str, event_type, node_id: Option<&str>, detail| LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            workflow_id: workflow_id.to_string(),
            execution_id: event.execution_id().to_string(),
            event_type,
            node_id: node_id.map(String::from),
            detail,
        };

        match event {
            // L1: run lifecycle
            WorkflowEvent::RunStarted { workflow_id, .. } => {
                Some(entry(workflow_id, "run_started", None, None))
            }
            WorkflowEvent::RunCompleted {
                workflow_id,
                duration,
                outputs,
                ..
            } => Some(entry(
                workflow_id,
                "run_completed",
                None,
                Some(serde_json::json!({
                    "duration_ms": duration,
                    "output_keys": outputs.keys().collect::<Vec<_>>(),
                })),
            )),
            WorkflowEvent::RunFailed {
                workflow_id,
                duration,
                error,
                ..
            } => Some(entry(
                workflow_id,
                "run_failed",
                None,
                Some(serde_json::json!({ "duration_ms": duration, "error": error })),
            )),

            // L2: per-node events
            WorkflowEvent::NodeStarted {
                workflow_id,
                node_id,
                node_type,
                ..
            } if self.level >= 2 => Some(entry(
                workflow_id,
                "node_started",
                Some(node_id.as_str()),
                Some(serde_json::json!({ "node_type": node_type })),
            )),
            WorkflowEvent::NodeCompleted {
                workflow_id,
                node_id,
                duration,
                ..
            } if self.level >= 2 => Some(entry(
                workflow_id,
                "node_completed",
                Some(node_id.as_str()),
                Some(serde_json::json!({ "duration_ms": duration })),
            )),
            WorkflowEvent::NodeFailed {
                workflow_id,
                node_id,
                error,
                ..
            } if self.level >= 2 => Some(entry(
                workflow_id,
                "node_failed",
                Some(node_id.as_str()),
                Some(serde_json::json!({ "error": truncate_str(error, 500) })),
            )),

            _ => None,
        }
    }
}

fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::types::{ExecutionId, Outputs};

    fn node_failed() -> WorkflowEvent {
        WorkflowEvent::NodeFailed {
            workflow_id: "wf".into(),
            execution_id: ExecutionId("e1".into()),
            node_id: "n1".into(),
            error: "boom".into(),
        }
    }

    #[test]
    fn test_level_filtering() {
        let quiet = RunLogger::new(PathBuf::from("unused"), 1);
        assert!(quiet.event_to_entry(&node_failed()).is_none());

        let verbose = RunLogger::new(PathBuf::from("unused"), 2);
        let entry = verbose.event_to_entry(&node_failed()).unwrap();
        assert_eq!(entry.event_type, "node_failed");
        assert_eq!(entry.node_id.as_deref(), Some("n1"));
        assert_eq!(entry.execution_id, "e1");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("héllo", 2), "h...");
    }

    #[tokio::test]
    async fn test_single_run_writes_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::new(16);
        let handle = RunLogger::new(dir.path().to_path_buf(), 2)
            .single_run()
            .spawn(&bus, CancellationToken::new());

        bus.publish(WorkflowEvent::RunStarted {
            workflow_id: "wf".into(),
            execution_id: ExecutionId("e1".into()),
        });
        bus.publish(node_failed());
        bus.publish(WorkflowEvent::RunCompleted {
            workflow_id: "wf".into(),
            execution_id: ExecutionId("e1".into()),
            duration: 3,
            outputs: Outputs::new(),
        });
        handle.await.unwrap();

        let file = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let content = std::fs::read_to_string(file).unwrap();
        let types: Vec<String> = content
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["event_type"]
                .as_str()
                .unwrap()
                .to_string())
            .collect();
        assert_eq!(types, vec!["run_started", "node_failed", "run_completed"]);
    }
}
