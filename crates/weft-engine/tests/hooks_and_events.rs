use std::sync::Arc;

use serde_json::json;

use weft_core::types::{Outputs, WorkflowEvent};
use weft_engine::WorkflowEngine;
use weft_test_utils::{outputs, workflow, FailingHandler, FailingHooks, RecordingHooks, StaticHandler};

#[tokio::test]
async fn hooks_wrap_every_handler_call() {
    let hooks = Arc::new(RecordingHooks::new());
    let engine = WorkflowEngine::builder()
        .hooks(hooks.clone())
        .handler("emit", StaticHandler::new(Outputs::new()))
        .handler("boom", FailingHandler::new("bad"))
        .build();
    let wf = workflow("hooks", &[("a", "emit"), ("b", "boom")], &[("a", "b")]);

    engine.execute(&wf, Outputs::new()).await;

    assert_eq!(
        hooks.events(),
        vec!["before:a", "after:a:ok", "before:b", "after:b:failed"]
    );
}

#[tokio::test]
async fn before_hook_failure_skips_handler() {
    let handler = StaticHandler::new(Outputs::new());
    let engine = WorkflowEngine::builder()
        .hooks(Arc::new(FailingHooks::Before))
        .handler("emit", handler.clone())
        .build();

    let result = engine
        .execute(&workflow("w", &[("a", "emit")], &[]), Outputs::new())
        .await;

    assert!(!result.success);
    assert_eq!(handler.calls(), 0);
    assert!(result.node_results[0].error.as_deref().unwrap().contains("before_node"));
}

#[tokio::test]
async fn after_hook_failure_fails_node_and_branch() {
    let engine = WorkflowEngine::builder()
        .hooks(Arc::new(FailingHooks::After))
        .handler("emit", StaticHandler::new(outputs(&[("k", json!(1))])))
        .build();

    let result = engine
        .execute(&workflow("w", &[("a", "emit"), ("b", "emit")], &[("a", "b")]), Outputs::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.node_results.len(), 1);
    assert!(!result.node_results[0].success);
    assert!(result.outputs.get("k").is_none());
}

#[tokio::test]
async fn lifecycle_events_in_order() {
    let engine = WorkflowEngine::builder()
        .handler("emit", StaticHandler::new(outputs(&[("v", json!(1))])))
        .build();
    let mut rx = engine.subscribe();

    let result = engine
        .execute(&workflow("ev", &[("a", "emit"), ("b", "emit")], &[("a", "b")]), Outputs::new())
        .await;

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.execution_id(), &result.execution_id);
        kinds.push(match event {
            WorkflowEvent::RunStarted { .. } => "run_started".to_string(),
            WorkflowEvent::NodeStarted { node_id, .. } => format!("started:{}", node_id),
            WorkflowEvent::NodeCompleted { node_id, .. } => format!("completed:{}", node_id),
            WorkflowEvent::NodeFailed { node_id, .. } => format!("failed:{}", node_id),
            WorkflowEvent::RunCompleted { outputs, .. } => {
                assert_eq!(outputs["v"], json!(1));
                "run_completed".to_string()
            }
            WorkflowEvent::RunFailed { .. } => "run_failed".to_string(),
        });
    }

    assert_eq!(
        kinds,
        vec![
            "run_started",
            "started:a",
            "completed:a",
            "started:b",
            "completed:b",
            "run_completed"
        ]
    );
}

#[tokio::test]
async fn failed_node_emits_run_failed() {
    let engine = WorkflowEngine::builder()
        .handler("boom", FailingHandler::new("bad"))
        .build();
    let mut rx = engine.subscribe();

    engine
        .execute(&workflow("ev", &[("a", "boom")], &[]), Outputs::new())
        .await;

    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event);
    }
    assert!(matches!(last, Some(WorkflowEvent::RunFailed { .. })));
}

#[tokio::test]
async fn shell_hooks_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("hooks.log");
    let config = weft_core::AppConfig::from_toml_str(&format!(
        r#"
[hooks]
before_node = ["echo before:$WEFT_NODE_ID >> {log}"]
after_node = ["echo after:$WEFT_NODE_ID:$WEFT_NODE_SUCCESS >> {log}"]
"#,
        log = log.display()
    ))
    .unwrap();
    let engine = WorkflowEngine::builder()
        .config(&config)
        .handler("emit", StaticHandler::new(Outputs::new()))
        .build();

    let result = engine
        .execute(&workflow("sh", &[("a", "emit")], &[]), Outputs::new())
        .await;

    assert!(result.success);
    let lines = std::fs::read_to_string(&log).unwrap();
    assert_eq!(lines, "before:a\nafter:a:true\n");
}
