use serde_json::json;

use weft_core::types::Outputs;
use weft_core::workflow::Workflow;
use weft_engine::WorkflowEngine;

fn triage() -> Workflow {
    let text = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/triage.json"))
        .expect("read demo workflow");
    Workflow::from_json_str(&text).expect("parse demo workflow")
}

fn inputs(subject: &str, priority: i64) -> Outputs {
    let mut inputs = Outputs::new();
    inputs.insert("subject".into(), json!(subject));
    inputs.insert("priority".into(), json!(priority));
    inputs
}

fn engine() -> WorkflowEngine {
    WorkflowEngine::builder()
        .completion_backend(std::sync::Arc::new(weft_backends::EchoCompletion))
        .build()
}

#[tokio::test]
async fn demo_workflow_takes_urgent_branch() {
    let result = engine().execute(&triage(), inputs("Checkout OUTAGE", 1)).await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.node_result("queue").is_none());
    assert_eq!(
        result.outputs["completion"],
        json!("Write a page for: Checkout OUTAGE")
    );
}

#[tokio::test]
async fn demo_workflow_queues_routine_tickets() {
    let result = engine().execute(&triage(), inputs("Typo on pricing page", 1)).await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.node_result("page").is_none());
    let queued: serde_json::Value =
        serde_json::from_str(result.outputs["result"].as_str().unwrap()).unwrap();
    assert_eq!(queued, json!({"subject": "Typo on pricing page", "queue": "backlog"}));
}

#[test]
fn toml_workflow_definition() {
    let wf = Workflow::from_toml_str(
        r#"
id = "shout"
name = "Shout"

[[nodes]]
id = "up"
type = "transform"
data = { transformation = "toUpperCase", input = "${inputs.text}" }
"#,
    )
    .unwrap();
    assert_eq!(wf.nodes[0].node_type, "transform");
    assert!(engine().validate(&wf).is_ok());
}
