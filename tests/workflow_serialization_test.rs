//! Integration tests for workflow interchange
//!
//! The JSON and binary forms must agree: a definition round-tripped
//! through either form is the same definition.

use agent_substrate::{Schema, WorkflowDefinition, WorkflowMetadata, WorkflowStep};
use serde_json::json;

fn pipeline_workflow() -> WorkflowDefinition {
    WorkflowDefinition::new("wf-ingest", "ingest-and-index", "2.0.1")
        .with_description("Pull documents, chunk, embed, index")
        .with_author("data-platform")
        .with_variable("source", json!("s3://bucket/docs"))
        .with_variable("chunk_size", json!(512))
        .with_step(WorkflowStep::new(
            "fetch",
            "fetch documents",
            "tool",
            json!({"tool_name": "s3_fetch", "recursive": true}),
        ))
        .with_step(
            WorkflowStep::new(
                "embed",
                "embed chunks",
                "llm",
                json!({"model": "{{embedding_model}}", "batch": 32}),
            )
            .with_metadata(json!({"gpu": true})),
        )
        .with_input_schema(
            Schema::object()
                .required_property("source", Schema::string())
                .build(),
        )
        .with_output_schema(
            Schema::object()
                .required_property("indexed", Schema::number())
                .build(),
        )
        .with_metadata(WorkflowMetadata {
            tags: vec!["ingest".into()],
            timeout_ms: Some(600_000),
            max_retries: Some(3),
            created_at: Some(1_712_000_000_000),
            updated_at: Some(1_712_000_500_000),
        })
}

#[test]
fn test_json_and_binary_forms_agree() {
    let workflow = pipeline_workflow();

    let via_json = WorkflowDefinition::from_json(&workflow.to_json().unwrap()).unwrap();
    let via_bytes = WorkflowDefinition::from_bytes(&workflow.to_bytes().unwrap()).unwrap();

    assert_eq!(via_json, workflow);
    assert_eq!(via_bytes, workflow);
    assert_eq!(via_json, via_bytes);
}

#[test]
fn test_json_shape_matches_interchange_contract() {
    let value: serde_json::Value =
        serde_json::from_str(&pipeline_workflow().to_json().unwrap()).unwrap();

    assert_eq!(value["id"], "wf-ingest");
    assert_eq!(value["version"], "2.0.1");
    assert_eq!(value["steps"][0]["type"], "tool");
    assert_eq!(value["steps"][1]["metadata"]["gpu"], true);
    assert_eq!(value["variables"]["chunk_size"], 512);
    assert_eq!(value["metadata"]["timeout_ms"], 600_000);
    assert_eq!(value["input_schema"]["type"], "object");
}

#[test]
fn test_binary_header_layout() {
    let bytes = pipeline_workflow().to_bytes().unwrap();
    assert_eq!(&bytes[..4], b"ZLWF");
    assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1);
    // first length-prefixed string is the id
    let id_len = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
    assert_eq!(&bytes[12..12 + id_len], b"wf-ingest");
}

#[test]
fn test_workflow_parsed_from_host_authored_json() {
    let raw = r#"{
        "id": "wf-min",
        "name": "minimal",
        "version": "0.1.0",
        "steps": [
            {"id": "only", "name": "noop", "type": "system", "config": {}}
        ]
    }"#;
    let workflow = WorkflowDefinition::from_json(raw).unwrap();
    assert_eq!(workflow.id, "wf-min");
    assert_eq!(workflow.steps.len(), 1);
    assert_eq!(workflow.steps[0].step_type, "system");
    assert!(workflow.variables.is_empty());
    assert!(workflow.metadata.is_none());

    // and it survives the binary form
    let round = WorkflowDefinition::from_bytes(&workflow.to_bytes().unwrap()).unwrap();
    assert_eq!(round, workflow);
}

#[test]
fn test_truncated_binary_is_rejected_everywhere() {
    let bytes = pipeline_workflow().to_bytes().unwrap();
    // every strict prefix must fail, never panic
    for cut in (0..bytes.len()).step_by(7) {
        assert!(WorkflowDefinition::from_bytes(&bytes[..cut]).is_err());
    }
}
