//! Core event model for the agent substrate.
//!
//! Every observable happening in the runtime — an agent starting, a tool
//! succeeding, a provider call failing — is captured as an [`Event`]: an
//! immutable record with a process-unique id, a dotted hierarchical name,
//! a [`EventCategory`], a totally-ordered [`Severity`], structured
//! [`EventMetadata`], and an arbitrary JSON payload.
//!
//! Events serialize to a stable JSON document (one per event, one per line
//! in the append-log storage backend) and round-trip losslessly:
//! `Event::from_json(event.to_json()?)` reproduces the original event.
//!
//! # Example
//!
//! ```
//! use agent_substrate::{Event, EventCategory, Severity};
//! use serde_json::json;
//!
//! let event = Event::builder("agent.llm.started")
//!     .category(EventCategory::Agent)
//!     .severity(Severity::Info)
//!     .source("orchestrator")
//!     .correlation_id("req-1234")
//!     .tag("llm")
//!     .payload(json!({"model": "qwen2.5-32b-instruct"}))
//!     .build();
//!
//! assert_eq!(event.name, "agent.llm.started");
//! assert!(event.metadata.tags.contains(&"llm".to_string()));
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::{SystemTime, UNIX_EPOCH};

/// Event severity, totally ordered: debug < info < warning < error < critical.
///
/// The ordering is stable across serialization; the wire form is the
/// lowercase variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            other => Err(Error::invalid_input(format!("unknown severity: {other}"))),
        }
    }
}

/// Coarse classification of the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Agent,
    Provider,
    Tool,
    Workflow,
    Memory,
    System,
    Network,
    Security,
    Performance,
    Custom,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventCategory::Agent => "agent",
            EventCategory::Provider => "provider",
            EventCategory::Tool => "tool",
            EventCategory::Workflow => "workflow",
            EventCategory::Memory => "memory",
            EventCategory::System => "system",
            EventCategory::Network => "network",
            EventCategory::Security => "security",
            EventCategory::Performance => "performance",
            EventCategory::Custom => "custom",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for EventCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "agent" => Ok(EventCategory::Agent),
            "provider" => Ok(EventCategory::Provider),
            "tool" => Ok(EventCategory::Tool),
            "workflow" => Ok(EventCategory::Workflow),
            "memory" => Ok(EventCategory::Memory),
            "system" => Ok(EventCategory::System),
            "network" => Ok(EventCategory::Network),
            "security" => Ok(EventCategory::Security),
            "performance" => Ok(EventCategory::Performance),
            "custom" => Ok(EventCategory::Custom),
            other => Err(Error::invalid_input(format!("unknown category: {other}"))),
        }
    }
}

/// Structured metadata attached to every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Milliseconds since the unix epoch, assigned at construction.
    pub timestamp: u64,
    /// Which component produced the event.
    pub source: String,
    /// Correlates events belonging to one logical request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Free-form labels; subscription tag filters are conjunctive over these.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Arbitrary structured extras.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
}

impl EventMetadata {
    fn new(source: impl Into<String>) -> Self {
        Self {
            timestamp: now_millis(),
            source: source.into(),
            correlation_id: None,
            user_id: None,
            session_id: None,
            tags: Vec::new(),
            custom: None,
        }
    }
}

/// An immutable record of something that happened in the runtime.
///
/// Construct via [`Event::new`] for the common case or [`Event::builder`]
/// when metadata beyond the source is needed. The id and timestamp are
/// assigned at construction and never change; clones are deep and
/// independently owned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Process-unique opaque id.
    pub id: String,
    /// Dotted hierarchical name, e.g. `agent.llm.started`.
    pub name: String,
    pub category: EventCategory,
    pub severity: Severity,
    pub metadata: EventMetadata,
    /// Arbitrary JSON payload.
    pub payload: Value,
}

impl Event {
    /// Create an event with a fresh id and a timestamp of now.
    pub fn new(
        name: impl Into<String>,
        category: EventCategory,
        severity: Severity,
        source: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: generate_event_id(),
            name: name.into(),
            category,
            severity,
            metadata: EventMetadata::new(source),
            payload,
        }
    }

    /// Start building an event with the given dotted name.
    pub fn builder(name: impl Into<String>) -> EventBuilder {
        EventBuilder::new(name)
    }

    /// Serialize to a single JSON document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse an event from its JSON document form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    // --- Canonical collaborator events -----------------------------------
    //
    // Fixed names and payload shapes emitted by the agent, tool, and
    // workflow layers built on top of this substrate.

    pub fn agent_started(agent_name: &str) -> Self {
        Self::new(
            "agent.started",
            EventCategory::Agent,
            Severity::Info,
            agent_name,
            json!({ "agent_name": agent_name }),
        )
    }

    pub fn agent_completed(agent_name: &str, duration_ms: u64) -> Self {
        Self::new(
            "agent.completed",
            EventCategory::Agent,
            Severity::Info,
            agent_name,
            json!({ "agent_name": agent_name, "duration_ms": duration_ms }),
        )
    }

    pub fn agent_failed(agent_name: &str, error: &str) -> Self {
        Self::new(
            "agent.failed",
            EventCategory::Agent,
            Severity::Error,
            agent_name,
            json!({ "agent_name": agent_name, "error": error }),
        )
    }

    pub fn tool_invoked(tool_name: &str, input: Value) -> Self {
        Self::new(
            "tool.invoked",
            EventCategory::Tool,
            Severity::Info,
            tool_name,
            json!({ "tool_name": tool_name, "input": input }),
        )
    }

    pub fn tool_succeeded(tool_name: &str, output: Value, duration_ms: u64) -> Self {
        Self::new(
            "tool.succeeded",
            EventCategory::Tool,
            Severity::Info,
            tool_name,
            json!({ "tool_name": tool_name, "output": output, "duration_ms": duration_ms }),
        )
    }

    pub fn tool_failed(tool_name: &str, error: &str, duration_ms: u64) -> Self {
        Self::new(
            "tool.failed",
            EventCategory::Tool,
            Severity::Error,
            tool_name,
            json!({ "tool_name": tool_name, "error": error, "duration_ms": duration_ms }),
        )
    }

    pub fn workflow_step_started(workflow_id: &str, step_id: &str, step_name: &str) -> Self {
        Self::new(
            "workflow.step_started",
            EventCategory::Workflow,
            Severity::Info,
            workflow_id,
            json!({ "workflow_id": workflow_id, "step_id": step_id, "step_name": step_name }),
        )
    }

    pub fn workflow_step_completed(workflow_id: &str, step_id: &str, duration_ms: u64) -> Self {
        Self::new(
            "workflow.step_completed",
            EventCategory::Workflow,
            Severity::Info,
            workflow_id,
            json!({ "workflow_id": workflow_id, "step_id": step_id, "duration_ms": duration_ms }),
        )
    }
}

/// Builder for [`Event`] with full metadata control.
#[derive(Debug)]
pub struct EventBuilder {
    name: String,
    category: EventCategory,
    severity: Severity,
    source: String,
    correlation_id: Option<String>,
    user_id: Option<String>,
    session_id: Option<String>,
    tags: Vec<String>,
    custom: Option<Value>,
    payload: Value,
}

impl EventBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: EventCategory::Custom,
            severity: Severity::Info,
            source: String::new(),
            correlation_id: None,
            user_id: None,
            session_id: None,
            tags: Vec::new(),
            custom: None,
            payload: Value::Null,
        }
    }

    pub fn category(mut self, category: EventCategory) -> Self {
        self.category = category;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Add a single tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Extend the tag set.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn custom(mut self, custom: Value) -> Self {
        self.custom = Some(custom);
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Event {
        let mut metadata = EventMetadata::new(self.source);
        metadata.correlation_id = self.correlation_id;
        metadata.user_id = self.user_id;
        metadata.session_id = self.session_id;
        metadata.tags = self.tags;
        metadata.custom = self.custom;

        Event {
            id: generate_event_id(),
            name: self.name,
            category: self.category,
            severity: self.severity,
            metadata,
            payload: self.payload,
        }
    }
}

/// Milliseconds since the unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Fresh opaque event id: hex microsecond timestamp plus 32 bits of entropy.
fn generate_event_id() -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or(0);
    format!("{:x}-{:08x}", micros, rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_event_id_unique() {
        let ids: HashSet<String> = (0..1000)
            .map(|_| {
                Event::new(
                    "test.event",
                    EventCategory::System,
                    Severity::Debug,
                    "test",
                    Value::Null,
                )
                .id
            })
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_severity_total_order() {
        let all = [
            Severity::Debug,
            Severity::Info,
            Severity::Warning,
            Severity::Error,
            Severity::Critical,
        ];
        for w in all.windows(2) {
            assert!(w[0] < w[1]);
        }
        for a in all {
            for b in all {
                let exactly_one =
                    [a < b, a == b, a > b].iter().filter(|&&x| x).count();
                assert_eq!(exactly_one, 1);
            }
        }
    }

    #[test]
    fn test_severity_order_survives_serialization() {
        let warning: Severity = serde_json::from_str("\"warning\"").unwrap();
        let error: Severity = serde_json::from_str("\"error\"").unwrap();
        assert!(warning < error);
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
    }

    #[test]
    fn test_category_serialization() {
        assert_eq!(
            serde_json::to_string(&EventCategory::Performance).unwrap(),
            "\"performance\""
        );
        let cat: EventCategory = serde_json::from_str("\"workflow\"").unwrap();
        assert_eq!(cat, EventCategory::Workflow);
    }

    #[test]
    fn test_builder_sets_all_fields() {
        let event = Event::builder("agent.llm.started")
            .category(EventCategory::Agent)
            .severity(Severity::Warning)
            .source("orchestrator")
            .correlation_id("corr-1")
            .user_id("user-1")
            .session_id("sess-1")
            .tag("llm")
            .tags(["slow", "external"])
            .custom(json!({"region": "eu"}))
            .payload(json!({"model": "m"}))
            .build();

        assert_eq!(event.name, "agent.llm.started");
        assert_eq!(event.category, EventCategory::Agent);
        assert_eq!(event.severity, Severity::Warning);
        assert_eq!(event.metadata.source, "orchestrator");
        assert_eq!(event.metadata.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(event.metadata.tags, vec!["llm", "slow", "external"]);
        assert_eq!(event.payload["model"], "m");
    }

    #[test]
    fn test_json_round_trip_identity() {
        let event = Event::builder("tool.succeeded")
            .category(EventCategory::Tool)
            .severity(Severity::Info)
            .source("calculator")
            .correlation_id("corr-9")
            .tag("math")
            .custom(json!({"attempt": 2}))
            .payload(json!({"tool_name": "calculator", "output": {"sum": 7}, "duration_ms": 12}))
            .build();

        let json = event.to_json().unwrap();
        let parsed = Event::from_json(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_clone_preserves_all_fields() {
        let event = Event::tool_invoked("search", json!({"q": "rust"}));
        let clone = event.clone();
        assert_eq!(clone, event);
    }

    #[test]
    fn test_canonical_tool_succeeded_shape() {
        let event = Event::tool_succeeded("search", json!({"hits": 3}), 250);
        assert_eq!(event.name, "tool.succeeded");
        assert_eq!(event.category, EventCategory::Tool);
        assert_eq!(event.payload["tool_name"], "search");
        assert_eq!(event.payload["output"]["hits"], 3);
        assert_eq!(event.payload["duration_ms"], 250);
    }

    #[test]
    fn test_canonical_agent_failed_severity() {
        let event = Event::agent_failed("planner", "provider unreachable");
        assert_eq!(event.name, "agent.failed");
        assert_eq!(event.severity, Severity::Error);
        assert_eq!(event.payload["error"], "provider unreachable");
    }

    #[test]
    fn test_canonical_workflow_step_events() {
        let started = Event::workflow_step_started("wf-1", "step-2", "fetch");
        assert_eq!(started.name, "workflow.step_started");
        assert_eq!(started.payload["step_id"], "step-2");

        let completed = Event::workflow_step_completed("wf-1", "step-2", 90);
        assert_eq!(completed.name, "workflow.step_completed");
        assert_eq!(completed.payload["duration_ms"], 90);
    }

    #[test]
    fn test_optional_metadata_omitted_from_json() {
        let event = Event::new(
            "system.tick",
            EventCategory::System,
            Severity::Debug,
            "clock",
            Value::Null,
        );
        let json = event.to_json().unwrap();
        assert!(!json.contains("correlation_id"));
        assert!(!json.contains("user_id"));
        assert!(!json.contains("custom"));
    }
}
