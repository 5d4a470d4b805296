//! Composable filter expressions over events.
//!
//! A [`FilterExpr`] is a recursive predicate tree: leaf conditions pair a
//! [`FilterField`] selector with a [`FilterOp`] and a tagged
//! [`FilterValue`]; `and` / `or` / `not` combine children. The recorder
//! evaluates these conjunctively before persisting, and storage backends
//! evaluate them during queries.
//!
//! # Example
//!
//! ```
//! use agent_substrate::{Event, EventCategory, FilterExpr, FilterField, FilterOp, FilterValue, Severity};
//! use serde_json::json;
//!
//! let filter = FilterExpr::severity_at_least(Severity::Warning)
//!     .and(FilterExpr::condition(
//!         FilterField::Name,
//!         FilterOp::Matches,
//!         FilterValue::String("tool.*".into()),
//!     ));
//!
//! let event = Event::new(
//!     "tool.failed",
//!     EventCategory::Tool,
//!     Severity::Error,
//!     "search",
//!     json!({"error": "timeout"}),
//! );
//! assert!(filter.matches(&event));
//! ```

use crate::event::{Event, EventCategory, Severity};
use serde_json::Value;

/// Which part of an event a condition reads.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterField {
    Id,
    Name,
    Category,
    Severity,
    Source,
    CorrelationId,
    UserId,
    SessionId,
    Tags,
    Timestamp,
    /// Dotted path into the event payload.
    PayloadField(String),
    /// Dotted path into the metadata custom blob (known metadata names
    /// resolve first).
    MetadataField(String),
}

/// Comparison operator for a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
    EndsWith,
    /// Wildcard match; `*` spans any run of characters.
    Matches,
    In,
    NotIn,
}

/// Tagged comparison value.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    StringList(Vec<String>),
    Category(EventCategory),
    Severity(Severity),
    /// Dotted path resolved against the same event's payload at evaluation
    /// time, enabling field-to-field comparisons.
    JsonPath(String),
}

/// Recursive predicate tree over events.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Condition {
        field: FilterField,
        op: FilterOp,
        value: FilterValue,
    },
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    /// Leaf condition.
    pub fn condition(field: FilterField, op: FilterOp, value: FilterValue) -> Self {
        FilterExpr::Condition { field, op, value }
    }

    /// Both must hold.
    pub fn and(self, other: FilterExpr) -> Self {
        FilterExpr::And(Box::new(self), Box::new(other))
    }

    /// Either must hold.
    pub fn or(self, other: FilterExpr) -> Self {
        FilterExpr::Or(Box::new(self), Box::new(other))
    }

    /// Negation.
    pub fn not(self) -> Self {
        FilterExpr::Not(Box::new(self))
    }

    /// Events at or above the given severity.
    pub fn severity_at_least(severity: Severity) -> Self {
        Self::condition(
            FilterField::Severity,
            FilterOp::Gte,
            FilterValue::Severity(severity),
        )
    }

    /// Events of exactly the given category.
    pub fn category_is(category: EventCategory) -> Self {
        Self::condition(
            FilterField::Category,
            FilterOp::Eq,
            FilterValue::Category(category),
        )
    }

    /// Events whose name matches a wildcard pattern.
    pub fn name_matches(pattern: impl Into<String>) -> Self {
        Self::condition(
            FilterField::Name,
            FilterOp::Matches,
            FilterValue::String(pattern.into()),
        )
    }

    /// Events carrying the given tag.
    pub fn has_tag(tag: impl Into<String>) -> Self {
        Self::condition(
            FilterField::Tags,
            FilterOp::Contains,
            FilterValue::String(tag.into()),
        )
    }

    /// Evaluate this filter against an event.
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            FilterExpr::Condition { field, op, value } => eval_condition(event, field, *op, value),
            FilterExpr::And(a, b) => a.matches(event) && b.matches(event),
            FilterExpr::Or(a, b) => a.matches(event) || b.matches(event),
            FilterExpr::Not(inner) => !inner.matches(event),
        }
    }
}

/// Snapshot of a field's value for comparison.
enum FieldRef {
    Str(String),
    U64(u64),
    Severity(Severity),
    Category(EventCategory),
    Tags(Vec<String>),
    Json(Value),
    Missing,
}

fn resolve_field(event: &Event, field: &FilterField) -> FieldRef {
    match field {
        FilterField::Id => FieldRef::Str(event.id.clone()),
        FilterField::Name => FieldRef::Str(event.name.clone()),
        FilterField::Category => FieldRef::Category(event.category),
        FilterField::Severity => FieldRef::Severity(event.severity),
        FilterField::Source => FieldRef::Str(event.metadata.source.clone()),
        FilterField::CorrelationId => opt_str(event.metadata.correlation_id.as_deref()),
        FilterField::UserId => opt_str(event.metadata.user_id.as_deref()),
        FilterField::SessionId => opt_str(event.metadata.session_id.as_deref()),
        FilterField::Tags => FieldRef::Tags(event.metadata.tags.clone()),
        FilterField::Timestamp => FieldRef::U64(event.metadata.timestamp),
        FilterField::PayloadField(path) => match lookup_path(&event.payload, path) {
            Some(v) => FieldRef::Json(v.clone()),
            None => FieldRef::Missing,
        },
        FilterField::MetadataField(path) => resolve_metadata_field(event, path),
    }
}

fn opt_str(value: Option<&str>) -> FieldRef {
    match value {
        Some(s) => FieldRef::Str(s.to_string()),
        None => FieldRef::Missing,
    }
}

/// Known metadata names resolve directly; everything else is a path into
/// the custom blob.
fn resolve_metadata_field(event: &Event, path: &str) -> FieldRef {
    match path {
        "source" => FieldRef::Str(event.metadata.source.clone()),
        "correlation_id" => opt_str(event.metadata.correlation_id.as_deref()),
        "user_id" => opt_str(event.metadata.user_id.as_deref()),
        "session_id" => opt_str(event.metadata.session_id.as_deref()),
        "timestamp" => FieldRef::U64(event.metadata.timestamp),
        _ => match event
            .metadata
            .custom
            .as_ref()
            .and_then(|custom| lookup_path(custom, path))
        {
            Some(v) => FieldRef::Json(v.clone()),
            None => FieldRef::Missing,
        },
    }
}

/// Descend a dotted path through objects; numeric segments index arrays.
pub(crate) fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn eval_condition(event: &Event, field: &FilterField, op: FilterOp, value: &FilterValue) -> bool {
    // A JsonPath value is resolved against the event first, then compared
    // as an ordinary JSON value.
    if let FilterValue::JsonPath(path) = value {
        let resolved = match lookup_path(&event.payload, path) {
            Some(v) => v.clone(),
            None => return false,
        };
        return eval_json_condition(&resolve_field(event, field), op, &resolved);
    }

    match resolve_field(event, field) {
        FieldRef::Missing => false,
        FieldRef::Str(lhs) => eval_string(&lhs, op, value),
        FieldRef::U64(lhs) => eval_number(lhs as f64, op, value),
        FieldRef::Severity(lhs) => eval_severity(lhs, op, value),
        FieldRef::Category(lhs) => eval_category(lhs, op, value),
        FieldRef::Tags(tags) => eval_tags(&tags, op, value),
        FieldRef::Json(lhs) => eval_json(&lhs, op, value),
    }
}

fn eval_string(lhs: &str, op: FilterOp, value: &FilterValue) -> bool {
    match value {
        FilterValue::String(rhs) => match op {
            FilterOp::Eq => lhs == rhs,
            FilterOp::Ne => lhs != rhs,
            FilterOp::Gt => lhs > rhs.as_str(),
            FilterOp::Gte => lhs >= rhs.as_str(),
            FilterOp::Lt => lhs < rhs.as_str(),
            FilterOp::Lte => lhs <= rhs.as_str(),
            FilterOp::Contains => lhs.contains(rhs.as_str()),
            FilterOp::StartsWith => lhs.starts_with(rhs.as_str()),
            FilterOp::EndsWith => lhs.ends_with(rhs.as_str()),
            FilterOp::Matches => wildcard_match(lhs, rhs),
            FilterOp::In | FilterOp::NotIn => false,
        },
        FilterValue::StringList(list) => match op {
            FilterOp::In => list.iter().any(|s| s == lhs),
            FilterOp::NotIn => !list.iter().any(|s| s == lhs),
            _ => false,
        },
        _ => false,
    }
}

fn eval_number(lhs: f64, op: FilterOp, value: &FilterValue) -> bool {
    let rhs = match value {
        FilterValue::I64(n) => *n as f64,
        FilterValue::F64(n) => *n,
        _ => return false,
    };
    compare_ord(lhs.partial_cmp(&rhs), op)
}

fn eval_severity(lhs: Severity, op: FilterOp, value: &FilterValue) -> bool {
    match value {
        FilterValue::Severity(rhs) => compare_ord(Some(lhs.cmp(rhs)), op),
        FilterValue::String(rhs) => match rhs.parse::<Severity>() {
            Ok(rhs) => compare_ord(Some(lhs.cmp(&rhs)), op),
            Err(_) => false,
        },
        FilterValue::StringList(list) => match op {
            FilterOp::In => list.iter().any(|s| s == &lhs.to_string()),
            FilterOp::NotIn => !list.iter().any(|s| s == &lhs.to_string()),
            _ => false,
        },
        _ => false,
    }
}

fn eval_category(lhs: EventCategory, op: FilterOp, value: &FilterValue) -> bool {
    match value {
        FilterValue::Category(rhs) => match op {
            FilterOp::Eq => lhs == *rhs,
            FilterOp::Ne => lhs != *rhs,
            _ => false,
        },
        FilterValue::String(rhs) => match op {
            FilterOp::Eq => lhs.to_string() == *rhs,
            FilterOp::Ne => lhs.to_string() != *rhs,
            _ => false,
        },
        FilterValue::StringList(list) => match op {
            FilterOp::In => list.iter().any(|s| s == &lhs.to_string()),
            FilterOp::NotIn => !list.iter().any(|s| s == &lhs.to_string()),
            _ => false,
        },
        _ => false,
    }
}

fn eval_tags(tags: &[String], op: FilterOp, value: &FilterValue) -> bool {
    match (op, value) {
        (FilterOp::Contains, FilterValue::String(tag)) => tags.iter().any(|t| t == tag),
        // `in`: any of the listed tags present; `not_in`: none present.
        (FilterOp::In, FilterValue::StringList(list)) => {
            list.iter().any(|tag| tags.iter().any(|t| t == tag))
        }
        (FilterOp::NotIn, FilterValue::StringList(list)) => {
            !list.iter().any(|tag| tags.iter().any(|t| t == tag))
        }
        (FilterOp::Eq, FilterValue::StringList(list)) => tags == list.as_slice(),
        _ => false,
    }
}

fn eval_json(lhs: &Value, op: FilterOp, value: &FilterValue) -> bool {
    match lhs {
        Value::String(s) => eval_string(s, op, value),
        Value::Number(n) => match n.as_f64() {
            Some(f) => eval_number(f, op, value),
            None => false,
        },
        Value::Bool(b) => match (op, value) {
            (FilterOp::Eq, FilterValue::Bool(rhs)) => b == rhs,
            (FilterOp::Ne, FilterValue::Bool(rhs)) => b != rhs,
            _ => false,
        },
        Value::Array(items) => match (op, value) {
            (FilterOp::Contains, FilterValue::String(rhs)) => {
                items.iter().any(|v| v.as_str() == Some(rhs.as_str()))
            }
            (FilterOp::Contains, FilterValue::I64(rhs)) => {
                items.iter().any(|v| v.as_i64() == Some(*rhs))
            }
            _ => false,
        },
        _ => false,
    }
}

fn eval_json_condition(lhs: &FieldRef, op: FilterOp, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (FieldRef::Str(s), Value::String(r)) => eval_string(s, op, &FilterValue::String(r.clone())),
        (FieldRef::U64(n), Value::Number(r)) => match r.as_f64() {
            Some(f) => eval_number(*n as f64, op, &FilterValue::F64(f)),
            None => false,
        },
        (FieldRef::Json(l), Value::String(r)) => eval_json(l, op, &FilterValue::String(r.clone())),
        (FieldRef::Json(l), Value::Number(r)) => match r.as_f64() {
            Some(f) => eval_json(l, op, &FilterValue::F64(f)),
            None => false,
        },
        (FieldRef::Json(l), Value::Bool(r)) => eval_json(l, op, &FilterValue::Bool(*r)),
        _ => false,
    }
}

fn compare_ord(ordering: Option<std::cmp::Ordering>, op: FilterOp) -> bool {
    use std::cmp::Ordering::*;
    match ordering {
        None => false,
        Some(ord) => match op {
            FilterOp::Eq => ord == Equal,
            FilterOp::Ne => ord != Equal,
            FilterOp::Gt => ord == Greater,
            FilterOp::Gte => ord != Less,
            FilterOp::Lt => ord == Less,
            FilterOp::Lte => ord != Greater,
            _ => false,
        },
    }
}

/// Wildcard string match where `*` spans any run of characters.
///
/// Classic two-pointer scan with backtracking to the last star. This is the
/// whole pattern language: no character classes, no `?`.
pub(crate) fn wildcard_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> Event {
        Event::builder("agent.llm.completed")
            .category(EventCategory::Agent)
            .severity(Severity::Warning)
            .source("orchestrator")
            .correlation_id("corr-7")
            .tag("llm")
            .tag("slow")
            .custom(json!({"region": "eu", "shard": 3}))
            .payload(json!({"model": "qwen", "usage": {"total_tokens": 1200}, "finish": "stop"}))
            .build()
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("agent.llm.started", "agent.*"));
        assert!(wildcard_match("agent.llm.started", "*.started"));
        assert!(wildcard_match("agent.llm.started", "agent.*.started"));
        assert!(wildcard_match("anything", "*"));
        assert!(!wildcard_match("agent.llm.started", "tool.*"));
        assert!(!wildcard_match("agent", "agent.*x"));
        assert!(wildcard_match("", "*"));
        assert!(!wildcard_match("", "a"));
    }

    #[test]
    fn test_condition_on_name() {
        let event = sample_event();
        assert!(FilterExpr::name_matches("agent.*").matches(&event));
        assert!(!FilterExpr::name_matches("tool.*").matches(&event));
        assert!(
            FilterExpr::condition(
                FilterField::Name,
                FilterOp::StartsWith,
                FilterValue::String("agent.llm".into()),
            )
            .matches(&event)
        );
    }

    #[test]
    fn test_condition_on_severity_ordering() {
        let event = sample_event();
        assert!(FilterExpr::severity_at_least(Severity::Info).matches(&event));
        assert!(FilterExpr::severity_at_least(Severity::Warning).matches(&event));
        assert!(!FilterExpr::severity_at_least(Severity::Error).matches(&event));
        assert!(
            FilterExpr::condition(
                FilterField::Severity,
                FilterOp::Lt,
                FilterValue::Severity(Severity::Critical),
            )
            .matches(&event)
        );
    }

    #[test]
    fn test_condition_on_category() {
        let event = sample_event();
        assert!(FilterExpr::category_is(EventCategory::Agent).matches(&event));
        assert!(!FilterExpr::category_is(EventCategory::Tool).matches(&event));
        assert!(
            FilterExpr::condition(
                FilterField::Category,
                FilterOp::In,
                FilterValue::StringList(vec!["agent".into(), "provider".into()]),
            )
            .matches(&event)
        );
    }

    #[test]
    fn test_condition_on_tags() {
        let event = sample_event();
        assert!(FilterExpr::has_tag("llm").matches(&event));
        assert!(!FilterExpr::has_tag("fast").matches(&event));
        assert!(
            FilterExpr::condition(
                FilterField::Tags,
                FilterOp::In,
                FilterValue::StringList(vec!["slow".into(), "missing".into()]),
            )
            .matches(&event)
        );
    }

    #[test]
    fn test_condition_on_payload_path() {
        let event = sample_event();
        let deep = FilterExpr::condition(
            FilterField::PayloadField("usage.total_tokens".into()),
            FilterOp::Gt,
            FilterValue::I64(1000),
        );
        assert!(deep.matches(&event));

        let absent = FilterExpr::condition(
            FilterField::PayloadField("usage.prompt_tokens".into()),
            FilterOp::Gt,
            FilterValue::I64(0),
        );
        assert!(!absent.matches(&event));
    }

    #[test]
    fn test_condition_on_metadata_field() {
        let event = sample_event();
        let known = FilterExpr::condition(
            FilterField::MetadataField("correlation_id".into()),
            FilterOp::Eq,
            FilterValue::String("corr-7".into()),
        );
        assert!(known.matches(&event));

        let custom = FilterExpr::condition(
            FilterField::MetadataField("region".into()),
            FilterOp::Eq,
            FilterValue::String("eu".into()),
        );
        assert!(custom.matches(&event));
    }

    #[test]
    fn test_json_path_value_compares_fields() {
        let event = sample_event();
        let cond = FilterExpr::condition(
            FilterField::PayloadField("finish".into()),
            FilterOp::Eq,
            FilterValue::JsonPath("finish".into()),
        );
        assert!(cond.matches(&event));
    }

    #[test]
    fn test_and_or_not_composition() {
        let event = sample_event();
        let warning_agent = FilterExpr::severity_at_least(Severity::Warning)
            .and(FilterExpr::category_is(EventCategory::Agent));
        assert!(warning_agent.matches(&event));

        let tool_or_agent = FilterExpr::category_is(EventCategory::Tool)
            .or(FilterExpr::category_is(EventCategory::Agent));
        assert!(tool_or_agent.matches(&event));

        assert!(!FilterExpr::category_is(EventCategory::Agent).not().matches(&event));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let event = sample_event();
        let cond = FilterExpr::condition(
            FilterField::UserId,
            FilterOp::Eq,
            FilterValue::String("anyone".into()),
        );
        assert!(!cond.matches(&event));
        // but its negation does
        assert!(cond.not().matches(&event));
    }
}
