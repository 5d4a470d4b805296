//! Workflow definition serialization: JSON and the compact binary form.
//!
//! The workflow *executor* lives outside this crate; what lives here is
//! the interchange format it reads and writes. A [`WorkflowDefinition`]
//! serializes to JSON via serde, and to a length-prefixed binary form:
//! the magic bytes `Z L W F`, a little-endian `u32` format version
//! (currently 1), then length-prefixed UTF-8 strings and sub-structures.
//! Nested JSON values (step configs, variables, schemas) are embedded as
//! compact JSON strings.
//!
//! Decoding is strict: wrong magic, an unknown format version, or a
//! truncated buffer is [`Error::InvalidInput`].

use crate::schema::Schema;
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const WORKFLOW_MAGIC: [u8; 4] = *b"ZLWF";
const BINARY_FORMAT_VERSION: u32 = 1;

/// One step in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    /// Step kind tag interpreted by the executor (e.g. `"tool"`, `"llm"`).
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub config: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl WorkflowStep {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        step_type: impl Into<String>,
        config: Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            step_type: step_type.into(),
            config,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Optional workflow-level metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
}

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, Value>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WorkflowMetadata>,
}

impl WorkflowDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: None,
            author: None,
            variables: IndexMap::new(),
            steps: Vec::new(),
            input_schema: None,
            output_schema: None,
            metadata: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_input_schema(mut self, schema: Schema) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_metadata(mut self, metadata: WorkflowMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode to the `ZLWF` binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&WORKFLOW_MAGIC);
        put_u32(&mut buf, BINARY_FORMAT_VERSION);

        put_str(&mut buf, &self.id);
        put_str(&mut buf, &self.name);
        put_str(&mut buf, &self.version);
        put_opt_str(&mut buf, self.description.as_deref());
        put_opt_str(&mut buf, self.author.as_deref());

        put_u32(&mut buf, self.variables.len() as u32);
        for (name, value) in &self.variables {
            put_str(&mut buf, name);
            put_str(&mut buf, &serde_json::to_string(value)?);
        }

        put_u32(&mut buf, self.steps.len() as u32);
        for step in &self.steps {
            put_str(&mut buf, &step.id);
            put_str(&mut buf, &step.name);
            put_str(&mut buf, &step.step_type);
            put_str(&mut buf, &serde_json::to_string(&step.config)?);
            match &step.metadata {
                Some(metadata) => {
                    buf.push(1);
                    put_str(&mut buf, &serde_json::to_string(metadata)?);
                }
                None => buf.push(0),
            }
        }

        put_opt_json(&mut buf, self.input_schema.as_ref())?;
        put_opt_json(&mut buf, self.output_schema.as_ref())?;

        match &self.metadata {
            Some(metadata) => {
                buf.push(1);
                put_u32(&mut buf, metadata.tags.len() as u32);
                for tag in &metadata.tags {
                    put_str(&mut buf, tag);
                }
                put_opt_u64(&mut buf, metadata.timeout_ms);
                put_opt_u64(&mut buf, metadata.max_retries.map(u64::from));
                put_opt_u64(&mut buf, metadata.created_at);
                put_opt_u64(&mut buf, metadata.updated_at);
            }
            None => buf.push(0),
        }

        Ok(buf)
    }

    /// Decode the `ZLWF` binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.take(4)?;
        if magic != WORKFLOW_MAGIC {
            return Err(Error::invalid_input("bad workflow magic"));
        }
        let format_version = reader.read_u32()?;
        if format_version != BINARY_FORMAT_VERSION {
            return Err(Error::invalid_input(format!(
                "unsupported workflow format version {format_version}"
            )));
        }

        let id = reader.read_str()?;
        let name = reader.read_str()?;
        let version = reader.read_str()?;
        let description = reader.read_opt_str()?;
        let author = reader.read_opt_str()?;

        let variable_count = reader.read_u32()? as usize;
        let mut variables = IndexMap::with_capacity(variable_count);
        for _ in 0..variable_count {
            let name = reader.read_str()?;
            let value: Value = serde_json::from_str(&reader.read_str()?)?;
            variables.insert(name, value);
        }

        let step_count = reader.read_u32()? as usize;
        let mut steps = Vec::with_capacity(step_count);
        for _ in 0..step_count {
            let id = reader.read_str()?;
            let name = reader.read_str()?;
            let step_type = reader.read_str()?;
            let config: Value = serde_json::from_str(&reader.read_str()?)?;
            let metadata = match reader.read_opt_str()? {
                Some(json) => Some(serde_json::from_str(&json)?),
                None => None,
            };
            steps.push(WorkflowStep {
                id,
                name,
                step_type,
                config,
                metadata,
            });
        }

        let input_schema = read_opt_json(&mut reader)?;
        let output_schema = read_opt_json(&mut reader)?;

        let metadata = if reader.read_u8()? == 1 {
            let tag_count = reader.read_u32()? as usize;
            let mut tags = Vec::with_capacity(tag_count);
            for _ in 0..tag_count {
                tags.push(reader.read_str()?);
            }
            Some(WorkflowMetadata {
                tags,
                timeout_ms: reader.read_opt_u64()?,
                max_retries: reader.read_opt_u64()?.map(|n| n as u32),
                created_at: reader.read_opt_u64()?,
                updated_at: reader.read_opt_u64()?,
            })
        } else {
            None
        };

        Ok(Self {
            id,
            name,
            version,
            description,
            author,
            variables,
            steps,
            input_schema,
            output_schema,
            metadata,
        })
    }
}

// --- encoding helpers ------------------------------------------------------

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn put_opt_str(buf: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => {
            buf.push(1);
            put_str(buf, s);
        }
        None => buf.push(0),
    }
}

fn put_opt_u64(buf: &mut Vec<u8>, value: Option<u64>) {
    match value {
        Some(value) => {
            buf.push(1);
            put_u64(buf, value);
        }
        None => buf.push(0),
    }
}

fn put_opt_json<T: Serialize>(buf: &mut Vec<u8>, value: Option<&T>) -> Result<()> {
    match value {
        Some(value) => {
            buf.push(1);
            put_str(buf, &serde_json::to_string(value)?);
        }
        None => buf.push(0),
    }
    Ok(())
}

fn read_opt_json<T: for<'de> Deserialize<'de>>(reader: &mut Reader<'_>) -> Result<Option<T>> {
    match reader.read_opt_str()? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::invalid_input("truncated workflow payload"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_str(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::invalid_input("workflow string is not UTF-8"))
    }

    fn read_opt_str(&mut self) -> Result<Option<String>> {
        match self.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.read_str()?)),
            flag => Err(Error::invalid_input(format!(
                "invalid presence flag {flag}"
            ))),
        }
    }

    fn read_opt_u64(&mut self) -> Result<Option<u64>> {
        match self.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.read_u64()?)),
            flag => Err(Error::invalid_input(format!(
                "invalid presence flag {flag}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_workflow() -> WorkflowDefinition {
        WorkflowDefinition::new("wf-1", "enrich-and-summarize", "1.2.0")
            .with_description("Fetch, enrich, summarize")
            .with_author("platform-team")
            .with_variable("model", json!("qwen2.5-32b-instruct"))
            .with_variable("max_docs", json!(10))
            .with_step(
                WorkflowStep::new("s1", "fetch", "tool", json!({"tool_name": "fetch_docs"}))
                    .with_metadata(json!({"critical": true})),
            )
            .with_step(WorkflowStep::new(
                "s2",
                "summarize",
                "llm",
                json!({"prompt": "Summarize: {{docs}}"}),
            ))
            .with_input_schema(
                Schema::object()
                    .required_property("query", Schema::string())
                    .build(),
            )
            .with_output_schema(Schema::string())
            .with_metadata(WorkflowMetadata {
                tags: vec!["prod".into(), "daily".into()],
                timeout_ms: Some(120_000),
                max_retries: Some(2),
                created_at: Some(1_700_000_000_000),
                updated_at: None,
            })
    }

    #[test]
    fn test_json_round_trip() {
        let workflow = full_workflow();
        let json = workflow.to_json().unwrap();
        let parsed = WorkflowDefinition::from_json(&json).unwrap();
        assert_eq!(parsed, workflow);
    }

    #[test]
    fn test_json_step_type_field_name() {
        let workflow = full_workflow();
        let value: Value = serde_json::from_str(&workflow.to_json().unwrap()).unwrap();
        assert_eq!(value["steps"][0]["type"], "tool");
        assert_eq!(value["variables"]["max_docs"], 10);
    }

    #[test]
    fn test_binary_round_trip_full() {
        let workflow = full_workflow();
        let bytes = workflow.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"ZLWF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1);

        let parsed = WorkflowDefinition::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, workflow);
    }

    #[test]
    fn test_binary_round_trip_minimal() {
        let workflow = WorkflowDefinition::new("wf-2", "noop", "0.1.0");
        let bytes = workflow.to_bytes().unwrap();
        let parsed = WorkflowDefinition::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, workflow);
    }

    #[test]
    fn test_binary_rejects_bad_magic() {
        let mut bytes = full_workflow().to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            WorkflowDefinition::from_bytes(&bytes),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_binary_rejects_unknown_version() {
        let mut bytes = full_workflow().to_bytes().unwrap();
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            WorkflowDefinition::from_bytes(&bytes),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_binary_rejects_truncation() {
        let bytes = full_workflow().to_bytes().unwrap();
        for cut in [3, 8, 20, bytes.len() - 1] {
            assert!(
                WorkflowDefinition::from_bytes(&bytes[..cut]).is_err(),
                "cut at {cut} should fail"
            );
        }
    }

    #[test]
    fn test_variables_preserve_declaration_order() {
        let workflow = WorkflowDefinition::new("wf", "w", "1")
            .with_variable("z", json!(1))
            .with_variable("a", json!(2));
        let parsed = WorkflowDefinition::from_bytes(&workflow.to_bytes().unwrap()).unwrap();
        let keys: Vec<_> = parsed.variables.keys().cloned().collect();
        assert_eq!(keys, ["z", "a"]);
    }
}
