//! Structural schema nodes for tool I/O and script-bridge boundaries.
//!
//! A [`Schema`] is a tagged tree: the usual scalar and container kinds
//! plus the three combinators (`any_of`, `all_of`, `one_of`). Trees own
//! their children; repositories dedupe by id, never by structural
//! sharing, and cycles cannot be expressed.
//!
//! The serde form is the JSON-Schema-flavored shape the rest of the
//! ecosystem expects:
//!
//! ```json
//! {"type": "object",
//!  "properties": {"n": {"type": "number"}},
//!  "required": ["n"],
//!  "additional_properties": false}
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lexically-checked string formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringFormat {
    DateTime,
    Date,
    Time,
    Email,
    Uri,
    Uuid,
}

/// A structural type node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schema {
    String {
        #[serde(skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        /// Wildcard pattern; `*` spans any run of characters.
        #[serde(skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<StringFormat>,
    },
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        exclusive_minimum: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        exclusive_maximum: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        multiple_of: Option<f64>,
    },
    Boolean,
    Null,
    Array {
        #[serde(skip_serializing_if = "Option::is_none")]
        items: Option<Box<Schema>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
    Object {
        #[serde(default)]
        properties: IndexMap<String, Schema>,
        #[serde(default)]
        required: Vec<String>,
        #[serde(default = "default_true")]
        additional_properties: bool,
    },
    AnyOf {
        schemas: Vec<Schema>,
    },
    AllOf {
        schemas: Vec<Schema>,
    },
    OneOf {
        schemas: Vec<Schema>,
    },
}

fn default_true() -> bool {
    true
}

impl Schema {
    /// Unconstrained string.
    pub fn string() -> Self {
        Schema::String {
            min_length: None,
            max_length: None,
            pattern: None,
            format: None,
        }
    }

    /// Unconstrained number (integer or float).
    pub fn number() -> Self {
        Schema::Number {
            minimum: None,
            maximum: None,
            exclusive_minimum: None,
            exclusive_maximum: None,
            multiple_of: None,
        }
    }

    pub fn boolean() -> Self {
        Schema::Boolean
    }

    pub fn null() -> Self {
        Schema::Null
    }

    /// Array without an item schema.
    pub fn array() -> Self {
        Schema::Array {
            items: None,
            min_items: None,
            max_items: None,
        }
    }

    /// Array whose elements match `items`.
    pub fn array_of(items: Schema) -> Self {
        Schema::Array {
            items: Some(Box::new(items)),
            min_items: None,
            max_items: None,
        }
    }

    /// Start building an object schema.
    pub fn object() -> ObjectSchemaBuilder {
        ObjectSchemaBuilder::new()
    }

    pub fn any_of(schemas: Vec<Schema>) -> Self {
        Schema::AnyOf { schemas }
    }

    pub fn all_of(schemas: Vec<Schema>) -> Self {
        Schema::AllOf { schemas }
    }

    pub fn one_of(schemas: Vec<Schema>) -> Self {
        Schema::OneOf { schemas }
    }

    /// The type's zero value, used when coercing nulls and filling
    /// missing required properties.
    pub fn default_value(&self) -> Value {
        match self {
            Schema::String { .. } => Value::String(String::new()),
            Schema::Number { .. } => Value::from(0),
            Schema::Boolean => Value::Bool(false),
            Schema::Null => Value::Null,
            Schema::Array { .. } => Value::Array(Vec::new()),
            Schema::Object { .. } => Value::Object(serde_json::Map::new()),
            Schema::AnyOf { schemas } | Schema::OneOf { schemas } | Schema::AllOf { schemas } => {
                schemas
                    .first()
                    .map(Schema::default_value)
                    .unwrap_or(Value::Null)
            }
        }
    }
}

/// Builder for object schemas.
#[derive(Debug)]
pub struct ObjectSchemaBuilder {
    properties: IndexMap<String, Schema>,
    required: Vec<String>,
    additional_properties: bool,
}

impl ObjectSchemaBuilder {
    fn new() -> Self {
        Self {
            properties: IndexMap::new(),
            required: Vec::new(),
            additional_properties: true,
        }
    }

    /// Declare an optional property.
    pub fn property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Declare a required property.
    pub fn required_property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.insert(name, schema);
        self
    }

    /// Whether properties beyond the declared set are allowed.
    pub fn additional_properties(mut self, allowed: bool) -> Self {
        self.additional_properties = allowed;
        self
    }

    pub fn build(self) -> Schema {
        Schema::Object {
            properties: self.properties,
            required: self.required,
            additional_properties: self.additional_properties,
        }
    }
}
