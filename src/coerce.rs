//! Type coercion: normalize loose inputs toward a schema.
//!
//! [`coerce`] recursively converts a JSON value toward schema conformance
//! under explicit option flags — nothing converts unless its flag is on.
//! A conversion that is enabled but cannot complete (e.g. `"abc"` under
//! `string_to_number`), or a type mismatch no enabled flag can bridge,
//! is an [`Error::Coercion`]; coercion never silently passes a
//! non-conforming value through.
//!
//! The returned [`CoercionOutcome::coerced`] flag is true iff the output
//! differs structurally from the input, letting callers skip re-allocation
//! when nothing changed.
//!
//! This is the seam tool arguments and script-bridge values cross before
//! validation: scripts hand over `"42"` and `"yes"`, tools receive `42`
//! and `true`.

use crate::schema::Schema;
use crate::{Error, Result};
use serde_json::{Map, Value, json};

/// Case normalization applied to strings after trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringCase {
    Lower,
    Upper,
    /// First letter of each whitespace-separated word uppercased, the
    /// rest lowercased.
    Title,
}

/// Which conversions are permitted. Everything defaults to off.
#[derive(Debug, Clone, Default)]
pub struct CoercionOptions {
    /// Parse a trimmed string as i64 first, else f64.
    pub string_to_number: bool,
    /// Format integers decimal, floats with default precision, booleans
    /// as `"true"`/`"false"`.
    pub number_to_string: bool,
    /// Case-insensitive: true/yes/1/on and false/no/0/off.
    pub string_to_boolean: bool,
    /// 0 and 0.0 become false, everything else true.
    pub number_to_boolean: bool,
    /// Null becomes the target type's zero value; missing declared object
    /// properties are filled with their schema's default.
    pub null_to_defaults: bool,
    /// Strip ASCII whitespace from both ends of strings.
    pub trim_strings: bool,
    /// Applied after trimming.
    pub string_case: Option<StringCase>,
}

impl CoercionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_string_to_number(mut self, enabled: bool) -> Self {
        self.string_to_number = enabled;
        self
    }

    pub fn with_number_to_string(mut self, enabled: bool) -> Self {
        self.number_to_string = enabled;
        self
    }

    pub fn with_string_to_boolean(mut self, enabled: bool) -> Self {
        self.string_to_boolean = enabled;
        self
    }

    pub fn with_number_to_boolean(mut self, enabled: bool) -> Self {
        self.number_to_boolean = enabled;
        self
    }

    pub fn with_null_to_defaults(mut self, enabled: bool) -> Self {
        self.null_to_defaults = enabled;
        self
    }

    pub fn with_trim_strings(mut self, enabled: bool) -> Self {
        self.trim_strings = enabled;
        self
    }

    pub fn with_string_case(mut self, case: StringCase) -> Self {
        self.string_case = Some(case);
        self
    }
}

/// Result of a coercion pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionOutcome {
    pub value: Value,
    /// True iff `value` differs structurally from the input.
    pub coerced: bool,
}

/// Coerce `value` toward `schema` under `options`.
pub fn coerce(value: &Value, schema: &Schema, options: &CoercionOptions) -> Result<CoercionOutcome> {
    let result = coerce_node(value, schema, options)?;
    let coerced = result != *value;
    Ok(CoercionOutcome {
        value: result,
        coerced,
    })
}

fn coerce_node(value: &Value, schema: &Schema, options: &CoercionOptions) -> Result<Value> {
    match schema {
        Schema::String { .. } => coerce_string(value, options),
        Schema::Number { .. } => coerce_number(value, options),
        Schema::Boolean => coerce_boolean(value, options),
        Schema::Null => match value {
            Value::Null => Ok(Value::Null),
            other => Err(mismatch(other, "null")),
        },
        Schema::Array { items, .. } => {
            let list = match value {
                Value::Array(list) => list.clone(),
                Value::Null if options.null_to_defaults => Vec::new(),
                other => return Err(mismatch(other, "array")),
            };
            match items {
                Some(items) => {
                    let mut out = Vec::with_capacity(list.len());
                    for element in &list {
                        out.push(coerce_node(element, items, options)?);
                    }
                    Ok(Value::Array(out))
                }
                None => Ok(Value::Array(list)),
            }
        }
        Schema::Object { properties, .. } => {
            let map = match value {
                Value::Object(map) => map.clone(),
                Value::Null if options.null_to_defaults => Map::new(),
                other => return Err(mismatch(other, "object")),
            };
            let mut out = Map::new();
            for (key, prop_value) in &map {
                match properties.get(key) {
                    Some(prop_schema) => {
                        out.insert(key.clone(), coerce_node(prop_value, prop_schema, options)?);
                    }
                    // Undeclared properties pass through untouched; the
                    // validator decides whether they are allowed.
                    None => {
                        out.insert(key.clone(), prop_value.clone());
                    }
                }
            }
            if options.null_to_defaults {
                for (name, prop_schema) in properties {
                    if !out.contains_key(name) {
                        out.insert(name.clone(), prop_schema.default_value());
                    }
                }
            }
            Ok(Value::Object(out))
        }
        Schema::AnyOf { schemas } => {
            // Declaration order; first alternative that coerces wins.
            for schema in schemas {
                if let Ok(coerced) = coerce_node(value, schema, options) {
                    return Ok(coerced);
                }
            }
            Err(Error::coercion(format!(
                "value matches none of the {} any_of alternatives",
                schemas.len()
            )))
        }
        // all_of does not coerce: the value is returned untouched.
        Schema::AllOf { .. } => Ok(value.clone()),
        Schema::OneOf { schemas } => {
            let mut successes: Vec<Value> = schemas
                .iter()
                .filter_map(|schema| coerce_node(value, schema, options).ok())
                .collect();
            let count = successes.len();
            if count == 1 {
                Ok(successes.remove(0))
            } else {
                Err(Error::coercion(format!(
                    "expected exactly one one_of alternative to coerce, got {count}"
                )))
            }
        }
    }
}

fn mismatch(value: &Value, target: &str) -> Error {
    let got = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    Error::coercion(format!("cannot coerce {got} to {target}"))
}

fn coerce_string(value: &Value, options: &CoercionOptions) -> Result<Value> {
    match value {
        Value::String(s) => {
            let mut out = if options.trim_strings {
                s.trim_matches(|c: char| c.is_ascii_whitespace()).to_string()
            } else {
                s.clone()
            };
            if let Some(case) = options.string_case {
                out = apply_case(&out, case);
            }
            Ok(Value::String(out))
        }
        Value::Number(n) if options.number_to_string => Ok(Value::String(n.to_string())),
        Value::Bool(b) if options.number_to_string => {
            Ok(Value::String(if *b { "true" } else { "false" }.to_string()))
        }
        Value::Null if options.null_to_defaults => Ok(Value::String(String::new())),
        other => Err(mismatch(other, "string")),
    }
}

fn coerce_number(value: &Value, options: &CoercionOptions) -> Result<Value> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) if options.string_to_number => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(json!(i));
            }
            match trimmed.parse::<f64>() {
                Ok(f) => Ok(json!(f)),
                Err(_) => Err(Error::coercion(format!(
                    "cannot parse '{trimmed}' as a number"
                ))),
            }
        }
        Value::Null if options.null_to_defaults => Ok(json!(0)),
        other => Err(mismatch(other, "number")),
    }
}

fn coerce_boolean(value: &Value, options: &CoercionOptions) -> Result<Value> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(s) if options.string_to_boolean => {
            match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(Value::Bool(true)),
                "false" | "no" | "0" | "off" => Ok(Value::Bool(false)),
                other => Err(Error::coercion(format!(
                    "'{other}' is not a recognized boolean"
                ))),
            }
        }
        Value::Number(n) if options.number_to_boolean => {
            Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)))
        }
        Value::Null if options.null_to_defaults => Ok(Value::Bool(false)),
        other => Err(mismatch(other, "boolean")),
    }
}

fn apply_case(s: &str, case: StringCase) -> String {
    match case {
        StringCase::Lower => s.to_lowercase(),
        StringCase::Upper => s.to_uppercase(),
        StringCase::Title => {
            let mut out = String::with_capacity(s.len());
            let mut at_word_start = true;
            for c in s.chars() {
                if c.is_whitespace() {
                    at_word_start = true;
                    out.push(c);
                } else if at_word_start {
                    out.extend(c.to_uppercase());
                    at_word_start = false;
                } else {
                    out.extend(c.to_lowercase());
                }
            }
            out
        }
    }
}
