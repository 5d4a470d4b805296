//! Structural validation of JSON values against [`Schema`] trees.
//!
//! [`validate`] is a pure recursive function: no schema registry, no I/O,
//! no mutation. It returns every violation it finds, each with a
//! human-readable message and a dotted/indexed path into the value
//! (`steps[2].name`), rather than stopping at the first.

use crate::filter::wildcard_match;
use crate::schema::{Schema, StringFormat};
use serde_json::Value;

/// One violation: what went wrong and where.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub message: String,
    /// Dotted path into the value; `None` at the root.
    pub path: Option<String>,
}

/// Outcome of a validation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validate `value` against `schema`, collecting every violation.
pub fn validate(value: &Value, schema: &Schema) -> ValidationReport {
    let mut errors = Vec::new();
    validate_node(value, schema, "", &mut errors);
    ValidationReport::from_errors(errors)
}

fn push(errors: &mut Vec<ValidationError>, path: &str, message: impl Into<String>) {
    errors.push(ValidationError {
        message: message.into(),
        path: if path.is_empty() {
            None
        } else {
            Some(path.to_string())
        },
    });
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn validate_node(value: &Value, schema: &Schema, path: &str, errors: &mut Vec<ValidationError>) {
    match schema {
        Schema::String {
            min_length,
            max_length,
            pattern,
            format,
        } => {
            let Some(s) = value.as_str() else {
                push(errors, path, format!("expected string, got {}", type_name(value)));
                return;
            };
            let len = s.chars().count();
            if let Some(min) = min_length {
                if len < *min {
                    push(errors, path, format!("string length {len} is below minimum {min}"));
                }
            }
            if let Some(max) = max_length {
                if len > *max {
                    push(errors, path, format!("string length {len} exceeds maximum {max}"));
                }
            }
            if let Some(pattern) = pattern {
                if !wildcard_match(s, pattern) {
                    push(errors, path, format!("string does not match pattern '{pattern}'"));
                }
            }
            if let Some(format) = format {
                if !check_format(s, *format) {
                    push(errors, path, format!("string is not a valid {format:?}"));
                }
            }
        }
        Schema::Number {
            minimum,
            maximum,
            exclusive_minimum,
            exclusive_maximum,
            multiple_of,
        } => {
            let Some(n) = value.as_f64() else {
                push(errors, path, format!("expected number, got {}", type_name(value)));
                return;
            };
            if let Some(min) = minimum {
                if n < *min {
                    push(errors, path, format!("{n} is below minimum {min}"));
                }
            }
            if let Some(max) = maximum {
                if n > *max {
                    push(errors, path, format!("{n} exceeds maximum {max}"));
                }
            }
            if let Some(min) = exclusive_minimum {
                if n <= *min {
                    push(errors, path, format!("{n} is not above exclusive minimum {min}"));
                }
            }
            if let Some(max) = exclusive_maximum {
                if n >= *max {
                    push(errors, path, format!("{n} is not below exclusive maximum {max}"));
                }
            }
            if let Some(step) = multiple_of {
                if *step != 0.0 {
                    let quotient = n / step;
                    if (quotient - quotient.round()).abs() > 1e-9 {
                        push(errors, path, format!("{n} is not a multiple of {step}"));
                    }
                }
            }
        }
        Schema::Boolean => {
            if !value.is_boolean() {
                push(errors, path, format!("expected boolean, got {}", type_name(value)));
            }
        }
        Schema::Null => {
            if !value.is_null() {
                push(errors, path, format!("expected null, got {}", type_name(value)));
            }
        }
        Schema::Array {
            items,
            min_items,
            max_items,
        } => {
            let Some(list) = value.as_array() else {
                push(errors, path, format!("expected array, got {}", type_name(value)));
                return;
            };
            if let Some(min) = min_items {
                if list.len() < *min {
                    push(errors, path, format!("array has {} items, fewer than minimum {min}", list.len()));
                }
            }
            if let Some(max) = max_items {
                if list.len() > *max {
                    push(errors, path, format!("array has {} items, more than maximum {max}", list.len()));
                }
            }
            if let Some(items) = items {
                for (index, element) in list.iter().enumerate() {
                    let element_path = format!("{path}[{index}]");
                    validate_node(element, items, &element_path, errors);
                }
            }
        }
        Schema::Object {
            properties,
            required,
            additional_properties,
        } => {
            let Some(map) = value.as_object() else {
                push(errors, path, format!("expected object, got {}", type_name(value)));
                return;
            };
            for name in required {
                if !map.contains_key(name) {
                    push(errors, path, format!("missing required property '{name}'"));
                }
            }
            for (name, prop_schema) in properties {
                if let Some(prop_value) = map.get(name) {
                    let prop_path = join(path, name);
                    validate_node(prop_value, prop_schema, &prop_path, errors);
                }
            }
            if !additional_properties {
                for name in map.keys() {
                    if !properties.contains_key(name) {
                        push(errors, path, format!("unexpected property '{name}'"));
                    }
                }
            }
        }
        Schema::AnyOf { schemas } => {
            if !schemas.iter().any(|s| validate(value, s).valid) {
                push(
                    errors,
                    path,
                    format!("value does not match any of the {} alternatives", schemas.len()),
                );
            }
        }
        Schema::AllOf { schemas } => {
            for schema in schemas {
                validate_node(value, schema, path, errors);
            }
        }
        Schema::OneOf { schemas } => {
            let matching = schemas.iter().filter(|s| validate(value, s).valid).count();
            if matching != 1 {
                push(
                    errors,
                    path,
                    format!("expected exactly one alternative to match, got {matching}"),
                );
            }
        }
    }
}

/// Lexical format checks only; nothing here consults a calendar.
fn check_format(s: &str, format: StringFormat) -> bool {
    match format {
        StringFormat::Date => is_date(s),
        StringFormat::Time => is_time(s),
        StringFormat::DateTime => {
            let bytes = s.as_bytes();
            bytes.len() >= 19
                && is_date_bytes(&bytes[..10])
                && bytes[10] == b'T'
                && is_time_bytes(&bytes[11..19])
        }
        StringFormat::Email => {
            let mut parts = s.splitn(2, '@');
            match (parts.next(), parts.next()) {
                (Some(local), Some(domain)) => {
                    !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
                }
                _ => false,
            }
        }
        StringFormat::Uri => match s.split_once("://") {
            Some((scheme, rest)) => {
                !scheme.is_empty()
                    && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-')
                    && !rest.is_empty()
            }
            None => false,
        },
        StringFormat::Uuid => {
            let bytes = s.as_bytes();
            bytes.len() == 36
                && bytes.iter().enumerate().all(|(i, b)| match i {
                    8 | 13 | 18 | 23 => *b == b'-',
                    _ => b.is_ascii_hexdigit(),
                })
        }
    }
}

fn is_date(s: &str) -> bool {
    is_date_bytes(s.as_bytes())
}

fn is_date_bytes(bytes: &[u8]) -> bool {
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

fn is_time(s: &str) -> bool {
    is_time_bytes(s.as_bytes())
}

fn is_time_bytes(bytes: &[u8]) -> bool {
    bytes.len() == 8
        && bytes.iter().enumerate().all(|(i, b)| match i {
            2 | 5 => *b == b':',
            _ => b.is_ascii_digit(),
        })
}
