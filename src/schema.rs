//! Typed parameter descriptors and argument validation.
//!
//! Each tool declares an ordered list of `ParamSpec`s. Incoming arguments are
//! checked against that list before any process is spawned: required values
//! must be present, present values must have the declared kind (and lie at
//! or above a declared integer minimum), and absent optional values pick up
//! their declared default. Arguments not named in
//! the schema are dropped.
//!
//! Validation is structural only. String values are NOT made safe for the
//! interpreter here; that happens at `process::quote::quote_literal`.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Kind tag of a declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Bool,
    Integer,
    /// A string restricted to one of the listed values.
    Enum(&'static [&'static str]),
    StringArray,
}

impl ParamKind {
    /// Human-readable name used in type mismatch messages.
    pub fn label(&self) -> String {
        match self {
            ParamKind::String => "string".to_string(),
            ParamKind::Bool => "boolean".to_string(),
            ParamKind::Integer => "integer".to_string(),
            ParamKind::Enum(values) => format!("one of {}", values.join(", ")),
            ParamKind::StringArray => "array of strings".to_string(),
        }
    }

    /// Check `value` against this kind, returning the (possibly normalized) value.
    ///
    /// Integral floats such as `5.0` are accepted for `Integer` and rewritten
    /// as integers so typed deserialization downstream sees an `i64`.
    fn accept(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ParamKind::String, Value::String(_)) => Some(value.clone()),
            (ParamKind::Bool, Value::Bool(_)) => Some(value.clone()),
            (ParamKind::Integer, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::from(i))
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| Value::from(f as i64))
                }
            }
            (ParamKind::Enum(values), Value::String(s)) if values.contains(&s.as_str()) => {
                Some(value.clone())
            }
            (ParamKind::StringArray, Value::Array(items)) if items.iter().all(Value::is_string) => {
                Some(value.clone())
            }
            _ => None,
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
    /// Smallest accepted value for an `Integer` parameter.
    pub minimum: Option<i64>,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            minimum: None,
            description,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            minimum: None,
            description,
        }
    }

    /// Set the value substituted when the caller omits this parameter.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_minimum(mut self, minimum: i64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    fn check_minimum(&self, value: &Value) -> std::result::Result<(), ValidationError> {
        match (self.minimum, value.as_i64()) {
            (Some(minimum), Some(found)) if found < minimum => Err(ValidationError::BelowMinimum {
                name: self.name.to_string(),
                minimum,
                found,
            }),
            _ => Ok(()),
        }
    }
}

/// Why a set of arguments was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("parameter '{name}' must be {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("parameter '{name}' must be at least {minimum}, got {found}")]
    BelowMinimum {
        name: String,
        minimum: i64,
        found: i64,
    },
}

/// Arguments that passed validation, with defaults filled in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Deserialize into a typed parameter struct.
    pub fn parse<T: DeserializeOwned>(self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0))
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Validate raw call arguments against a parameter schema.
///
/// A JSON `null` counts as absent, so an explicit null for an optional
/// parameter picks up its default and for a required one is a missing
/// parameter.
pub fn validate(
    params: &[ParamSpec],
    arguments: Option<&Map<String, Value>>,
) -> std::result::Result<ValidatedArgs, ValidationError> {
    let mut validated = Map::new();

    for spec in params {
        let supplied = arguments
            .and_then(|args| args.get(spec.name))
            .filter(|v| !v.is_null());

        match supplied {
            Some(value) => {
                let accepted =
                    spec.kind
                        .accept(value)
                        .ok_or_else(|| ValidationError::TypeMismatch {
                            name: spec.name.to_string(),
                            expected: spec.kind.label(),
                            found: describe_value(value),
                        })?;
                spec.check_minimum(&accepted)?;
                validated.insert(spec.name.to_string(), accepted);
            }
            None if spec.required => {
                return Err(ValidationError::MissingParameter(spec.name.to_string()));
            }
            None => {
                if let Some(default) = &spec.default {
                    validated.insert(spec.name.to_string(), default.clone());
                }
            }
        }
    }

    Ok(ValidatedArgs(validated))
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string \"{}\"", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

/// Render a parameter list as a JSON Schema object for MCP tool listing.
pub fn to_json_schema(params: &[ParamSpec]) -> Map<String, Value> {
    let mut props = Map::new();
    let mut required = Vec::new();

    for spec in params {
        let mut schema = match &spec.kind {
            ParamKind::String => serde_json::json!({ "type": "string" }),
            ParamKind::Bool => serde_json::json!({ "type": "boolean" }),
            ParamKind::Integer => serde_json::json!({ "type": "integer" }),
            ParamKind::Enum(values) => serde_json::json!({ "type": "string", "enum": values }),
            ParamKind::StringArray => {
                serde_json::json!({ "type": "array", "items": { "type": "string" } })
            }
        };
        schema["description"] = Value::String(spec.description.to_string());
        if let Some(default) = &spec.default {
            schema["default"] = default.clone();
        }
        if let Some(minimum) = spec.minimum {
            schema["minimum"] = Value::from(minimum);
        }
        props.insert(spec.name.to_string(), schema);

        if spec.required {
            required.push(Value::String(spec.name.to_string()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(props));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    schema
}
