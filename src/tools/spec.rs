//! Declared tool schemas: what a tool is called, and what it is callable with.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

use super::traits::ToolError;

/// Primitive type a parameter is coerced to before the tool runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

impl ParamType {
    /// Convert raw model-supplied text into a value of this type.
    pub fn coerce(self, raw: &str) -> Result<ParamValue, String> {
        let trimmed = raw.trim();
        match self {
            Self::String => Ok(ParamValue::String(trimmed.to_string())),
            Self::Integer => trimmed
                .parse::<i64>()
                .map(ParamValue::Integer)
                .map_err(|_| format!("expected an integer, got '{}'", trimmed)),
            Self::Float => trimmed
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|_| format!("expected a float, got '{}'", trimmed)),
            Self::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(ParamValue::Boolean(true)),
                "false" | "no" | "0" => Ok(ParamValue::Boolean(false)),
                _ => Err(format!("expected a boolean, got '{}'", trimmed)),
            },
        }
    }
}

/// A parameter value after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::String(_) => ParamType::String,
            Self::Integer(_) => ParamType::Integer,
            Self::Float(_) => ParamType::Float,
            Self::Boolean(_) => ParamType::Boolean,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSpec {
    name: String,
    param_type: ParamType,
    description: String,
    required: bool,
    default: Option<ParamValue>,
}

impl ParameterSpec {
    /// A parameter the model must always supply.
    pub fn required(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    /// A parameter the model may omit.
    pub fn optional(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            default: None,
        }
    }

    /// Attach a default used when the model omits the parameter.
    pub fn with_default(mut self, value: ParamValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_type(&self) -> ParamType {
        self.param_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&ParamValue> {
        self.default.as_ref()
    }
}

/// Invalid tool declaration.
#[derive(Debug, Error, PartialEq)]
pub enum SpecError {
    #[error("tool identifier must not be empty")]
    EmptyIdentifier,
    #[error("tool '{tool}': parameter name must not be empty")]
    EmptyParameterName { tool: String },
    #[error("tool '{tool}': duplicate parameter '{param}'")]
    DuplicateParameter { tool: String, param: String },
    #[error("tool '{tool}': required parameter '{param}' must not declare a default")]
    RequiredWithDefault { tool: String, param: String },
    #[error("tool '{tool}': default for '{param}' is {found}, declared {declared}")]
    DefaultTypeMismatch {
        tool: String,
        param: String,
        declared: ParamType,
        found: ParamType,
    },
}

/// Name, description and parameter schema of a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    identifier: String,
    description: String,
    parameters: Vec<ParameterSpec>,
}

impl ToolSpec {
    /// Build a spec, checking the parameter invariants.
    pub fn new(
        identifier: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ParameterSpec>,
    ) -> Result<Self, SpecError> {
        let identifier = identifier.into().trim().to_string();
        if identifier.is_empty() {
            return Err(SpecError::EmptyIdentifier);
        }

        let mut seen = HashSet::new();
        for param in &parameters {
            if param.name.trim().is_empty() {
                return Err(SpecError::EmptyParameterName {
                    tool: identifier.clone(),
                });
            }
            if !seen.insert(param.name.as_str()) {
                return Err(SpecError::DuplicateParameter {
                    tool: identifier.clone(),
                    param: param.name.clone(),
                });
            }
            match (&param.default, param.required) {
                (Some(_), true) => {
                    return Err(SpecError::RequiredWithDefault {
                        tool: identifier.clone(),
                        param: param.name.clone(),
                    })
                }
                (Some(value), false) if value.param_type() != param.param_type => {
                    return Err(SpecError::DefaultTypeMismatch {
                        tool: identifier.clone(),
                        param: param.name.clone(),
                        declared: param.param_type,
                        found: value.param_type(),
                    })
                }
                _ => {}
            }
        }

        Ok(Self {
            identifier,
            description: description.into(),
            parameters,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Case-normalized key used by the registry.
    pub fn key(&self) -> String {
        normalize_identifier(&self.identifier)
    }
}

/// Registry keys are upper-case so lookups ignore case.
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_uppercase()
}

/// Validated, typed keyword arguments handed to a tool body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolArgs {
    values: BTreeMap<String, ParamValue>,
}

impl ToolArgs {
    pub fn new(values: BTreeMap<String, ParamValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    /// String argument; missing or mistyped is an input error.
    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        match self.values.get(name) {
            Some(ParamValue::String(s)) => Ok(s),
            Some(other) => Err(mistyped(name, ParamType::String, other)),
            None => Err(ToolError::MissingArgument(name.to_string())),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, ToolError> {
        match self.values.get(name) {
            Some(ParamValue::Integer(i)) => Ok(*i),
            Some(other) => Err(mistyped(name, ParamType::Integer, other)),
            None => Err(ToolError::MissingArgument(name.to_string())),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64, ToolError> {
        match self.values.get(name) {
            Some(ParamValue::Float(x)) => Ok(*x),
            Some(ParamValue::Integer(i)) => Ok(*i as f64),
            Some(other) => Err(mistyped(name, ParamType::Float, other)),
            None => Err(ToolError::MissingArgument(name.to_string())),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, ToolError> {
        match self.values.get(name) {
            Some(ParamValue::Boolean(b)) => Ok(*b),
            Some(other) => Err(mistyped(name, ParamType::Boolean, other)),
            None => Err(ToolError::MissingArgument(name.to_string())),
        }
    }
}

fn mistyped(name: &str, expected: ParamType, found: &ParamValue) -> ToolError {
    ToolError::InvalidInput(format!(
        "argument '{}' should be {}, got {}",
        name,
        expected,
        found.param_type()
    ))
}
