//! Registry of tools the agent may dispatch to, keyed by case-insensitive
//! identifier.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::spec::{normalize_identifier, ToolArgs, ToolSpec};
use super::traits::Tool;

/// Failure to dispatch an action to a tool.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("unknown tool '{0}'")]
    NotFound(String),

    #[error("invalid parameters for {tool}: {}", .problems.join("; "))]
    Validation { tool: String, problems: Vec<String> },
}

/// Owns the tools registered for a session.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. An existing tool with the same identifier is replaced
    /// in place, keeping its catalog position.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let key = tool.spec().key();
        match self.index.get(&key) {
            Some(&slot) => {
                info!("Replacing tool: {}", key);
                self.tools[slot] = tool;
            }
            None => {
                debug!("Registered tool: {}", key);
                self.index.insert(key, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Case-insensitive lookup.
    pub fn resolve(&self, identifier: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.index
            .get(&normalize_identifier(identifier))
            .map(|&slot| self.tools[slot].clone())
            .ok_or_else(|| RegistryError::NotFound(identifier.trim().to_string()))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(&normalize_identifier(identifier))
    }

    /// Registered specs in insertion order.
    pub fn catalog(&self) -> Vec<&ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check raw model-supplied parameters against `spec` and convert them to
    /// typed values. Fails as a whole if anything is missing or unconvertible;
    /// parameters the spec does not declare are ignored.
    pub fn validate_and_coerce(
        &self,
        spec: &ToolSpec,
        raw: &BTreeMap<String, String>,
    ) -> Result<ToolArgs, RegistryError> {
        let mut values = BTreeMap::new();
        let mut problems = Vec::new();

        for param in spec.parameters() {
            match raw.get(param.name()) {
                Some(text) => match param.param_type().coerce(text) {
                    Ok(value) => {
                        values.insert(param.name().to_string(), value);
                    }
                    Err(e) => problems.push(format!("'{}': {}", param.name(), e)),
                },
                None => {
                    if let Some(default) = param.default_value() {
                        values.insert(param.name().to_string(), default.clone());
                    } else if param.is_required() {
                        problems.push(format!("missing required parameter '{}'", param.name()));
                    }
                }
            }
        }

        for name in raw.keys() {
            if !spec.parameters().iter().any(|p| p.name() == name) {
                debug!("Ignoring undeclared parameter '{}' for {}", name, spec.identifier());
            }
        }

        if problems.is_empty() {
            Ok(ToolArgs::new(values))
        } else {
            Err(RegistryError::Validation {
                tool: spec.identifier().to_string(),
                problems,
            })
        }
    }
}
