//! Tool trait definition.

use async_trait::async_trait;
use thiserror::Error;

use super::spec::{ToolArgs, ToolSpec};

/// Failure raised inside a tool body. The agent loop records it as the
/// observation text instead of aborting.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("missing argument '{0}'")]
    MissingArgument(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// An executable tool bound to its declared spec.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Identifier, description and parameter schema.
    fn spec(&self) -> &ToolSpec;

    /// Run the tool with arguments already validated against `spec()`.
    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError>;

    /// Declared identifier (convenience for logging).
    fn name(&self) -> &str {
        self.spec().identifier()
    }
}
