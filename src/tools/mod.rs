pub mod builtin;
pub mod registry;
pub mod spec;
pub mod traits;

pub use registry::{RegistryError, ToolRegistry};
pub use spec::{ParamType, ParamValue, ParameterSpec, SpecError, ToolArgs, ToolSpec};
pub use traits::{Tool, ToolError};

use crate::config::ReagentConfig;
use crate::inference::GenerativeModel;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build a registry holding the built-in tools enabled by `config`.
/// `model` backs the `LLM_AGENT` tool.
pub fn default_registry(
    config: &ReagentConfig,
    model: Arc<dyn GenerativeModel>,
) -> Result<ToolRegistry> {
    let workspace = config.resolved_workspace_dir();
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(builtin::FileReaderTool::new(workspace.clone())?));
    registry.register(Arc::new(builtin::FileWriterTool::new(workspace.clone())?));
    registry.register(Arc::new(builtin::FileTreeTool::new(workspace.clone())?));

    if config.enable_shell {
        registry.register(Arc::new(builtin::ShellCommandTool::new(
            workspace,
            config.shell_timeout_secs,
        )?));
    }

    if config.enable_web {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("reagent/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for web tools")?;
        registry.register(Arc::new(builtin::DuckDuckGoSearchTool::new(http.clone())?));
        registry.register(Arc::new(builtin::WikipediaTool::new(http.clone())?));
        registry.register(Arc::new(builtin::ReadWebpageTool::new(http)?));
    }

    registry.register(Arc::new(builtin::LlmAgentTool::new(model)?));

    info!("Registered {} tools", registry.len());
    Ok(registry)
}
