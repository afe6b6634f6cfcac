//! `LLM_AGENT`: hand a sub-task to the model under a different persona.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::inference::GenerativeModel;
use crate::tools::spec::{ParamType, ParameterSpec, SpecError, ToolArgs, ToolSpec};
use crate::tools::traits::{Tool, ToolError};

pub struct LlmAgentTool {
    spec: ToolSpec,
    model: Arc<dyn GenerativeModel>,
}

impl LlmAgentTool {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Result<Self, SpecError> {
        let spec = ToolSpec::new(
            "LLM_AGENT",
            "Generate a response to a prompt while speaking as the given persona. \
             Use it for drafting, summarizing or reviewing text from a specific point of view.",
            vec![
                ParameterSpec::required(
                    "persona",
                    ParamType::String,
                    "A detailed description of who the agent should be.",
                ),
                ParameterSpec::required("prompt", ParamType::String, "The prompt to answer."),
                ParameterSpec::optional(
                    "temperature",
                    ParamType::Float,
                    "Sampling temperature between 0.0 and 1.0. Omit to use the configured one.",
                ),
            ],
        )?;
        Ok(Self { spec, model })
    }
}

#[async_trait]
impl Tool for LlmAgentTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let persona = args.str("persona")?.trim();
        let prompt = args.str("prompt")?.trim();
        if persona.is_empty() {
            return Err(ToolError::InvalidInput("persona cannot be empty".into()));
        }
        if prompt.is_empty() {
            return Err(ToolError::InvalidInput("prompt cannot be empty".into()));
        }

        let temperature = match args.get("temperature") {
            Some(_) => {
                let t = args.float("temperature")?;
                if !(0.0..=1.0).contains(&t) {
                    return Err(ToolError::InvalidInput(format!(
                        "temperature must be between 0.0 and 1.0, got {}",
                        t
                    )));
                }
                Some(t)
            }
            None => None,
        };

        let generation = self
            .model
            .generate_as(persona, prompt, temperature)
            .await
            .map_err(|e| {
                warn!("Sub-agent call failed: {}", e);
                ToolError::Failed(format!("model call failed: {}", e))
            })?;

        info!("Sub-agent answered with {} chars", generation.content.len());
        Ok(generation.content)
    }
}
