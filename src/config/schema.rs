//! Configuration schema for reagent.toml.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReagentConfig {
    /// Base URL of an OpenAI-compatible chat completions API.
    pub inference_api_url: String,

    /// Bearer token for the inference API (empty for local backends).
    pub inference_api_key: String,

    /// Model identifier passed to the backend.
    pub inference_model: String,

    /// System message sent with every prompt.
    pub system_role: String,

    /// Sampling temperature.
    pub temperature: f64,

    /// Maximum tokens per completion.
    pub max_tokens: u32,

    /// Per-request timeout for the model and web tools, in seconds.
    pub request_timeout_secs: u64,

    /// Think/decide/act cycles allowed before giving up.
    pub max_iterations: u32,

    /// Optional prompt template file; empty uses the built-in template.
    pub prompt_template_path: String,

    /// Directory relative file paths and shell commands resolve against.
    pub workspace_dir: String,

    /// Register the SHELL_COMMAND tool.
    pub enable_shell: bool,

    /// Default timeout for shell commands, in seconds.
    pub shell_timeout_secs: u64,

    /// Register the web search, Wikipedia and page reader tools.
    pub enable_web: bool,

    /// Where `--save` writes transcripts.
    pub transcript_dir: String,

    /// Log level (debug, info, warn, error).
    pub log_level: String,

    /// Config version.
    pub version: u32,
}

impl Default for ReagentConfig {
    fn default() -> Self {
        Self {
            inference_api_url: "http://localhost:11434".into(),
            inference_api_key: String::new(),
            inference_model: "qwen2.5-coder:14b".into(),
            system_role: "You are a helpful assistant.".into(),
            temperature: 0.7,
            max_tokens: 4096,
            request_timeout_secs: 120,
            max_iterations: 20,
            prompt_template_path: String::new(),
            workspace_dir: ".".into(),
            enable_shell: true,
            shell_timeout_secs: 30,
            enable_web: true,
            transcript_dir: "~/.reagent/transcripts".into(),
            log_level: "info".into(),
            version: 1,
        }
    }
}

impl ReagentConfig {
    /// Resolve a path that may contain `~` to an absolute path.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).into_owned())
    }

    /// Resolved workspace directory.
    pub fn resolved_workspace_dir(&self) -> PathBuf {
        self.resolve_path(&self.workspace_dir)
    }

    /// Resolved transcript directory.
    pub fn resolved_transcript_dir(&self) -> PathBuf {
        self.resolve_path(&self.transcript_dir)
    }

    /// Resolved prompt template path, if one is configured.
    pub fn resolved_prompt_template(&self) -> Option<PathBuf> {
        if self.prompt_template_path.trim().is_empty() {
            None
        } else {
            Some(self.resolve_path(&self.prompt_template_path))
        }
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            bail!("max_iterations must be a positive integer");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            bail!("temperature must be between 0.0 and 2.0, got {}", self.temperature);
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        if self.shell_timeout_secs == 0 {
            bail!("shell_timeout_secs must be positive");
        }
        if self.inference_api_url.trim().is_empty() {
            bail!("inference_api_url must be set");
        }
        Ok(())
    }
}
