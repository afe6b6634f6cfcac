//! Built-in tools wired in by the CLI.

pub mod files;
pub mod llm_agent;
pub mod shell;
pub mod web;

pub use files::{FileReaderTool, FileTreeTool, FileWriterTool};
pub use llm_agent::LlmAgentTool;
pub use shell::ShellCommandTool;
pub use web::{DuckDuckGoSearchTool, ReadWebpageTool, WikipediaTool};
