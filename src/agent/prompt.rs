//! Prompt builder for each reasoning step.
//!
//! The template is a value owned by the builder. Placeholders:
//! `{query}`, `{history}`, `{iteration}`, `{max_iterations}`, `{tools}`.

use crate::agent::transcript::Transcript;
use crate::tools::ToolSpec;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

/// Built-in ReAct template.
pub const DEFAULT_TEMPLATE: &str = r#"You are a ReAct (Reasoning and Acting) agent tasked with answering the following query:

## Query to solve:

<query>
{query}
</query>

## Goal:

Reason about the query and decide on the best course of action to answer it accurately.

## Session History:
{history}

Current iteration: {iteration}
Max iterations: {max_iterations}

## Available tools:
<tools>
{tools}
</tools>

## Instructions:
1. Analyze the query, the previous reasoning steps and the observations in the history.
2. Decide on the next step: use a tool, or give the final answer. Use a tool when you
   are not sure how to answer the query.
3. You must answer within {max_iterations} iterations.
4. Respond with ONLY one XML object in exactly one of the two formats below.

## Output Format:
Format 1 - you need to use a tool:
```xml
<response>
    <thought>Your detailed reasoning about what to do next</thought>
    <action>
        <tool_name>EXACT_TOOL_NAME</tool_name>
        <reason>Brief explanation of why you chose this tool</reason>
        <parameters>
            <parameter>
                <name>parameter_name</name>
                <value>parameter value</value>
            </parameter>
        </parameters>
    </action>
</response>
```

Format 2 - you have enough information to answer:
```xml
<response>
    <thought>Your reasoning about why you can now answer the query</thought>
    <answer>Your final answer to the query</answer>
</response>
```

Never include both <action> and <answer>. Do not write any text before or after the
XML object. Escape `&` as `&amp;` and `<` as `&lt;` inside text.
"#;

/// Renders the next prompt from the query, transcript, budget and tool catalog.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl PromptBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Load a template from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let template = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt template {}", path.display()))?;
        Ok(Self::new(template))
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the prompt. Pure: same inputs, same output.
    pub fn build(
        &self,
        query: &str,
        transcript: &Transcript,
        iteration: u32,
        max_iterations: u32,
        catalog: &[&ToolSpec],
    ) -> String {
        let history = format!("<history>\n{}\n</history>", transcript.render());
        let iteration = iteration.to_string();
        let max_iterations = max_iterations.to_string();
        let tools = render_tools(catalog);

        let prompt = substitute(
            &self.template,
            &[
                ("query", query),
                ("history", &history),
                ("iteration", &iteration),
                ("max_iterations", &max_iterations),
                ("tools", &tools),
            ],
        );
        debug!("Prompt: {} chars", prompt.len());
        prompt
    }
}

/// Human- and model-readable tool declarations.
pub fn render_tools(catalog: &[&ToolSpec]) -> String {
    if catalog.is_empty() {
        return "(no tools available)".into();
    }

    let mut out = String::new();
    for spec in catalog {
        let _ = writeln!(out, "- {}: {}", spec.identifier(), spec.description().trim());
        for param in spec.parameters() {
            let mut line = format!(
                "    - {} ({}, {}",
                param.name(),
                param.param_type(),
                if param.is_required() { "required" } else { "optional" }
            );
            if let Some(default) = param.default_value() {
                let _ = write!(line, ", default: {}", default);
            }
            line.push(')');
            if !param.description().is_empty() {
                let _ = write!(line, ": {}", param.description());
            }
            out.push_str(&line);
            out.push('\n');
        }
    }
    out.truncate(out.trim_end().len());
    out
}

/// Single left-to-right pass: inserted values are never re-scanned, and
/// unknown `{...}` sequences are copied through.
fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 1024);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
