//! Core ReAct agent loop: Think → Decide → Act → Observe.
//!
//! Each call to [`Agent::run`] owns a fresh [`ExecutionState`]:
//! 1. Records the query
//! 2. Builds a prompt and calls the model
//! 3. Extracts a decision from the raw text
//! 4. Either runs the chosen tool and records the observation, or stops with
//!    the final answer
//! 5. Repeats until answered or the iteration budget is spent
//!
//! Nothing inside the loop escapes as an error: bad model output, unknown
//! tools, invalid parameters, tool failures and model failures all become
//! transcript entries.

use crate::agent::extract::{Action, Decision, ResponseExtractor};
use crate::agent::prompt::PromptBuilder;
use crate::agent::transcript::{Role, Transcript};
use crate::inference::GenerativeModel;
use crate::tools::ToolRegistry;
use crate::types::TokenUsage;
use anyhow::Context;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Returned when no answer was produced within the iteration budget.
pub const EXHAUSTED_MESSAGE: &str = "Unable to provide an answer after maximum iterations.";

/// Default think/act budget.
pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "answer", rename_all = "snake_case")]
pub enum Outcome {
    /// The model produced a final answer.
    Answered(String),
    /// The budget ran out first.
    Exhausted,
}

impl Outcome {
    pub fn is_answered(&self) -> bool {
        matches!(self, Self::Answered(_))
    }

    /// The answer, or the fixed exhaustion message.
    pub fn text(&self) -> &str {
        match self {
            Self::Answered(text) => text,
            Self::Exhausted => EXHAUSTED_MESSAGE,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Mutable state of a single `run`. Never shared between runs.
#[derive(Debug)]
pub struct ExecutionState {
    pub query: String,
    pub transcript: Transcript,
    pub iteration: u32,
    pub max_iterations: u32,
    pub model_calls: u32,
    pub usage: TokenUsage,
}

impl ExecutionState {
    fn new(query: &str, max_iterations: u32) -> Self {
        let mut transcript = Transcript::new();
        transcript.append(Role::User, format!("Query: {}", query));
        Self {
            query: query.to_string(),
            transcript,
            iteration: 0,
            max_iterations,
            model_calls: 0,
            usage: TokenUsage::default(),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub run_id: String,
    pub outcome: Outcome,
    pub transcript: Transcript,
    /// Iterations consumed, counting recoverable failures.
    pub iterations: u32,
    pub model_calls: u32,
    pub usage: TokenUsage,
}

impl ExecutionReport {
    /// Write the report, transcript included, as pretty JSON.
    pub fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run report to {}", path.display()))?;
        Ok(())
    }
}

/// Loop states.
enum Step {
    Thinking,
    Deciding(String),
    Acting(Action),
    Answered(String),
    Exhausted,
}

/// The execution controller.
pub struct Agent {
    model: Arc<dyn GenerativeModel>,
    registry: ToolRegistry,
    prompt: PromptBuilder,
    max_iterations: u32,
}

impl Agent {
    pub fn new(model: Arc<dyn GenerativeModel>, registry: ToolRegistry) -> Self {
        Self {
            model,
            registry,
            prompt: PromptBuilder::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_prompt_builder(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Answer `query`, or report that the budget ran out.
    pub async fn execute(&self, query: &str) -> Outcome {
        self.run(query).await.outcome
    }

    /// Answer `query` and return the full report.
    pub async fn run(&self, query: &str) -> ExecutionReport {
        let run_id = ulid::Ulid::new().to_string();
        info!("[{}] Starting run (budget {}): {}", run_id, self.max_iterations, query);

        let mut state = ExecutionState::new(query, self.max_iterations);
        let mut step = Step::Thinking;

        let outcome = loop {
            step = match step {
                Step::Thinking => self.think(&mut state).await,
                Step::Deciding(raw) => self.decide(&mut state, &raw),
                Step::Acting(action) => self.act(&mut state, action).await,
                Step::Answered(text) => break Outcome::Answered(text),
                Step::Exhausted => break Outcome::Exhausted,
            };
        };

        match &outcome {
            Outcome::Answered(_) => info!(
                "[{}] Answered after {} iterations ({} model calls)",
                run_id, state.iteration, state.model_calls
            ),
            Outcome::Exhausted => warn!(
                "[{}] Budget of {} iterations exhausted without an answer",
                run_id, state.max_iterations
            ),
        }

        ExecutionReport {
            run_id,
            outcome,
            // Exhaustion is detected one increment past the budget.
            iterations: state.iteration.min(state.max_iterations),
            model_calls: state.model_calls,
            usage: state.usage,
            transcript: state.transcript,
        }
    }

    async fn think(&self, state: &mut ExecutionState) -> Step {
        state.iteration += 1;
        if state.iteration > state.max_iterations {
            warn!("Reached maximum iterations ({}). Stopping.", state.max_iterations);
            return Step::Exhausted;
        }

        let prompt = self.prompt.build(
            &state.query,
            &state.transcript,
            state.iteration,
            state.max_iterations,
            &self.registry.catalog(),
        );

        info!("[Iteration {}/{}] Thinking", state.iteration, state.max_iterations);
        state.model_calls += 1;
        match self.model.generate(&prompt).await {
            Ok(generation) => {
                if let Some(usage) = &generation.usage {
                    state.usage.accumulate(usage);
                }
                state
                    .transcript
                    .append(Role::Assistant, format!("Thought: {}", generation.content));
                Step::Deciding(generation.content)
            }
            Err(e) => {
                error!("[Iteration {}] Model call failed: {}", state.iteration, e);
                state
                    .transcript
                    .append(Role::System, format!("Error: model call failed: {}", e));
                Step::Thinking
            }
        }
    }

    fn decide(&self, state: &mut ExecutionState, raw: &str) -> Step {
        match ResponseExtractor::new(&self.registry).extract(raw) {
            Ok(Decision::FinalAnswer { text, .. }) => {
                info!("[Iteration {}] Answering directly", state.iteration);
                state
                    .transcript
                    .append(Role::Assistant, format!("Answer: {}", text));
                Step::Answered(text)
            }
            Ok(Decision::Action(action)) => {
                info!(
                    "[Iteration {}] Tool: {} ({})",
                    state.iteration, action.tool_id, action.rationale
                );
                Step::Acting(action)
            }
            Err(e) => {
                warn!("[Iteration {}] Rejected response ({}): {}", state.iteration, e.reason(), e);
                state
                    .transcript
                    .append(Role::System, format!("Error: invalid response: {}", e));
                Step::Thinking
            }
        }
    }

    async fn act(&self, state: &mut ExecutionState, action: Action) -> Step {
        let tool = match self.registry.resolve(&action.tool_id) {
            Ok(tool) => tool,
            Err(e) => {
                warn!("[Iteration {}] {}", state.iteration, e);
                state.transcript.append(Role::System, format!("Error: {}", e));
                return Step::Thinking;
            }
        };

        let args = match self
            .registry
            .validate_and_coerce(tool.spec(), &action.parameters)
        {
            Ok(args) => args,
            Err(e) => {
                warn!("[Iteration {}] {}", state.iteration, e);
                state.transcript.append(Role::System, format!("Error: {}", e));
                return Step::Thinking;
            }
        };

        let observation = match tool.execute(&args).await {
            Ok(output) => {
                info!(
                    "[Iteration {}] {} returned {} chars",
                    state.iteration,
                    action.tool_id,
                    output.len()
                );
                format!("Observation from {}: {}", action.tool_id, output)
            }
            Err(e) => {
                warn!("[Iteration {}] {} failed: {}", state.iteration, action.tool_id, e);
                format!("Observation from {}: Error: {}", action.tool_id, e)
            }
        };
        state.transcript.append(Role::System, observation);
        Step::Thinking
    }
}
