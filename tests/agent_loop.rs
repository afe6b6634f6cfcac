//! End-to-end runs of the agent loop against scripted models and stub tools.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reagent::agent::{Agent, Outcome, Role, EXHAUSTED_MESSAGE};
use reagent::inference::{GenerativeModel, ModelError};
use reagent::tools::{ParamType, ParameterSpec, Tool, ToolArgs, ToolError, ToolRegistry, ToolSpec};
use reagent::types::{Generation, TokenUsage};

/// Replays canned replies in order, repeating the last one when the script
/// runs out. Records every prompt it was given.
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn answering<I>(replies: I) -> Arc<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<Generation, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.replies.lock().unwrap().pop_front();
        let reply = match next {
            Some(reply) => {
                *self.last.lock().unwrap() = Some(reply.clone());
                reply
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err("script is empty".into())),
        };
        match reply {
            Ok(content) => Ok(Generation {
                content,
                usage: Some(TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                latency: None,
            }),
            Err(msg) => Err(ModelError::Other(msg)),
        }
    }
}

/// A search stub that returns a fixed result and counts invocations.
struct StubSearch {
    spec: ToolSpec,
    output: Result<String, String>,
    calls: AtomicUsize,
}

impl StubSearch {
    fn returning(output: &str) -> Arc<Self> {
        Self::build(Ok(output.to_string()))
    }

    fn failing(message: &str) -> Arc<Self> {
        Self::build(Err(message.to_string()))
    }

    fn build(output: Result<String, String>) -> Arc<Self> {
        let spec = ToolSpec::new(
            "SEARCH",
            "Search for facts.",
            vec![ParameterSpec::required("query", ParamType::String, "Search terms.")],
        )
        .unwrap();
        Arc::new(Self {
            spec,
            output,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for StubSearch {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        args.str("query")?;
        self.output.clone().map_err(ToolError::Failed)
    }
}

/// Takes a single integer; counts invocations.
struct Counter {
    spec: ToolSpec,
    calls: AtomicUsize,
}

impl Counter {
    fn new() -> Arc<Self> {
        let spec = ToolSpec::new(
            "COUNT",
            "Counts to n.",
            vec![ParameterSpec::required("n", ParamType::Integer, "Upper bound.")],
        )
        .unwrap();
        Arc::new(Self {
            spec,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Tool for Counter {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("counted to {}", args.int("n")?))
    }
}

fn answer(thought: &str, text: &str) -> String {
    format!(
        "<response><thought>{}</thought><answer>{}</answer></response>",
        thought, text
    )
}

fn action(tool: &str, name: &str, value: &str) -> String {
    format!(
        "<response><thought>I should look this up.</thought><action>\
         <tool_name>{}</tool_name><reason>Need a fact.</reason>\
         <parameters><parameter><name>{}</name><value>{}</value></parameter></parameters>\
         </action></response>",
        tool, name, value
    )
}

fn registry_with(tool: Arc<dyn Tool>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(tool);
    registry
}

#[tokio::test]
async fn answers_directly_in_one_iteration() {
    let model = ScriptedModel::answering([answer("I know this.", "The capital of France is Paris.")]);
    let agent = Agent::new(model.clone(), ToolRegistry::new());

    let report = agent.run("What is the capital of France?").await;

    assert_eq!(
        report.outcome,
        Outcome::Answered("The capital of France is Paris.".into())
    );
    assert_eq!(report.iterations, 1);
    assert_eq!(report.model_calls, 1);
    assert_eq!(model.calls(), 1);
    assert_eq!(report.usage.total_tokens, 15);
    assert_eq!(
        report.transcript.shape(),
        vec![Role::User, Role::Assistant, Role::Assistant]
    );
    let entries = report.transcript.entries();
    assert_eq!(entries[0].content, "Query: What is the capital of France?");
    assert!(entries[1].content.starts_with("Thought: "));
    assert_eq!(entries[2].content, "Answer: The capital of France is Paris.");
}

#[tokio::test]
async fn tool_observation_feeds_the_next_prompt() {
    let search = StubSearch::returning("A born 1990");
    let model = ScriptedModel::answering([
        action("SEARCH", "query", "A birth date"),
        answer("A was born in 1990.", "A was born in 1990."),
    ]);
    let agent = Agent::new(model.clone(), registry_with(search.clone()));

    let report = agent.run("When was A born?").await;

    assert_eq!(report.outcome.text(), "A was born in 1990.");
    assert_eq!(report.iterations, 2);
    assert_eq!(search.calls(), 1);
    assert_eq!(
        report.transcript.shape(),
        vec![
            Role::User,
            Role::Assistant,
            Role::System,
            Role::Assistant,
            Role::Assistant
        ]
    );
    assert_eq!(
        report.transcript.entries()[2].content,
        "Observation from SEARCH: A born 1990"
    );

    let prompts = model.prompts.lock().unwrap();
    assert!(prompts[1].contains("Observation from SEARCH: A born 1990"));
    assert!(prompts[1].contains("Current iteration: 2"));
}

#[tokio::test]
async fn tool_names_resolve_case_insensitively() {
    let search = StubSearch::returning("hit");
    let model = ScriptedModel::answering([
        action("search", "query", "x"),
        answer("done", "ok"),
    ]);
    let agent = Agent::new(model, registry_with(search.clone()));

    let report = agent.run("q").await;

    assert!(report.outcome.is_answered());
    assert_eq!(search.calls(), 1);
    assert_eq!(
        report.transcript.entries()[2].content,
        "Observation from SEARCH: hit"
    );
}

#[tokio::test]
async fn malformed_output_costs_an_iteration_then_recovers() {
    let model = ScriptedModel::answering(["this is not xml at all".to_string(), answer("ok", "42")]);
    let agent = Agent::new(model, ToolRegistry::new());

    let report = agent.run("Meaning of life?").await;

    assert_eq!(report.outcome, Outcome::Answered("42".into()));
    assert_eq!(report.iterations, 2);
    let error = &report.transcript.entries()[2];
    assert_eq!(error.role, Role::System);
    assert!(error.content.starts_with("Error: invalid response:"));
}

#[tokio::test]
async fn exhausts_budget_on_unknown_tool() {
    let model = ScriptedModel::answering([action("TELEPORT", "where", "Mars")]);
    let agent = Agent::new(model.clone(), ToolRegistry::new()).with_max_iterations(3);

    let report = agent.run("Go to Mars").await;

    assert_eq!(report.outcome, Outcome::Exhausted);
    assert_eq!(report.outcome.text(), EXHAUSTED_MESSAGE);
    assert_eq!(report.iterations, 3);
    assert_eq!(report.model_calls, 3);
    assert!(model.calls() <= 3);
    assert!(report
        .transcript
        .entries()
        .iter()
        .filter(|e| e.role == Role::System)
        .all(|e| e.content.contains("TELEPORT")));
}

#[tokio::test]
async fn zero_budget_never_calls_the_model() {
    let model = ScriptedModel::answering([answer("t", "never")]);
    let agent = Agent::new(model.clone(), ToolRegistry::new()).with_max_iterations(0);

    let outcome = agent.execute("anything").await;

    assert_eq!(outcome, Outcome::Exhausted);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn runs_are_independent_and_repeatable() {
    let script = [
        action("SEARCH", "query", "A birth date"),
        answer("done", "1990"),
    ];
    let first_model = ScriptedModel::answering(script.clone());
    let second_model = ScriptedModel::answering(script);
    let first = Agent::new(
        first_model,
        registry_with(StubSearch::returning("A born 1990")),
    );
    let second = Agent::new(
        second_model,
        registry_with(StubSearch::returning("A born 1990")),
    );

    let a = first.run("When was A born?").await;
    let b = second.run("When was A born?").await;

    assert_eq!(a.outcome, b.outcome);
    assert_eq!(a.transcript.shape(), b.transcript.shape());
    assert_ne!(a.run_id, b.run_id);
}

#[tokio::test]
async fn same_agent_starts_each_run_fresh() {
    let model = ScriptedModel::answering([answer("t", "first"), answer("t", "second")]);
    let agent = Agent::new(model, ToolRegistry::new());

    let a = agent.run("one").await;
    let b = agent.run("two").await;

    assert_eq!(a.transcript.len(), 3);
    assert_eq!(b.transcript.len(), 3);
    assert_eq!(b.transcript.entries()[0].content, "Query: two");
    assert_eq!(b.outcome.text(), "second");
}

#[tokio::test]
async fn invalid_argument_never_reaches_the_tool() {
    let counter = Counter::new();
    let model = ScriptedModel::answering([action("COUNT", "n", "abc"), answer("gave up", "n/a")]);
    let agent = Agent::new(model, registry_with(counter.clone()));

    let report = agent.run("Count to abc").await;

    assert!(report.outcome.is_answered());
    assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    let error = &report.transcript.entries()[2];
    assert_eq!(error.role, Role::System);
    assert!(error.content.starts_with("Error: "));
    assert!(error.content.contains("COUNT"));
    assert!(error.content.contains("'n'"));
}

#[tokio::test]
async fn coerced_argument_reaches_the_tool() {
    let counter = Counter::new();
    let model = ScriptedModel::answering([action("COUNT", "n", " 42 "), answer("done", "42")]);
    let agent = Agent::new(model, registry_with(counter.clone()));

    let report = agent.run("Count to 42").await;

    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        report.transcript.entries()[2].content,
        "Observation from COUNT: counted to 42"
    );
}

#[tokio::test]
async fn model_error_consumes_an_iteration() {
    let model = ScriptedModel::new(vec![
        Err("connection refused".into()),
        Ok(answer("back online", "Paris")),
    ]);
    let agent = Agent::new(model, ToolRegistry::new());

    let report = agent.run("Capital of France?").await;

    assert_eq!(report.outcome.text(), "Paris");
    assert_eq!(report.iterations, 2);
    assert_eq!(report.model_calls, 2);
    assert_eq!(
        report.transcript.entries()[1].content,
        "Error: model call failed: connection refused"
    );
}

#[tokio::test]
async fn tool_failure_becomes_an_observation() {
    let search = StubSearch::failing("service unavailable");
    let model = ScriptedModel::answering([
        action("SEARCH", "query", "x"),
        answer("search is down", "unknown"),
    ]);
    let agent = Agent::new(model, registry_with(search));

    let report = agent.run("q").await;

    assert!(report.outcome.is_answered());
    let observation = &report.transcript.entries()[2];
    assert_eq!(observation.role, Role::System);
    assert_eq!(
        observation.content,
        "Observation from SEARCH: Error: service unavailable"
    );
}

#[tokio::test]
async fn report_saves_as_json() {
    let model = ScriptedModel::answering([answer("t", "Paris")]);
    let agent = Agent::new(model, ToolRegistry::new());
    let report = agent.run("Capital of France?").await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs").join(format!("{}.json", report.run_id));
    report.save_json(&path).unwrap();

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["outcome"]["status"], "answered");
    assert_eq!(saved["outcome"]["answer"], "Paris");
    assert_eq!(saved["transcript"]["entries"][0]["role"], "user");
    assert_eq!(saved["iterations"], 1);
}
