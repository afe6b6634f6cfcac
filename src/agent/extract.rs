//! Turns raw model text into a typed [`Decision`].
//!
//! Model output is untrusted: it may be wrapped in code fences, be invalid
//! XML, miss fields, or name tools that do not exist. Every one of those cases
//! comes back as an [`ExtractionError`] the loop can feed back to the model.

use std::collections::BTreeMap;

use roxmltree::{Document, Node};
use thiserror::Error;
use tracing::debug;

use crate::tools::ToolRegistry;

/// What the model decided to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Action(Action),
    FinalAnswer { thought: String, text: String },
}

/// A request to invoke a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Identifier as declared by the resolved tool.
    pub tool_id: String,
    pub rationale: String,
    pub thought: String,
    /// Raw, not yet validated parameter values.
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("root element must be <response>, found <{0}>")]
    UnexpectedRoot(String),

    #[error("response must contain a non-empty <thought>")]
    MissingThought,

    #[error("response must contain exactly one <action> or <answer>, not several")]
    Ambiguous,

    #[error("<{0}> appears more than once; give it exactly once")]
    Repeated(String),

    #[error("response must contain either <action> or <answer>")]
    MissingDecision,

    #[error("<answer> must contain text")]
    EmptyAnswer,

    #[error("invalid <action>: {0}")]
    InvalidAction(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

impl ExtractionError {
    /// Short category: `malformed` for unparsable text, `invalid` otherwise.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            _ => "invalid",
        }
    }
}

/// Parses and validates model responses against the registered tools.
pub struct ResponseExtractor<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> ResponseExtractor<'a> {
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn extract(&self, raw: &str) -> Result<Decision, ExtractionError> {
        let body = strip_fences(raw);
        let doc = Document::parse(body).map_err(|e| {
            debug!("Unparsable response: {}", body.replace('\n', "\\n"));
            ExtractionError::Malformed(e.to_string())
        })?;

        let root = doc.root_element();
        if !root.has_tag_name("response") {
            return Err(ExtractionError::UnexpectedRoot(
                root.tag_name().name().to_string(),
            ));
        }

        let thought = single(root, "thought")?
            .map(text_of)
            .filter(|t| !t.is_empty())
            .ok_or(ExtractionError::MissingThought)?;

        let mut actions = root.children().filter(|n| n.has_tag_name("action"));
        let mut answers = root.children().filter(|n| n.has_tag_name("answer"));
        let decision = (actions.next(), answers.next());
        if actions.next().is_some() || answers.next().is_some() {
            return Err(ExtractionError::Ambiguous);
        }

        match decision {
            (Some(_), Some(_)) => Err(ExtractionError::Ambiguous),
            (None, None) => Err(ExtractionError::MissingDecision),
            (None, Some(answer)) => {
                let text = text_of(answer);
                if text.is_empty() {
                    return Err(ExtractionError::EmptyAnswer);
                }
                Ok(Decision::FinalAnswer { thought, text })
            }
            (Some(action), None) => self.action(action, thought).map(Decision::Action),
        }
    }

    fn action(&self, node: Node, thought: String) -> Result<Action, ExtractionError> {
        let tool_name = single(node, "tool_name")?
            .map(text_of)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExtractionError::InvalidAction("missing <tool_name>".into()))?;
        let rationale = single(node, "reason")?
            .map(text_of)
            .ok_or_else(|| ExtractionError::InvalidAction("missing <reason>".into()))?;

        let tool = self
            .registry
            .resolve(&tool_name)
            .map_err(|_| ExtractionError::UnknownTool(tool_name.clone()))?;
        let spec = tool.spec();

        let parameters = match (single(node, "parameters")?, single(node, "input")?) {
            (Some(_), Some(_)) => {
                return Err(ExtractionError::InvalidAction(
                    "give either <parameters> or <input>, not both".into(),
                ))
            }
            (Some(list), None) => parameter_list(list)?,
            (None, Some(input)) => {
                // Shorthand: a bare input fills the tool's first declared parameter.
                let first = spec.parameters().first().ok_or_else(|| {
                    ExtractionError::InvalidAction(format!(
                        "{} takes no parameters but <input> was given",
                        spec.identifier()
                    ))
                })?;
                BTreeMap::from([(first.name().to_string(), text_of(input))])
            }
            (None, None) => BTreeMap::new(),
        };

        Ok(Action {
            tool_id: spec.identifier().to_string(),
            rationale,
            thought,
            parameters,
        })
    }
}

fn parameter_list(list: Node) -> Result<BTreeMap<String, String>, ExtractionError> {
    let mut parameters = BTreeMap::new();
    for param in list.children().filter(|n| n.is_element()) {
        if !param.has_tag_name("parameter") {
            return Err(ExtractionError::InvalidAction(format!(
                "unexpected <{}> inside <parameters>",
                param.tag_name().name()
            )));
        }
        let name = single(param, "name")?
            .map(text_of)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ExtractionError::InvalidAction("parameter without <name>".into()))?;
        let value = single(param, "value")?.map(text_of).ok_or_else(|| {
            ExtractionError::InvalidAction(format!("parameter '{}' without <value>", name))
        })?;
        if parameters.insert(name.clone(), value).is_some() {
            return Err(ExtractionError::InvalidAction(format!(
                "parameter '{}' given more than once",
                name
            )));
        }
    }
    Ok(parameters)
}

/// The first fenced block anywhere in `raw` without its language label, or
/// the whole trimmed text when there is no fence.
fn strip_fences(raw: &str) -> &str {
    let Some(open) = raw.find("```") else {
        return raw.trim();
    };
    let after = &raw[open + 3..];
    // The label (`xml`, or nothing) runs up to the first tag or line break.
    let label_end = after
        .find(|c: char| c == '<' || c == '\n')
        .unwrap_or(after.len());
    let body = &after[label_end..];
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim()
}

/// The only `tag` child of `node`, if there is one.
fn single<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
) -> Result<Option<Node<'a, 'input>>, ExtractionError> {
    let mut found = node.children().filter(|n| n.has_tag_name(tag));
    let first = found.next();
    if found.next().is_some() {
        return Err(ExtractionError::Repeated(tag.to_string()));
    }
    Ok(first)
}

/// All descendant text (CDATA included), trimmed.
fn text_of(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParamType, ParameterSpec, Tool, ToolArgs, ToolError, ToolSpec};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Named(ToolSpec);

    #[async_trait]
    impl Tool for Named {
        fn spec(&self) -> &ToolSpec {
            &self.0
        }

        async fn execute(&self, _args: &ToolArgs) -> Result<String, ToolError> {
            Ok(String::new())
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Named(
            ToolSpec::new(
                "SEARCH",
                "Search",
                vec![
                    ParameterSpec::required("query", ParamType::String, ""),
                    ParameterSpec::optional("max_results", ParamType::Integer, ""),
                ],
            )
            .unwrap(),
        )));
        registry.register(Arc::new(Named(ToolSpec::new("CLOCK", "Time", vec![]).unwrap())));
        registry
    }

    fn extract(raw: &str) -> Result<Decision, ExtractionError> {
        let registry = registry();
        ResponseExtractor::new(&registry).extract(raw)
    }

    #[test]
    fn parses_action_with_structured_parameters() {
        let decision = extract(
            r#"<response>
                <thought>I need A's birth date.</thought>
                <action>
                    <tool_name>search</tool_name>
                    <reason>Look it up</reason>
                    <parameters>
                        <parameter><name>query</name><value>A birth date</value></parameter>
                        <parameter><name>max_results</name><value> 3 </value></parameter>
                    </parameters>
                </action>
            </response>"#,
        )
        .unwrap();

        match decision {
            Decision::Action(action) => {
                assert_eq!(action.tool_id, "SEARCH");
                assert_eq!(action.rationale, "Look it up");
                assert_eq!(action.thought, "I need A's birth date.");
                assert_eq!(action.parameters["query"], "A birth date");
                assert_eq!(action.parameters["max_results"], "3");
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn tool_name_matches_case_insensitively() {
        for name in ["SEARCH", "search", "Search", " sEARCh "] {
            let raw = format!(
                "<response><thought>t</thought><action><tool_name>{name}</tool_name>\
                 <reason>r</reason></action></response>"
            );
            match extract(&raw).unwrap() {
                Decision::Action(action) => assert_eq!(action.tool_id, "SEARCH"),
                other => panic!("expected action, got {other:?}"),
            }
        }
    }

    #[test]
    fn strips_code_fences() {
        let raw = "  ```xml\n<response>\n<thought>Known fact.</thought>\n<answer>The capital of France is Paris.</answer>\n</response>\n```  \n";
        assert_eq!(
            extract(raw).unwrap(),
            Decision::FinalAnswer {
                thought: "Known fact.".into(),
                text: "The capital of France is Paris.".into()
            }
        );

        let bare = "```\n<response><thought>t</thought><answer>a</answer></response>```";
        assert!(matches!(extract(bare), Ok(Decision::FinalAnswer { .. })));
    }

    #[test]
    fn finds_fenced_block_after_leading_prose() {
        let raw = "Here is my response:\n```xml\n<response><thought>t</thought><answer>Paris</answer></response>\n```\nHope that helps.";
        assert_eq!(
            extract(raw).unwrap(),
            Decision::FinalAnswer {
                thought: "t".into(),
                text: "Paris".into()
            }
        );
    }

    #[test]
    fn single_line_fence_with_label_is_accepted() {
        let raw = "```xml<response><thought>t</thought><answer>Paris</answer></response>```";
        assert!(matches!(
            extract(raw),
            Ok(Decision::FinalAnswer { ref text, .. }) if text == "Paris"
        ));
    }

    #[test]
    fn unclosed_fence_uses_the_rest_of_the_text() {
        let raw = "```xml\n<response><thought>t</thought><answer>a</answer></response>";
        assert!(matches!(extract(raw), Ok(Decision::FinalAnswer { .. })));
    }

    #[test]
    fn flat_input_fills_first_parameter() {
        let decision = extract(
            "<response><thought>t</thought><action><tool_name>SEARCH</tool_name>\
             <reason>r</reason><input>rust borrow checker</input></action></response>",
        )
        .unwrap();
        match decision {
            Decision::Action(action) => {
                assert_eq!(action.parameters.len(), 1);
                assert_eq!(action.parameters["query"], "rust borrow checker");
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn flat_input_for_parameterless_tool_is_invalid() {
        let err = extract(
            "<response><thought>t</thought><action><tool_name>CLOCK</tool_name>\
             <reason>r</reason><input>now</input></action></response>",
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidAction(_)));
    }

    #[test]
    fn input_and_parameters_together_are_invalid() {
        let err = extract(
            "<response><thought>t</thought><action><tool_name>SEARCH</tool_name>\
             <reason>r</reason><input>x</input><parameters/></action></response>",
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidAction(_)));
    }

    #[test]
    fn action_and_answer_together_are_ambiguous() {
        let err = extract(
            "<response><thought>t</thought>\
             <action><tool_name>SEARCH</tool_name><reason>r</reason></action>\
             <answer>Paris</answer></response>",
        )
        .unwrap_err();
        assert_eq!(err, ExtractionError::Ambiguous);
        assert_eq!(err.reason(), "invalid");
    }

    #[test]
    fn repeated_action_is_ambiguous() {
        let err = extract(
            "<response><thought>t</thought>\
             <action><tool_name>SEARCH</tool_name><reason>r</reason><input>a</input></action>\
             <action><tool_name>CLOCK</tool_name><reason>r</reason></action>\
             </response>",
        )
        .unwrap_err();
        assert_eq!(err, ExtractionError::Ambiguous);
    }

    #[test]
    fn repeated_answer_is_ambiguous() {
        let err = extract(
            "<response><thought>t</thought><answer>A</answer><answer>B</answer></response>",
        )
        .unwrap_err();
        assert_eq!(err, ExtractionError::Ambiguous);
    }

    #[test]
    fn repeated_fields_are_rejected() {
        let cases = [
            (
                "<response><thought>a</thought><thought>b</thought><answer>x</answer></response>",
                "thought",
            ),
            (
                "<response><thought>t</thought><action><tool_name>SEARCH</tool_name>\
                 <tool_name>CLOCK</tool_name><reason>r</reason></action></response>",
                "tool_name",
            ),
            (
                "<response><thought>t</thought><action><tool_name>SEARCH</tool_name>\
                 <reason>r</reason><input>a</input><input>b</input></action></response>",
                "input",
            ),
            (
                "<response><thought>t</thought><action><tool_name>SEARCH</tool_name>\
                 <reason>r</reason><parameters/><parameters/></action></response>",
                "parameters",
            ),
            (
                "<response><thought>t</thought><action><tool_name>SEARCH</tool_name>\
                 <reason>r</reason><parameters><parameter><name>query</name>\
                 <value>a</value><value>b</value></parameter></parameters></action></response>",
                "value",
            ),
        ];
        for (raw, tag) in cases {
            assert_eq!(
                extract(raw).unwrap_err(),
                ExtractionError::Repeated(tag.into()),
                "input: {raw:?}"
            );
        }
    }

    #[test]
    fn missing_thought_is_rejected() {
        for raw in [
            "<response><answer>Paris</answer></response>",
            "<response><thought>   </thought><answer>Paris</answer></response>",
            "<response><action><tool_name>SEARCH</tool_name><reason>r</reason></action></response>",
        ] {
            assert_eq!(extract(raw).unwrap_err(), ExtractionError::MissingThought);
        }
    }

    #[test]
    fn neither_action_nor_answer_is_rejected() {
        assert_eq!(
            extract("<response><thought>hmm</thought></response>").unwrap_err(),
            ExtractionError::MissingDecision
        );
    }

    #[test]
    fn empty_answer_is_rejected() {
        assert_eq!(
            extract("<response><thought>t</thought><answer> </answer></response>").unwrap_err(),
            ExtractionError::EmptyAnswer
        );
    }

    #[test]
    fn unknown_tool_is_a_validation_failure() {
        let err = extract(
            "<response><thought>t</thought><action><tool_name>TELEPORT</tool_name>\
             <reason>r</reason></action></response>",
        )
        .unwrap_err();
        assert_eq!(err, ExtractionError::UnknownTool("TELEPORT".into()));
    }

    #[test]
    fn action_requires_tool_name_and_reason() {
        let err = extract(
            "<response><thought>t</thought><action><reason>r</reason></action></response>",
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidAction(_)));

        let err = extract(
            "<response><thought>t</thought><action><tool_name>SEARCH</tool_name></action></response>",
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidAction(_)));
    }

    #[test]
    fn duplicate_parameter_is_rejected() {
        let err = extract(
            "<response><thought>t</thought><action><tool_name>SEARCH</tool_name><reason>r</reason>\
             <parameters>\
               <parameter><name>query</name><value>a</value></parameter>\
               <parameter><name>query</name><value>b</value></parameter>\
             </parameters></action></response>",
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidAction(_)));
    }

    #[test]
    fn malformed_text_never_panics() {
        for raw in [
            "",
            "I think the answer is Paris.",
            "<response><thought>unclosed",
            "<response><thought>t</thought><answer>A & B</answer></response>",
            "```xml\n```",
        ] {
            let err = extract(raw).unwrap_err();
            assert_eq!(err.reason(), "malformed", "input: {raw:?}");
        }
    }

    #[test]
    fn wrong_root_is_rejected() {
        assert_eq!(
            extract("<reply><thought>t</thought><answer>a</answer></reply>").unwrap_err(),
            ExtractionError::UnexpectedRoot("reply".into())
        );
    }

    #[test]
    fn cdata_and_escaped_text_are_read() {
        let decision = extract(
            "<response><thought>t</thought><answer><![CDATA[Use a < b]]> &amp; more</answer></response>",
        )
        .unwrap();
        assert_eq!(
            decision,
            Decision::FinalAnswer {
                thought: "t".into(),
                text: "Use a < b & more".into()
            }
        );
    }
}
