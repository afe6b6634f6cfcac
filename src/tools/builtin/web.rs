//! Web tools: `DUCKDUCKGO_SEARCH`, `WIKIPEDIA` and `READ_WEBPAGE`.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::tools::spec::{ParamType, ParamValue, ParameterSpec, SpecError, ToolArgs, ToolSpec};
use crate::tools::traits::{Tool, ToolError};

pub const DUCKDUCKGO_API_URL: &str = "https://api.duckduckgo.com";
pub const WIKIPEDIA_API_URL: &str = "https://en.wikipedia.org";

// -- DuckDuckGo instant answer payload ---------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InstantAnswer {
    heading: String,
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    answer: String,
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Entry {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL", default)]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

fn flatten_topics<'a>(topics: &'a [RelatedTopic], out: &mut Vec<(&'a str, &'a str)>) {
    for topic in topics {
        match topic {
            RelatedTopic::Entry { text, first_url } => out.push((text.as_str(), first_url.as_str())),
            RelatedTopic::Group { topics } => flatten_topics(topics, out),
        }
    }
}

pub struct DuckDuckGoSearchTool {
    spec: ToolSpec,
    http: reqwest::Client,
    base_url: String,
}

impl DuckDuckGoSearchTool {
    pub fn new(http: reqwest::Client) -> Result<Self, SpecError> {
        Self::with_base_url(http, DUCKDUCKGO_API_URL)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: &str) -> Result<Self, SpecError> {
        let spec = ToolSpec::new(
            "DUCKDUCKGO_SEARCH",
            "Search DuckDuckGo for a query and return the instant answer, abstract and related results. \
             Use this when you need current information or web content.",
            vec![
                ParameterSpec::required("query", ParamType::String, "The search terms."),
                ParameterSpec::optional("max_results", ParamType::Integer, "Maximum related results to list.")
                    .with_default(ParamValue::Integer(5)),
            ],
        )?;
        Ok(Self {
            spec,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Tool for DuckDuckGoSearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let query = args.str("query")?;
        if query.trim().is_empty() {
            return Err(ToolError::InvalidInput("query cannot be empty".into()));
        }
        let max_results = args.int("max_results")?;
        if max_results <= 0 {
            return Err(ToolError::InvalidInput("max_results must be a positive integer".into()));
        }

        debug!("DuckDuckGo search: {}", query);
        let resp = self
            .http
            .get(format!("{}/", self.base_url))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?
            .error_for_status()?;

        // The API labels its JSON as javascript, so decode from text.
        let body = resp.text().await?;
        let answer: InstantAnswer = serde_json::from_str(&body)
            .map_err(|e| ToolError::Failed(format!("unreadable search response: {}", e)))?;

        let mut lines = Vec::new();
        if !answer.answer.is_empty() {
            lines.push(format!("Answer: {}", answer.answer));
        }
        if !answer.abstract_text.is_empty() {
            lines.push(format!(
                "{}: {}\n   URL: {}",
                if answer.heading.is_empty() { query } else { answer.heading.as_str() },
                answer.abstract_text,
                answer.abstract_url
            ));
        }

        let mut related = Vec::new();
        flatten_topics(&answer.related_topics, &mut related);
        for (idx, (text, url)) in related.iter().take(max_results as usize).enumerate() {
            lines.push(format!("{}. {}\n   URL: {}", idx + 1, text, url));
        }

        if lines.is_empty() {
            return Ok(format!("No results found for '{}'", query));
        }

        info!("Search returned {} lines for '{}'", lines.len(), query);
        Ok(lines.join("\n"))
    }
}

// -- Wikipedia page summary --------------------------------------------------

#[derive(Debug, Deserialize)]
struct PageSummary {
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: PageUrl,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: String,
}

pub struct WikipediaTool {
    spec: ToolSpec,
    http: reqwest::Client,
    base_url: String,
}

impl WikipediaTool {
    pub fn new(http: reqwest::Client) -> Result<Self, SpecError> {
        Self::with_base_url(http, WIKIPEDIA_API_URL)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: &str) -> Result<Self, SpecError> {
        let spec = ToolSpec::new(
            "WIKIPEDIA",
            "Fetch the summary of the English Wikipedia article with the given title.",
            vec![ParameterSpec::required(
                "query",
                ParamType::String,
                "Article title, e.g. 'Alan Turing'.",
            )],
        )?;
        Ok(Self {
            spec,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let query = args.str("query")?.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("query cannot be empty".into()));
        }

        let title = query.replace(' ', "_");
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ToolError::Failed(format!("bad Wikipedia URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ToolError::Failed("Wikipedia URL cannot take a path".into()))?
            .pop_if_empty()
            .extend(["api", "rest_v1", "page", "summary", title.as_str()]);

        debug!("Wikipedia lookup: {}", url);
        let resp = self.http.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(format!("No Wikipedia article found for '{}'", query));
        }
        let summary: PageSummary = resp.error_for_status()?.json().await?;

        let mut out = format!("{}\n{}", summary.title, summary.extract);
        if let Some(urls) = summary.content_urls {
            out.push_str(&format!("\nURL: {}", urls.desktop.page));
        }
        Ok(out)
    }
}

// -- Page reader ---------------------------------------------------------------

/// Longest page extract handed back to the model, in characters.
const MAX_PAGE_CHARS: usize = 20_000;

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

pub struct ReadWebpageTool {
    spec: ToolSpec,
    http: reqwest::Client,
}

impl ReadWebpageTool {
    pub fn new(http: reqwest::Client) -> Result<Self, SpecError> {
        let spec = ToolSpec::new(
            "READ_WEBPAGE",
            "Fetch a web page by URL and return its readable text, its links, or its full HTML.",
            vec![
                ParameterSpec::required("url", ParamType::String, "The http(s) URL of the page."),
                ParameterSpec::optional(
                    "extract_type",
                    ParamType::String,
                    "What to return: text, links or all.",
                )
                .with_default(ParamValue::String("text".into())),
            ],
        )?;
        Ok(Self { spec, http })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extract {
    Text,
    Links,
    All,
}

impl Extract {
    fn parse(raw: &str) -> Result<Self, ToolError> {
        match raw.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "links" => Ok(Self::Links),
            "all" => Ok(Self::All),
            other => Err(ToolError::InvalidInput(format!(
                "extract_type must be one of text, links, all (got '{}')",
                other
            ))),
        }
    }
}

#[async_trait]
impl Tool for ReadWebpageTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let raw_url = args.str("url")?.trim();
        let url = reqwest::Url::parse(raw_url)
            .map_err(|e| ToolError::InvalidInput(format!("invalid URL '{}': {}", raw_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolError::InvalidInput(format!(
                "only http and https URLs can be read (got '{}')",
                url.scheme()
            )));
        }
        let extract = Extract::parse(args.str("extract_type")?)?;

        debug!("Reading page: {}", url);
        let resp = self
            .http
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await?
            .error_for_status()?;

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();
        if !content_type.contains("html") {
            warn!("Unexpected content type {} for {}", content_type, url);
            return Err(ToolError::Failed(format!(
                "unexpected content type: {}",
                content_type
            )));
        }

        let body = resp.text().await?;
        let page = render_page(&body, &url, extract)?;
        info!("Read {} ({} chars)", url, page.len());
        Ok(truncate_chars(page, MAX_PAGE_CHARS))
    }
}

/// Parse `body` and pull out what `extract` asks for. Kept synchronous: the
/// parsed document is not `Send`.
fn render_page(body: &str, base: &reqwest::Url, extract: Extract) -> Result<String, ToolError> {
    let doc = Html::parse_document(body);
    match extract {
        Extract::Text => Ok(page_text(&doc)),
        Extract::Links => page_links(&doc, base),
        Extract::All => Ok(doc.root_element().html()),
    }
}

fn page_text(doc: &Html) -> String {
    let mut words: Vec<&str> = Vec::new();
    for node in doc.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map_or(false, |e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

fn page_links(doc: &Html, base: &reqwest::Url) -> Result<String, ToolError> {
    let anchors = Selector::parse("a[href]")
        .map_err(|e| ToolError::Failed(format!("bad link selector: {}", e)))?;

    let mut lines = Vec::new();
    for anchor in doc.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let target = base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string());
        let label = anchor.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ");
        if label.is_empty() {
            lines.push(format!("- {}", target));
        } else {
            lines.push(format!("- {}: {}", label, target));
        }
    }

    if lines.is_empty() {
        Ok("No links found".into())
    } else {
        Ok(lines.join("\n"))
    }
}

fn truncate_chars(mut text: String, max: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max) {
        text.truncate(cut);
        text.push_str("\n[truncated]");
    }
    text
}
