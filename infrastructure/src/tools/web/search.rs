//! `web_search` tool: web, news and multi-query research search.
//!
//! # Providers
//!
//! | Provider | Selected when | Endpoint |
//! |----------|---------------|----------|
//! | Tavily | the env var named by `api_key_env` is set | `POST {tavily_url}/search` |
//! | DuckDuckGo | no Tavily key | Instant Answer API, no key required |
//!
//! The provider is chosen once, in `init`. Both sit behind [`SearchProvider`]
//! so the operations above them are provider-agnostic.
//!
//! # Operations
//!
//! | Operation | Tag | Notes |
//! |-----------|-----|-------|
//! | `search` | `web_search` | one provider call |
//! | `news_search` | | keeps results whose URL looks like a news outlet |
//! | `research` | | concurrent searches, merged and de-duplicated by URL |

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use suna_domain::{
    OperationSchema, ParamSpec, TagSpec, Tool, ToolContext, ToolError, ToolLifecycleError,
    ToolResult,
};
use tracing::{debug, info, warn};

pub const WEB_SEARCH: &str = "web_search";
pub const SEARCH: &str = "search";
pub const NEWS_SEARCH: &str = "news_search";
pub const RESEARCH: &str = "research";

const USER_AGENT: &str = "SunaAgent/0.1 (Agent Tool)";

/// URL fragments that mark a result as news
const NEWS_PATTERNS: &[&str] = &[
    "news",
    "reuters",
    "ap.org",
    "bbc",
    "cnn",
    "npr",
    "guardian",
    "nytimes",
    "washingtonpost",
    "wsj",
    "bloomberg",
    "techcrunch",
];

const ACADEMIC_DOMAINS: &[&str] = &["scholar.google.com", "arxiv.org", "pubmed.ncbi.nlm.nih.gov"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    /// Name of the environment variable holding the Tavily key
    pub api_key_env: String,
    pub tavily_url: String,
    pub duckduckgo_url: String,
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: "TAVILY_API_KEY".to_string(),
            tavily_url: "https://api.tavily.com".to_string(),
            duckduckgo_url: "https://api.duckduckgo.com/".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    Advanced,
}

impl SearchDepth {
    fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

/// One provider request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: usize,
    pub include_images: bool,
    pub include_answer: bool,
    pub depth: SearchDepth,
    pub include_domains: Vec<String>,
    pub exclude_domains: Vec<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            max_results,
            include_images: false,
            include_answer: false,
            depth: SearchDepth::Basic,
            include_domains: Vec::new(),
            exclude_domains: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub answer: Option<String>,
    pub results: Vec<SearchHit>,
    pub images: Vec<String>,
}

/// A search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, ToolError>;
}

fn request_error(provider: &str, err: reqwest::Error) -> ToolError {
    if err.is_timeout() {
        ToolError::timeout(format!("{provider} request timed out"))
    } else {
        ToolError::execution_failed(format!("{provider} request failed: {err}"))
    }
}

/// Tavily search API.
pub struct TavilyProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TavilyProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
    #[serde(default)]
    images: Vec<Value>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, ToolError> {
        let mut body = json!({
            "api_key": self.api_key,
            "query": query.query,
            "search_depth": query.depth.as_str(),
            "include_answer": query.include_answer,
            "include_images": query.include_images,
            "max_results": query.max_results,
        });
        if !query.include_domains.is_empty() {
            body["include_domains"] = json!(query.include_domains);
        }
        if !query.exclude_domains.is_empty() {
            body["exclude_domains"] = json!(query.exclude_domains);
        }

        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("Tavily", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::execution_failed(format!("Tavily API error: {status}")));
        }

        let parsed: TavilyResponse = response.json().await.map_err(|e| {
            ToolError::execution_failed(format!("Failed to parse search results: {e}"))
        })?;

        Ok(SearchOutcome {
            answer: parsed.answer.filter(|a| !a.is_empty()),
            results: parsed
                .results
                .into_iter()
                .map(|r| SearchHit {
                    title: r.title,
                    url: r.url,
                    content: r.content,
                    published_date: r.published_date,
                    score: r.score,
                })
                .collect(),
            images: parsed
                .images
                .into_iter()
                .filter_map(|img| match img {
                    Value::String(url) => Some(url),
                    Value::Object(map) => map.get("url").and_then(Value::as_str).map(String::from),
                    _ => None,
                })
                .collect(),
        })
    }
}

/// DuckDuckGo Instant Answer API. Returns abstracts and related topics
/// rather than full result listings.
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    url: String,
}

impl DuckDuckGoProvider {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, ToolError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("q", query.query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| request_error("DuckDuckGo", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::execution_failed(format!(
                "DuckDuckGo API error: {status}"
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            ToolError::execution_failed(format!("Failed to parse search results: {e}"))
        })?;
        Ok(instant_answer_hits(&body, query.max_results))
    }
}

/// Abstract first, then up to `max_results - 1` related topics.
fn instant_answer_hits(data: &Value, max_results: usize) -> SearchOutcome {
    let mut outcome = SearchOutcome::default();

    if let Some(abstract_text) = data["Abstract"].as_str()
        && !abstract_text.is_empty()
    {
        let heading = data["Heading"].as_str().filter(|h| !h.is_empty());
        let url = data["AbstractURL"].as_str().filter(|u| !u.is_empty());
        outcome.results.push(SearchHit {
            title: heading.unwrap_or("Summary").to_string(),
            url: url.unwrap_or("#").to_string(),
            content: abstract_text.to_string(),
            published_date: None,
            score: None,
        });
        outcome.answer = Some(abstract_text.to_string());
    }

    if let Some(topics) = data["RelatedTopics"].as_array() {
        let related = topics
            .iter()
            .take(max_results.saturating_sub(1))
            .filter_map(|topic| {
                let text = topic["Text"].as_str().filter(|t| !t.is_empty())?;
                let url = topic["FirstURL"].as_str().filter(|u| !u.is_empty())?;
                let title = text.split(" - ").next().unwrap_or("Related Topic");
                Some(SearchHit {
                    title: title.to_string(),
                    url: url.to_string(),
                    content: text.to_string(),
                    published_date: None,
                    score: None,
                })
            });
        outcome.results.extend(related);
    }

    outcome
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    max_results: usize,
    include_images: bool,
    include_answer: bool,
    search_depth: SearchDepth,
    domains: Option<Vec<String>>,
    exclude_domains: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct NewsArgs {
    query: String,
    max_results: usize,
    days: u32,
    location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ResearchDepth {
    Quick,
    Comprehensive,
}

impl ResearchDepth {
    fn as_str(&self) -> &'static str {
        match self {
            ResearchDepth::Quick => "quick",
            ResearchDepth::Comprehensive => "comprehensive",
        }
    }
}

#[derive(Deserialize)]
struct ResearchArgs {
    topic: String,
    depth: ResearchDepth,
    max_sources: usize,
    include_academic: bool,
}

pub struct WebSearchTool {
    config: WebSearchConfig,
    provider: Option<Arc<dyn SearchProvider>>,
}

impl WebSearchTool {
    pub fn new(config: WebSearchConfig) -> Self {
        Self {
            config,
            provider: None,
        }
    }

    /// Use `provider` instead of picking one from the environment.
    pub fn with_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    fn provider(&self) -> Result<&Arc<dyn SearchProvider>, ToolError> {
        self.provider
            .as_ref()
            .ok_or_else(|| ToolError::internal("web search tool used before init"))
    }

    async fn run_search(&self, query: &SearchQuery) -> Result<(SearchOutcome, &'static str), ToolError> {
        let provider = self.provider()?;
        debug!(provider = provider.name(), max_results = query.max_results, "Running web search");
        let outcome = provider.search(query).await?;
        Ok((outcome, provider.name()))
    }

    async fn search(&self, args: SearchArgs, context: Option<&ToolContext>) -> Result<Value, ToolError> {
        let start = Instant::now();
        info!(
            max_results = args.max_results,
            depth = args.search_depth.as_str(),
            thread_id = context.map(|c| c.thread_id.as_str()),
            "Performing web search"
        );
        let query = SearchQuery {
            query: args.query.clone(),
            max_results: args.max_results,
            include_images: args.include_images,
            include_answer: args.include_answer,
            depth: args.search_depth,
            include_domains: args.domains.unwrap_or_default(),
            exclude_domains: args.exclude_domains.unwrap_or_default(),
        };
        let (outcome, provider) = self.run_search(&query).await?;

        Ok(json!({
            "query": args.query,
            "total_results": outcome.results.len(),
            "results": outcome.results,
            "answer": outcome.answer,
            "images": outcome.images,
            "provider": provider,
            "search_time_ms": start.elapsed().as_millis() as u64,
        }))
    }

    async fn news_search(&self, args: NewsArgs) -> Result<Value, ToolError> {
        let start = Instant::now();
        let news_query = match args.location.as_deref().map(str::trim) {
            Some(loc) if !loc.is_empty() => format!("{} news in {loc}", args.query),
            _ => format!("{} news", args.query),
        };
        let (outcome, provider) = self
            .run_search(&SearchQuery::new(news_query, args.max_results))
            .await?;

        let news: Vec<SearchHit> = outcome
            .results
            .into_iter()
            .filter(|hit| is_news_url(&hit.url))
            .collect();
        let total = news.len();

        Ok(json!({
            "query": args.query,
            "days": args.days,
            "location": args.location,
            "results": news.into_iter().take(args.max_results).collect::<Vec<_>>(),
            "total_results": total,
            "provider": provider,
            "search_time_ms": start.elapsed().as_millis() as u64,
        }))
    }

    async fn research(&self, args: ResearchArgs) -> Result<Value, ToolError> {
        let plan = research_plan(&args, Utc::now().year());
        info!(
            depth = args.depth.as_str(),
            searches = plan.len(),
            "Conducting research"
        );

        let outcomes = join_all(plan.iter().map(|q| self.run_search(q))).await;

        let mut succeeded = 0usize;
        let mut hits: Vec<SearchHit> = Vec::new();
        let mut answers: Vec<String> = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok((outcome, _)) => {
                    succeeded += 1;
                    for hit in outcome.results {
                        if !hits.iter().any(|h| h.url == hit.url) {
                            hits.push(hit);
                        }
                    }
                    answers.extend(outcome.answer);
                }
                Err(e) => warn!(error = %e, "Research search failed"),
            }
        }

        if succeeded == 0 {
            return Err(ToolError::execution_failed("All research searches failed"));
        }

        let total = hits.len();
        hits.truncate(args.max_sources);
        Ok(json!({
            "topic": args.topic,
            "results": hits,
            "summary": answers.join("\n\n"),
            "total_sources": total,
            "research_depth": args.depth.as_str(),
            "search_count": succeeded,
        }))
    }
}

fn is_news_url(url: &str) -> bool {
    NEWS_PATTERNS.iter().any(|p| url.contains(p))
}

/// The searches a research request fans out to.
fn research_plan(args: &ResearchArgs, year: i32) -> Vec<SearchQuery> {
    let comprehensive = args.depth == ResearchDepth::Comprehensive;
    let mut plan = Vec::new();

    let mut primary = SearchQuery::new(args.topic.clone(), args.max_sources.div_ceil(2));
    primary.include_answer = true;
    if comprehensive {
        primary.depth = SearchDepth::Advanced;
    }
    plan.push(primary);

    let secondary = args.max_sources / 3;
    if args.include_academic {
        let mut academic = SearchQuery::new(format!("{} academic research", args.topic), secondary);
        academic.include_domains = ACADEMIC_DOMAINS.iter().map(|d| d.to_string()).collect();
        academic.depth = SearchDepth::Advanced;
        plan.push(academic);
    }

    if comprehensive {
        plan.push(SearchQuery::new(
            format!("{} recent developments {year}", args.topic),
            secondary,
        ));
    }

    // secondary searches with a zero budget are skipped
    let mut kept = vec![plan.remove(0)];
    kept.extend(plan.into_iter().filter(|q| q.max_results > 0));
    kept
}

fn operation_schemas() -> Vec<OperationSchema> {
    vec![
        OperationSchema::new(SEARCH, "Search the web for current information")
            .param(ParamSpec::string("query", "Search query").required())
            .param(
                ParamSpec::integer("max_results", "Maximum number of results (1-20)")
                    .with_default(10),
            )
            .param(
                ParamSpec::boolean("include_images", "Include images in results").with_default(false),
            )
            .param(
                ParamSpec::boolean("include_answer", "Include an AI-generated answer")
                    .with_default(true),
            )
            .param(
                ParamSpec::one_of("search_depth", ["basic", "advanced"], "Search depth")
                    .with_default("basic"),
            )
            .param(ParamSpec::string_list("domains", "Domains to include"))
            .param(ParamSpec::string_list("exclude_domains", "Domains to exclude"))
            .example(json!({"query": "latest AI developments 2024"}))
            .example(json!({"query": "climate change solutions", "max_results": 5}))
            .with_tag(
                TagSpec::new(WEB_SEARCH)
                    .with_description("Search the web")
                    .with_example(r#"<web_search query="rust async runtimes" max_results="5" />"#),
            ),
        OperationSchema::new(NEWS_SEARCH, "Search for recent news articles")
            .param(ParamSpec::string("query", "News search query").required())
            .param(ParamSpec::integer("max_results", "Maximum number of results").with_default(10))
            .param(ParamSpec::integer("days", "Number of days to look back").with_default(7))
            .param(ParamSpec::string("location", "Geographic location for news"))
            .example(json!({"query": "technology news", "days": 3})),
        OperationSchema::new(RESEARCH, "Conduct comprehensive research on a topic")
            .param(ParamSpec::string("topic", "Research topic").required())
            .param(
                ParamSpec::one_of("depth", ["quick", "comprehensive"], "Research depth")
                    .with_default("quick"),
            )
            .param(
                ParamSpec::integer("max_sources", "Maximum number of sources").with_default(5),
            )
            .param(
                ParamSpec::boolean("include_academic", "Include academic sources")
                    .with_default(false),
            )
            .example(json!({"topic": "quantum computing applications", "depth": "comprehensive"})),
    ]
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH
    }

    fn description(&self) -> &str {
        "Search the web for current information and news"
    }

    async fn init(&mut self) -> Result<(), ToolLifecycleError> {
        if self.provider.is_some() {
            return Ok(());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ToolLifecycleError::Other(format!("HTTP client: {e}")))?;

        let provider: Arc<dyn SearchProvider> = match std::env::var(&self.config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Arc::new(TavilyProvider::new(
                client,
                self.config.tavily_url.clone(),
                key,
            )),
            _ => {
                warn!(
                    env = %self.config.api_key_env,
                    "No Tavily API key found, falling back to DuckDuckGo"
                );
                Arc::new(DuckDuckGoProvider::new(client, self.config.duckduckgo_url.clone()))
            }
        };
        info!(provider = provider.name(), "Web search tool initialized");
        self.provider = Some(provider);
        Ok(())
    }

    fn schemas(&self) -> Vec<OperationSchema> {
        operation_schemas()
    }

    async fn execute(
        &self,
        operation: &str,
        params: &Value,
        context: Option<&ToolContext>,
    ) -> ToolResult {
        let schemas = operation_schemas();
        let Some(schema) = suna_domain::tool::find_operation(&schemas, operation) else {
            return ToolResult::unknown_operation(self.name(), operation);
        };

        let outcome = match operation {
            SEARCH => match schema.parse(params) {
                Ok(args) => self.search(args, context).await,
                Err(e) => Err(e.into()),
            },
            NEWS_SEARCH => match schema.parse(params) {
                Ok(args) => self.news_search(args).await,
                Err(e) => Err(e.into()),
            },
            RESEARCH => match schema.parse(params) {
                Ok(args) => self.research(args).await,
                Err(e) => Err(e.into()),
            },
            other => return ToolResult::unknown_operation(self.name(), other),
        };

        match outcome {
            Ok(data) => {
                ToolResult::success(data).with_metadata("searched_at", Utc::now().to_rfc3339())
            }
            Err(e) => {
                debug!(operation, error = %e, "Web search failed");
                ToolResult::failure(e)
            }
        }
    }
}
