//! `browser_automation` tool: navigation and page content extraction.
//!
//! There is no remote browser session. `navigate` validates the URL and
//! remembers it per thread; `extract_content` performs a plain HTTP fetch and
//! reads the page through [`super::html`]. Interactive operations (click,
//! fill, screenshot, wait) are declared so models can see them, but always
//! fail with `EXECUTION_FAILED`.

use super::html::{self, ExtractOptions};
use async_trait::async_trait;
use chrono::Utc;
use lru::LruCache;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use suna_domain::{
    OperationSchema, ParamSpec, TagSpec, Tool, ToolContext, ToolError, ToolLifecycleError,
    ToolResult,
};
use tracing::{debug, info};

pub const BROWSER: &str = "browser_automation";
pub const NAVIGATE: &str = "navigate";
pub const EXTRACT_CONTENT: &str = "extract_content";
pub const CLICK_ELEMENT: &str = "click_element";
pub const FILL_FORM: &str = "fill_form";
pub const TAKE_SCREENSHOT: &str = "take_screenshot";
pub const WAIT_FOR_ELEMENT: &str = "wait_for_element";

const USER_AGENT: &str = "Mozilla/5.0 (compatible; SunaAgent/0.1)";

/// Key used for calls that carry no thread
const NO_THREAD: &str = "";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub timeout_secs: u64,
    /// Default for `extract_content.max_length`
    pub max_content_length: u64,
    /// Response bodies above this are refused
    pub max_body_bytes: usize,
    /// Threads whose current page is remembered; least recently used go first
    pub max_tracked_threads: usize,
    /// A remembered page is forgotten after this long without use
    pub page_ttl_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_content_length: 50_000,
            max_body_bytes: 5 * 1024 * 1024,
            max_tracked_threads: 1000,
            page_ttl_secs: 3600,
        }
    }
}

#[derive(Deserialize)]
struct NavigateArgs {
    url: String,
    wait_for: String,
    timeout: u64,
}

#[derive(Deserialize)]
struct ExtractArgs {
    url: Option<String>,
    selector: Option<String>,
    extract_text: bool,
    extract_links: bool,
    extract_images: bool,
    max_length: usize,
}

struct TrackedPage {
    url: Url,
    last_used: Instant,
}

/// Current page per thread, bounded in count and idle time.
struct PageTracker {
    pages: Mutex<LruCache<String, TrackedPage>>,
    ttl: Duration,
}

impl PageTracker {
    fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            pages: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, TrackedPage>> {
        self.pages.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remember(&self, thread_id: &str, url: Url) {
        let evicted = self.lock().push(
            thread_id.to_string(),
            TrackedPage {
                url,
                last_used: Instant::now(),
            },
        );
        if let Some((evicted, _)) = evicted.filter(|(key, _)| key != thread_id) {
            debug!(thread_id = %evicted, "Forgot least recently used page");
        }
    }

    /// Expired entries are dropped on lookup; a hit refreshes the entry.
    fn get(&self, thread_id: &str) -> Option<Url> {
        let mut pages = self.lock();
        let page = pages.get_mut(thread_id)?;
        if page.last_used.elapsed() > self.ttl {
            pages.pop(thread_id);
            return None;
        }
        page.last_used = Instant::now();
        Some(page.url.clone())
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn clear(&self) -> usize {
        let mut pages = self.lock();
        let n = pages.len();
        pages.clear();
        n
    }
}

pub struct BrowserTool {
    config: BrowserConfig,
    client: Option<reqwest::Client>,
    current: PageTracker,
}

impl BrowserTool {
    pub fn new(config: BrowserConfig) -> Self {
        let current = PageTracker::new(
            config.max_tracked_threads,
            Duration::from_secs(config.page_ttl_secs),
        );
        Self {
            config,
            client: None,
            current,
        }
    }

    fn client(&self) -> Result<&reqwest::Client, ToolError> {
        self.client
            .as_ref()
            .ok_or_else(|| ToolError::internal("browser tool used before init"))
    }

    /// URL of the last successful `navigate` in this thread.
    pub fn current_url(&self, thread_id: &str) -> Option<String> {
        self.current.get(thread_id).map(|url| url.to_string())
    }

    /// Threads with a remembered page.
    pub fn tracked_threads(&self) -> usize {
        self.current.len()
    }

    fn navigate(&self, args: NavigateArgs, context: Option<&ToolContext>) -> Result<Value, ToolError> {
        let url = parse_web_url(&args.url)?;
        let host = url.host_str().unwrap_or_default().to_string();
        let thread = context.map_or(NO_THREAD, |c| c.thread_id.as_str());

        info!(host = %host, wait_for = %args.wait_for, timeout_ms = args.timeout, "Navigating");
        self.current.remember(thread, url.clone());

        Ok(json!({
            "url": args.url,
            "title": format!("Page at {host}"),
            "status": "navigated",
            "current_url": url.to_string(),
        }))
    }

    async fn extract_content(
        &self,
        args: ExtractArgs,
        context: Option<&ToolContext>,
    ) -> Result<Value, ToolError> {
        let client = self.client()?;
        let url = match &args.url {
            Some(raw) => parse_web_url(raw)?,
            None => {
                let thread = context.map_or(NO_THREAD, |c| c.thread_id.as_str());
                self.current.get(thread).ok_or_else(|| {
                    ToolError::invalid_argument("No url given and no page has been navigated to")
                })?
            }
        };

        debug!(host = url.host_str().unwrap_or_default(), "Extracting content");
        let response = client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::timeout(format!("Request timed out: {url}"))
            } else {
                ToolError::execution_failed(format!("Content extraction failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::execution_failed(format!("HTTP {status}")));
        }
        if let Some(len) = response.content_length()
            && len as usize > self.config.max_body_bytes
        {
            return Err(ToolError::execution_failed(format!(
                "Response too large: {len} bytes (max: {})",
                self.config.max_body_bytes
            )));
        }

        let body = response.text().await.map_err(|e| {
            ToolError::execution_failed(format!("Failed to read response body: {e}"))
        })?;
        if body.len() > self.config.max_body_bytes {
            return Err(ToolError::execution_failed(format!(
                "Response too large: {} bytes (max: {})",
                body.len(),
                self.config.max_body_bytes
            )));
        }

        let page = html::extract(
            &body,
            &url,
            ExtractOptions {
                selector: args.selector.as_deref(),
                links: args.extract_links,
                images: args.extract_images,
            },
        )
        .map_err(ToolError::invalid_argument)?;

        let raw = if args.extract_text { page.text } else { body };
        let (content, truncated) = html::truncate_chars(&raw, args.max_length);

        let mut data = json!({
            "url": url.to_string(),
            "title": page.title,
            "content_length": content.chars().count(),
            "content": content,
            "truncated": truncated,
        });
        if args.extract_links {
            data["links"] = json!(page.links);
        }
        if args.extract_images {
            data["images"] = json!(page.images);
        }
        Ok(data)
    }
}

fn parse_web_url(raw: &str) -> Result<Url, ToolError> {
    let url = Url::parse(raw).map_err(|e| ToolError::invalid_argument(format!("Invalid URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ToolError::invalid_argument("Only HTTP and HTTPS URLs are supported")),
    }
}

fn session_required(action: &str) -> ToolError {
    ToolError::execution_failed(format!("{action} requires an active browser session"))
}

fn operation_schemas(config: &BrowserConfig) -> Vec<OperationSchema> {
    vec![
        OperationSchema::new(NAVIGATE, "Navigate to a URL")
            .param(ParamSpec::string("url", "URL to navigate to").required())
            .param(
                ParamSpec::one_of("wait_for", ["load", "domcontentloaded", "networkidle"], "Wait condition")
                    .with_default("load"),
            )
            .param(ParamSpec::integer("timeout", "Timeout in milliseconds").with_default(30_000))
            .example(json!({"url": "https://example.com"}))
            .example(json!({"url": "https://news.ycombinator.com", "wait_for": "networkidle"}))
            .with_tag(
                TagSpec::new("browser_navigate")
                    .with_description("Navigate to URL")
                    .with_example(r#"<browser_navigate url="https://example.com" />"#),
            ),
        OperationSchema::new(EXTRACT_CONTENT, "Extract content from a webpage")
            .param(ParamSpec::string(
                "url",
                "URL to extract from (defaults to the last navigated page)",
            ))
            .param(ParamSpec::string("selector", "CSS selector to extract specific content"))
            .param(ParamSpec::boolean("extract_text", "Extract text content").with_default(true))
            .param(ParamSpec::boolean("extract_links", "Extract links").with_default(false))
            .param(ParamSpec::boolean("extract_images", "Extract images").with_default(false))
            .param(
                ParamSpec::integer("max_length", "Maximum content length")
                    .with_default(config.max_content_length),
            )
            .example(json!({"url": "https://example.com", "extract_links": true}))
            .example(json!({"url": "https://news.ycombinator.com", "selector": ".titleline"}))
            .with_tag(
                TagSpec::new("browser_extract")
                    .with_description("Extract webpage content")
                    .with_example(r#"<browser_extract url="https://example.com" extract_text="true" />"#),
            ),
        OperationSchema::new(CLICK_ELEMENT, "Click an element on the page")
            .param(ParamSpec::string("selector", "CSS selector of element to click").required())
            .param(ParamSpec::string("wait_for", "CSS selector to wait for after click"))
            .param(ParamSpec::integer("timeout", "Timeout in milliseconds").with_default(5_000))
            .example(json!({"selector": "button.submit"})),
        OperationSchema::new(FILL_FORM, "Fill a form input")
            .param(ParamSpec::string("selector", "CSS selector of form input").required())
            .param(ParamSpec::string("value", "Value to fill").required())
            .param(ParamSpec::boolean("submit", "Submit form after filling").with_default(false))
            .example(json!({"selector": "input[name=\"email\"]", "value": "user@example.com"})),
        OperationSchema::new(TAKE_SCREENSHOT, "Take a screenshot of the page")
            .param(ParamSpec::boolean("full_page", "Take full page screenshot").with_default(false))
            .param(ParamSpec::string("selector", "CSS selector to screenshot specific element"))
            .param(ParamSpec::one_of("format", ["png", "jpeg"], "Image format").with_default("png"))
            .example(json!({"full_page": true})),
        OperationSchema::new(WAIT_FOR_ELEMENT, "Wait for an element to appear")
            .param(ParamSpec::string("selector", "CSS selector to wait for").required())
            .param(ParamSpec::integer("timeout", "Timeout in milliseconds").with_default(10_000))
            .param(ParamSpec::boolean("visible", "Wait for element to be visible").with_default(true))
            .example(json!({"selector": ".content", "timeout": 15000})),
    ]
}

#[async_trait]
impl Tool for BrowserTool {
    fn name(&self) -> &str {
        BROWSER
    }

    fn description(&self) -> &str {
        "Automate web browser interactions including navigation, content extraction, and form filling"
    }

    async fn init(&mut self) -> Result<(), ToolLifecycleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ToolLifecycleError::Other(format!("HTTP client: {e}")))?;
        self.client = Some(client);
        info!(timeout_secs = self.config.timeout_secs, "Browser tool initialized");
        Ok(())
    }

    fn schemas(&self) -> Vec<OperationSchema> {
        operation_schemas(&self.config)
    }

    async fn execute(
        &self,
        operation: &str,
        params: &Value,
        context: Option<&ToolContext>,
    ) -> ToolResult {
        let schemas = operation_schemas(&self.config);
        let Some(schema) = suna_domain::tool::find_operation(&schemas, operation) else {
            return ToolResult::unknown_operation(self.name(), operation);
        };

        let outcome = match operation {
            NAVIGATE => match schema.parse(params) {
                Ok(args) => self.navigate(args, context),
                Err(e) => Err(e.into()),
            },
            EXTRACT_CONTENT => match schema.parse(params) {
                Ok(args) => self.extract_content(args, context).await,
                Err(e) => Err(e.into()),
            },
            CLICK_ELEMENT | FILL_FORM | TAKE_SCREENSHOT | WAIT_FOR_ELEMENT => {
                match schema.validate(params) {
                    Ok(_) => Err(session_required(match operation {
                        CLICK_ELEMENT => "Click element",
                        FILL_FORM => "Fill form",
                        TAKE_SCREENSHOT => "Screenshot",
                        _ => "Wait for element",
                    })),
                    Err(e) => Err(e.into()),
                }
            }
            other => return ToolResult::unknown_operation(self.name(), other),
        };

        match outcome {
            Ok(data) => ToolResult::success(data).with_metadata("timestamp", Utc::now().to_rfc3339()),
            Err(e) => {
                debug!(operation, error = %e, "Browser operation failed");
                ToolResult::failure(e)
            }
        }
    }

    async fn cleanup(&self) -> Result<(), ToolLifecycleError> {
        let sessions = self.current.clear();
        info!(sessions, "Browser tool cleaned up");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suna_domain::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `body` with `status` to every connection; returns the base URL.
    async fn serve(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    async fn tool() -> BrowserTool {
        let mut tool = BrowserTool::new(BrowserConfig::default());
        tool.init().await.unwrap();
        tool
    }

    const PAGE: &str = r#"<html><head><title>Fixture</title><script>track()</script></head>
        <body><article><p>Hello from the fixture page.</p><a href="/next">Next</a>
        <img src="logo.png"></article></body></html>"#;

    #[tokio::test]
    async fn test_navigate_rejects_non_http() {
        let tool = tool().await;
        let result = tool.execute(NAVIGATE, &json!({"url": "file:///etc/passwd"}), None).await;
        assert_eq!(result.error_message(), Some("Only HTTP and HTTPS URLs are supported"));

        let result = tool.execute(NAVIGATE, &json!({"url": "not a url"}), None).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::InvalidArgument));
    }

    #[tokio::test]
    async fn test_navigate_tracks_url_per_thread() {
        let tool = tool().await;
        let ctx_a = ToolContext::new("u", "thread-a");
        let ctx_b = ToolContext::new("u", "thread-b");

        let result = tool
            .execute(NAVIGATE, &json!({"url": "https://example.com/docs"}), Some(&ctx_a))
            .await;
        let data = result.data().unwrap();
        assert_eq!(data["title"], "Page at example.com");
        assert_eq!(data["status"], "navigated");

        assert_eq!(tool.current_url("thread-a").as_deref(), Some("https://example.com/docs"));
        assert_eq!(tool.current_url("thread-b"), None);

        let missing = tool.execute(EXTRACT_CONTENT, &json!({}), Some(&ctx_b)).await;
        assert_eq!(missing.error_kind(), Some(ErrorKind::InvalidArgument));

        tool.cleanup().await.unwrap();
        assert_eq!(tool.current_url("thread-a"), None);
    }

    #[tokio::test]
    async fn test_tracked_pages_are_bounded() {
        let mut tool = BrowserTool::new(BrowserConfig {
            max_tracked_threads: 100,
            ..Default::default()
        });
        tool.init().await.unwrap();

        for i in 0..5000 {
            let ctx = ToolContext::new("u", format!("thread-{i}"));
            let result = tool
                .execute(NAVIGATE, &json!({"url": "https://example.com/"}), Some(&ctx))
                .await;
            assert!(result.is_success());
        }

        assert_eq!(tool.tracked_threads(), 100);
        assert_eq!(tool.current_url("thread-0"), None);
        assert_eq!(tool.current_url("thread-4999").as_deref(), Some("https://example.com/"));
    }

    #[test]
    fn test_idle_page_expires() {
        let tracker = PageTracker::new(10, Duration::ZERO);
        tracker.remember("t", Url::parse("https://example.com/").unwrap());
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(tracker.get("t"), None);
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_lookup_refreshes_recency() {
        let tracker = PageTracker::new(2, Duration::from_secs(60));
        tracker.remember("a", Url::parse("https://a.example/").unwrap());
        tracker.remember("b", Url::parse("https://b.example/").unwrap());
        assert!(tracker.get("a").is_some());

        tracker.remember("c", Url::parse("https://c.example/").unwrap());
        assert!(tracker.get("a").is_some());
        assert!(tracker.get("b").is_none());
        assert_eq!(tracker.len(), 2);
    }

    #[tokio::test]
    async fn test_extract_content_from_navigated_page() {
        let base = serve("200 OK", PAGE).await;
        let tool = tool().await;
        let ctx = ToolContext::new("u", "t");

        tool.execute(NAVIGATE, &json!({"url": format!("{base}/page")}), Some(&ctx)).await;
        let result = tool
            .execute(
                EXTRACT_CONTENT,
                &json!({"extract_links": true, "extract_images": true}),
                Some(&ctx),
            )
            .await;
        let data = result.data().unwrap();
        assert_eq!(data["title"], "Fixture");
        assert_eq!(data["content"], "Hello from the fixture page. Next");
        assert_eq!(data["links"][0], format!("{base}/next"));
        assert_eq!(data["images"][0], format!("{base}/logo.png"));
        assert_eq!(data["truncated"], false);
    }

    #[tokio::test]
    async fn test_extract_content_truncates() {
        let base = serve("200 OK", PAGE).await;
        let tool = tool().await;
        let result = tool
            .execute(EXTRACT_CONTENT, &json!({"url": base, "max_length": 5}), None)
            .await;
        let data = result.data().unwrap();
        assert_eq!(data["content"], "Hello...");
        assert_eq!(data["truncated"], true);
    }

    #[tokio::test]
    async fn test_extract_content_http_error() {
        let base = serve("404 Not Found", "missing").await;
        let tool = tool().await;
        let result = tool.execute(EXTRACT_CONTENT, &json!({"url": base}), None).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::ExecutionFailed));
        assert!(result.error_message().unwrap().starts_with("HTTP 404"));
    }

    #[tokio::test]
    async fn test_interactive_operations_need_session() {
        let tool = tool().await;
        let result = tool.execute(CLICK_ELEMENT, &json!({"selector": "button"}), None).await;
        assert_eq!(
            result.error_message(),
            Some("Click element requires an active browser session")
        );

        let invalid = tool.execute(FILL_FORM, &json!({"selector": "input"}), None).await;
        assert_eq!(invalid.error_kind(), Some(ErrorKind::InvalidArgument));
    }
}
