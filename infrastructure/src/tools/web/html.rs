//! HTML to readable text, with optional selector scoping and link/image harvesting.

use reqwest::Url;
use scraper::{ElementRef, Html, Node, Selector};

/// Tags whose entire subtree is ignored
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "svg", "template"];

#[derive(Debug, Default, PartialEq)]
pub struct PageExtract {
    pub title: Option<String>,
    pub text: String,
    pub links: Vec<String>,
    pub images: Vec<String>,
}

/// What to pull out of a page.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions<'a> {
    pub selector: Option<&'a str>,
    pub links: bool,
    pub images: bool,
}

/// Parse a page and extract its readable content.
///
/// Relative `href`/`src` values are resolved against `base`. Fails only for
/// an unparsable CSS selector.
pub fn extract(html: &str, base: &Url, options: ExtractOptions<'_>) -> Result<PageExtract, String> {
    let document = Html::parse_document(html);

    let title_sel = parse_selector("title")?;
    let title = document
        .select(&title_sel)
        .next()
        .map(|t| clean_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let scopes: Vec<ElementRef> = match options.selector {
        Some(css) => {
            let sel = parse_selector(css)?;
            document.select(&sel).collect()
        }
        None => {
            let body = parse_selector("body")?;
            vec![document.select(&body).next().unwrap_or(document.root_element())]
        }
    };

    let mut parts = Vec::new();
    for scope in &scopes {
        collect_text(*scope, &mut parts);
    }
    let text = clean_whitespace(&parts.join(" "));

    let links = if options.links {
        harvest(&scopes, "a[href]", "href", base)?
    } else {
        Vec::new()
    };
    let images = if options.images {
        harvest(&scopes, "img[src]", "src", base)?
    } else {
        Vec::new()
    };

    Ok(PageExtract {
        title,
        text,
        links,
        images,
    })
}

fn parse_selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("Invalid CSS selector '{css}': {e}"))
}

fn harvest(scopes: &[ElementRef], css: &str, attr: &str, base: &Url) -> Result<Vec<String>, String> {
    let sel = parse_selector(css)?;
    let mut out: Vec<String> = Vec::new();
    for scope in scopes {
        for el in scope.select(&sel) {
            let Some(raw) = el.value().attr(attr) else {
                continue;
            };
            if let Ok(url) = base.join(raw.trim()) {
                let url = url.to_string();
                if !out.contains(&url) {
                    out.push(url);
                }
            }
        }
    }
    Ok(out)
}

fn collect_text(element: ElementRef, parts: &mut Vec<String>) {
    if SKIP_TAGS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let t = text.trim();
                if !t.is_empty() {
                    parts.push(t.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, parts);
                }
            }
            _ => {}
        }
    }
}

/// Collapse runs of spaces; keep at most one blank line.
pub fn clean_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_whitespace = false;
    let mut newline_count = 0;

    for ch in text.chars() {
        if ch == '\n' {
            newline_count += 1;
            if newline_count <= 2 {
                result.push('\n');
            }
            prev_was_whitespace = true;
        } else if ch.is_whitespace() {
            if !prev_was_whitespace {
                result.push(' ');
            }
            prev_was_whitespace = true;
            newline_count = 0;
        } else {
            result.push(ch);
            prev_was_whitespace = false;
            newline_count = 0;
        }
    }

    result.trim().to_string()
}

/// Cut to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (format!("{}...", &text[..idx]), true),
        None => (text.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/docs/").unwrap()
    }

    #[test]
    fn test_strips_script_and_style() {
        let html = r#"<html><head><title> Docs </title></head><body>
            <script>var x = 1;</script><style>.a{}</style>
            <p>Visible text</p><noscript>No JS</noscript></body></html>"#;
        let page = extract(html, &base(), ExtractOptions::default()).unwrap();
        assert_eq!(page.title.as_deref(), Some("Docs"));
        assert_eq!(page.text, "Visible text");
    }

    #[test]
    fn test_selector_scoping_and_links() {
        let html = r#"<body><nav><a href="/home">Home</a></nav>
            <main><h1>Title</h1><a href="guide.html">Guide</a><a href="guide.html">Again</a>
            <img src="/img/logo.png"></main></body>"#;
        let page = extract(
            html,
            &base(),
            ExtractOptions {
                selector: Some("main"),
                links: true,
                images: true,
            },
        )
        .unwrap();
        assert_eq!(page.text, "Title Guide Again");
        assert_eq!(page.links, vec!["https://example.com/docs/guide.html"]);
        assert_eq!(page.images, vec!["https://example.com/img/logo.png"]);
    }

    #[test]
    fn test_invalid_selector() {
        let err = extract("<p>x</p>", &base(), ExtractOptions {
            selector: Some("[[["),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.starts_with("Invalid CSS selector"));
    }

    #[test]
    fn test_whitespace_and_truncation() {
        assert_eq!(clean_whitespace("  hello   world  "), "hello world");
        assert_eq!(clean_whitespace("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(truncate_chars("héllo", 2), ("hé...".to_string(), true));
        assert_eq!(truncate_chars("hi", 5), ("hi".to_string(), false));
    }
}
