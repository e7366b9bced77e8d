//! Article extraction tool: fetches a webpage and extracts clean article text.
//!
//! Extraction heuristics, in order of preference:
//! 1. the first `<article>` element
//! 2. the first `<main>` element
//! 3. the first `<div>` whose class mentions "content" or "article"
//! 4. all paragraphs on the page, joined with spaces
//!
//! Script, style, and chrome elements (nav, header, footer, aside, iframe)
//! are stripped first. Extractions shorter than 100 characters are treated
//! as failures.

use async_trait::async_trait;
use newsloom_core::error::ToolError;
use newsloom_core::tool::{Tool, ToolResult};
use regex_lite::Regex;
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const FETCH_TIMEOUT_SECS: u64 = 10;
const MIN_ARTICLE_CHARS: usize = 100;

/// Elements that never contain article text.
const NOISE_TAGS: [&str; 7] = [
    "script", "style", "nav", "header", "footer", "aside", "iframe",
];

pub struct ArticleExtractTool {
    client: reqwest::Client,
}

impl ArticleExtractTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        response.text().await
    }
}

impl Default for ArticleExtractTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ArticleExtractTool {
    fn name(&self) -> &str {
        "extract_article_text"
    }

    fn description(&self) -> &str {
        "Fetch a webpage and extract the clean article text, with scripts, navigation, \
         and other page chrome removed. Returns the extracted text or an error."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL of the article to extract"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        debug!(url, "Fetching article");

        let extraction = match self.fetch(url).await {
            Ok(html) => evaluate(&html),
            Err(e) => {
                warn!(url, error = %e, "Article fetch failed");
                Extraction::failure(format!("Extraction error: {e}"))
            }
        };

        Ok(extraction.into_result())
    }
}

/// Run extraction over fetched HTML and apply the minimum-length check.
fn evaluate(html: &str) -> Extraction {
    let text = extract_text(html);
    if text.chars().count() < MIN_ARTICLE_CHARS {
        Extraction::failure("Article too short or extraction failed")
    } else {
        Extraction {
            success: true,
            text,
            error: None,
        }
    }
}

/// Extract readable article text from raw HTML.
pub fn extract_text(html: &str) -> String {
    let stripped = strip_noise(html);
    let text = match find_article_region(&stripped) {
        Some(region) => to_text(&region),
        None => paragraphs_text(&stripped),
    };
    clean_lines(&text)
}

/// Remove comments and non-content elements.
fn strip_noise(html: &str) -> String {
    let mut out = match Regex::new(r"(?s)<!--.*?-->") {
        Ok(re) => re.replace_all(html, "").into_owned(),
        Err(_) => html.to_string(),
    };
    for tag in NOISE_TAGS {
        let pattern = format!(r"(?is)<{tag}\b.*?</{tag}\s*>");
        if let Ok(re) = Regex::new(&pattern) {
            out = re.replace_all(&out, "").into_owned();
        }
    }
    out
}

/// Best-effort selection of the main article region's inner HTML.
fn find_article_region(html: &str) -> Option<String> {
    tag_inner(html, "article")
        .or_else(|| tag_inner(html, "main"))
        .or_else(|| content_div_inner(html))
}

/// Inner HTML of the first `<tag>...</tag>` element.
fn tag_inner(html: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"(?is)<{tag}\b[^>]*>(.*?)</{tag}\s*>");
    let re = Regex::new(&pattern).ok()?;
    re.captures(html).map(|c| c[1].to_string())
}

/// Inner HTML of the first `<div>` whose class mentions "content" or
/// "article". Tracks nesting depth so the region closes at the matching tag.
fn content_div_inner(html: &str) -> Option<String> {
    let open = Regex::new(
        r#"(?is)<div\b[^>]*class\s*=\s*["'][^"']*(?:content|article)[^"']*["'][^>]*>"#,
    )
    .ok()?;
    let start = open.find(html)?.end();
    let rest = &html[start..];

    let div_tag = Regex::new(r"(?is)<(/?)div\b[^>]*>").ok()?;
    let mut depth = 1usize;
    for caps in div_tag.captures_iter(rest) {
        let tag = caps.get(0)?;
        if caps[1].is_empty() {
            depth += 1;
        } else {
            depth -= 1;
            if depth == 0 {
                return Some(rest[..tag.start()].to_string());
            }
        }
    }

    // Unbalanced markup; take everything after the opening tag.
    Some(rest.to_string())
}

/// Join the text of every paragraph, for pages with no clear article region.
fn paragraphs_text(html: &str) -> String {
    let re = match Regex::new(r"(?is)<p\b[^>]*>(.*?)</p\s*>") {
        Ok(re) => re,
        Err(_) => return String::new(),
    };
    re.captures_iter(html)
        .map(|c| to_text(&c[1]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop tags and decode common entities, leaving plain text.
fn to_text(html: &str) -> String {
    let no_tags = match Regex::new(r"(?s)<[^>]*>") {
        Ok(re) => re.replace_all(html, "").into_owned(),
        Err(_) => html.to_string(),
    };
    decode_entities(&no_tags)
}

/// Decode the entities that actually show up in article markup.
/// `&amp;` goes last so encoded entities don't double-decode.
fn decode_entities(text: &str) -> String {
    let mut out = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");

    if let Ok(re) = Regex::new(r"&#(\d+);") {
        out = re
            .replace_all(&out, |caps: &regex_lite::Captures<'_>| {
                caps[1]
                    .parse::<u32>()
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_default()
            })
            .into_owned();
    }
    if let Ok(re) = Regex::new(r"&#[xX]([0-9a-fA-F]+);") {
        out = re
            .replace_all(&out, |caps: &regex_lite::Captures<'_>| {
                u32::from_str_radix(&caps[1], 16)
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_default()
            })
            .into_owned();
    }

    out.replace("&amp;", "&")
}

/// Trim every line and drop blanks.
fn clean_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(serde::Serialize)]
struct Extraction {
    success: bool,
    text: String,
    error: Option<String>,
}

impl Extraction {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            text: String::new(),
            error: Some(error.into()),
        }
    }

    fn into_result(self) -> ToolResult {
        ToolResult {
            call_id: String::new(),
            success: self.success,
            output: serde_json::to_string_pretty(&self).unwrap_or_default(),
            data: Some(serde_json::to_value(&self).unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILLER: &str = "The quick brown fox jumps over the lazy dog near the riverbank \
                          while reporters watch from a distance and take careful notes.";

    #[test]
    fn tool_definition() {
        let tool = ArticleExtractTool::new();
        assert_eq!(tool.name(), "extract_article_text");
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["url"]));
        assert!(schema["properties"]["url"].is_object());
    }

    #[test]
    fn prefers_article_element() {
        let html = format!(
            "<html><body>\
             <nav>Home | About | Contact</nav>\
             <article><p>{FILLER}</p></article>\
             <footer>Copyright 2025</footer>\
             </body></html>"
        );
        let text = extract_text(&html);
        assert!(text.contains("quick brown fox"));
        assert!(!text.contains("Home | About"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn falls_back_to_main_element() {
        let html = format!("<html><body><main><p>{FILLER}</p></main><div>sidebar</div></body></html>");
        let text = extract_text(&html);
        assert!(text.contains("quick brown fox"));
        assert!(!text.contains("sidebar"));
    }

    #[test]
    fn falls_back_to_content_div() {
        let html = format!(
            "<html><body>\
             <div class=\"page-content\"><div class=\"inner\"><p>{FILLER}</p></div></div>\
             <div class=\"related\">More stories</div>\
             </body></html>"
        );
        let text = extract_text(&html);
        assert!(text.contains("quick brown fox"));
        assert!(!text.contains("More stories"));
    }

    #[test]
    fn content_div_matching_is_case_insensitive() {
        let html = format!("<div CLASS=\"Article-Body\"><p>{FILLER}</p></div>");
        let text = extract_text(&html);
        assert!(text.contains("quick brown fox"));
    }

    #[test]
    fn joins_paragraphs_when_no_region_found() {
        let html = format!("<html><body><p>{FILLER}</p><p>Second paragraph here.</p></body></html>");
        let text = extract_text(&html);
        assert!(text.contains("quick brown fox"));
        assert!(text.contains("Second paragraph here."));
    }

    #[test]
    fn strips_scripts_and_styles() {
        let html = format!(
            "<article><script>var tracking = true;</script>\
             <style>p {{ color: red; }}</style>\
             <p>{FILLER}</p></article>"
        );
        let text = extract_text(&html);
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color"));
        assert!(text.contains("quick brown fox"));
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(
            decode_entities("Smith &amp; Jones said &quot;hello&quot; &#8212; on &#x27;air&#x27;"),
            "Smith & Jones said \"hello\" \u{2014} on 'air'"
        );
    }

    #[test]
    fn short_extraction_fails() {
        let result = evaluate("<article><p>Too short.</p></article>");
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Article too short or extraction failed")
        );
        assert!(result.text.is_empty());
    }

    #[test]
    fn long_extraction_succeeds() {
        let html = format!("<article><p>{FILLER}</p></article>");
        let result = evaluate(&html);
        assert!(result.success);
        assert!(result.error.is_none());
        assert!(result.text.contains("quick brown fox"));
    }

    #[tokio::test]
    async fn missing_url_returns_error() {
        let tool = ArticleExtractTool::new();
        let result = tool.execute(serde_json::json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unreachable_url_reports_extraction_error() {
        let tool = ArticleExtractTool::new();
        let result = tool
            .execute(serde_json::json!({ "url": "not a valid url" }))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.output.contains("Extraction error"));
    }
}
