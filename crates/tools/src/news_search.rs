//! News search tool: stub that returns mock article listings.
//!
//! In production this would call a real news search API (Google News,
//! NewsAPI, etc.). The stub returns plausible, deterministic results so
//! the full pipeline can be exercised end-to-end without network access.

use async_trait::async_trait;
use newsloom_core::error::ToolError;
use newsloom_core::tool::{Tool, ToolResult};

pub struct NewsSearchTool;

#[async_trait]
impl Tool for NewsSearchTool {
    fn name(&self) -> &str {
        "search_news"
    }

    fn description(&self) -> &str {
        "Search for recent news articles on a topic. Returns a list of articles with \
         titles, URLs, sources, and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The news topic or search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of articles to return (default 5)",
                    "default": 5
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let max_results = arguments["max_results"].as_u64().unwrap_or(5).min(10) as usize;

        let articles = generate_mock_articles(query, max_results);
        let output = serde_json::to_string_pretty(&articles).unwrap_or_default();

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
            data: Some(serde_json::to_value(&articles).unwrap_or_default()),
        })
    }
}

#[derive(Clone, serde::Serialize)]
struct NewsArticle {
    title: String,
    url: String,
    source: String,
    published: String,
    snippet: String,
}

fn generate_mock_articles(query: &str, count: usize) -> Vec<NewsArticle> {
    let q = query.to_lowercase();

    // Context-aware mock results for common digest topics.
    let templates: Vec<(&str, Vec<NewsArticle>)> = vec![
        ("ai", vec![
            NewsArticle {
                title: "New Open-Weight Models Narrow the Gap With Frontier Labs".into(),
                url: "https://technews.example.com/2025/08/open-weight-models".into(),
                source: "TechNews".into(),
                published: "2025-08-20".into(),
                snippet: "A wave of open-weight releases is closing the benchmark gap, \
                          raising fresh questions about the economics of frontier training runs.".into(),
            },
            NewsArticle {
                title: "Regulators Sketch Out Reporting Rules for Large AI Training Runs".into(),
                url: "https://wirereport.example.com/ai-reporting-rules".into(),
                source: "Wire Report".into(),
                published: "2025-08-19".into(),
                snippet: "Draft rules would require disclosure of compute thresholds and \
                          safety evaluations before deployment.".into(),
            },
            NewsArticle {
                title: "Hospitals Pilot AI Scribes to Cut Paperwork Hours".into(),
                url: "https://healthdaily.example.com/ai-scribes-pilot".into(),
                source: "Health Daily".into(),
                published: "2025-08-18".into(),
                snippet: "Early results from a twelve-hospital pilot show clinicians saving \
                          nearly two hours per shift on documentation.".into(),
            },
        ]),
        ("rust", vec![
            NewsArticle {
                title: "Rust Adoption Keeps Climbing in Infrastructure Teams".into(),
                url: "https://devwire.example.com/rust-adoption-2025".into(),
                source: "DevWire".into(),
                published: "2025-08-21".into(),
                snippet: "Survey data shows Rust displacing C++ in new network services, \
                          with memory safety cited as the deciding factor.".into(),
            },
            NewsArticle {
                title: "Kernel Maintainers Merge Another Batch of Rust Drivers".into(),
                url: "https://kernelbeat.example.com/rust-drivers-merge".into(),
                source: "Kernel Beat".into(),
                published: "2025-08-19".into(),
                snippet: "The latest merge window brings Rust implementations of two \
                          network drivers and a filesystem shim.".into(),
            },
        ]),
    ];

    for (keyword, articles) in &templates {
        if q.contains(keyword) {
            return articles.iter().take(count).cloned().collect();
        }
    }

    // Generic fallback: deterministic results derived from the query.
    (0..count)
        .map(|i| NewsArticle {
            title: format!("{} Update: Story {}", capitalize(query), i + 1),
            url: format!(
                "https://news.example.com/{}/story-{}",
                slugify(query),
                i + 1
            ),
            source: "Example News".into(),
            published: format!("2025-08-{:02}", 21 - i.min(20)),
            snippet: format!(
                "Coverage of recent developments in {}. This is a mock result; \
                 in production this would be a real article summary.",
                query
            ),
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn slugify(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}
