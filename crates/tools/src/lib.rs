//! Built-in tool implementations for Newsloom.
//!
//! Tools give pipeline stages the ability to interact with the world:
//! search for news articles, fetch and extract article text, and save
//! the finished digest to disk.

pub mod article_extract;
pub mod digest_save;
pub mod news_search;

use newsloom_core::tool::ToolRegistry;

pub use article_extract::ArticleExtractTool;
pub use digest_save::DigestSaveTool;
pub use news_search::NewsSearchTool;

/// Create a default tool registry with all built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(news_search::NewsSearchTool));
    registry.register(Box::new(article_extract::ArticleExtractTool::new()));
    registry.register(Box::new(digest_save::DigestSaveTool));
    registry
}
