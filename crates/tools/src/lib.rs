//! Tool implementations for Lumeo.
//!
//! There is one tool, `web_search`, backed by a pluggable
//! [`SearchProvider`]. The workflow binds it only on turns with web search
//! enabled.

pub mod tavily;
pub mod web_search;

use std::sync::Arc;

use lumeo_config::SearchConfig;
use lumeo_core::tool::ToolRegistry;

pub use tavily::TavilySearch;
pub use web_search::{SearchOutput, SearchProvider, SearchResult, StaticSearch, WebSearchTool};

/// Build the search provider named in config. Only "tavily" talks to the
/// network; "static" returns nothing and is meant for offline runs.
pub fn search_provider(config: &SearchConfig) -> Arc<dyn SearchProvider> {
    match config.provider.as_str() {
        "static" => Arc::new(StaticSearch::new(Vec::new())),
        _ => Arc::new(TavilySearch::new(
            &config.api_url,
            config.api_key.clone(),
            &config.topic,
        )),
    }
}

/// A registry holding the `web_search` tool over `provider`.
pub fn search_registry(provider: Arc<dyn SearchProvider>, max_results: u32) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(WebSearchTool::new(provider, max_results)));
    registry
}

/// Create the default tool registry from config.
pub fn default_registry(config: &SearchConfig) -> ToolRegistry {
    search_registry(search_provider(config), config.max_results)
}
