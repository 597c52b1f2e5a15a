//! Web search tool.
//!
//! The tool itself only validates arguments and formats results; the
//! actual lookup is delegated to a [`SearchProvider`] (Tavily in
//! production, [`StaticSearch`] for tests and offline use).

use std::sync::Arc;

use async_trait::async_trait;
use lumeo_core::error::ToolError;
use lumeo_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound on results a single call may ask for.
pub const MAX_RESULTS_LIMIT: u32 = 20;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// A backend that answers search queries.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// The provider name (e.g., "tavily").
    fn name(&self) -> &str;

    /// Run one search request.
    async fn search(&self, query: &str, max_results: u32)
    -> Result<Vec<SearchResult>, ToolError>;
}

/// What the tool feeds back to the model, JSON-encoded.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchOutput {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// The `web_search` tool bound to the model on search-enabled turns.
pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    default_max_results: u32,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>, default_max_results: u32) -> Self {
        Self {
            provider,
            default_max_results: default_max_results.clamp(1, MAX_RESULTS_LIMIT),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns a list of results with titles, URLs, and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": format!("Number of results to return (default {})", self.default_max_results),
                    "minimum": 1,
                    "maximum": MAX_RESULTS_LIMIT
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let max_results = match &arguments["max_results"] {
            serde_json::Value::Null => self.default_max_results,
            v => v
                .as_u64()
                .filter(|n| (1..=MAX_RESULTS_LIMIT as u64).contains(n))
                .map(|n| n as u32)
                .ok_or_else(|| {
                    ToolError::InvalidArguments(format!(
                        "'max_results' must be an integer between 1 and {MAX_RESULTS_LIMIT}"
                    ))
                })?,
        };

        debug!(provider = %self.provider.name(), query = %query, max_results, "Running web search");
        let mut results = self.provider.search(query, max_results).await?;
        results.truncate(max_results as usize);

        let output = SearchOutput {
            query: query.to_string(),
            results,
        };
        let data = serde_json::to_value(&output).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "web_search".into(),
            reason: e.to_string(),
        })?;

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: data.to_string(),
            data: Some(data),
        })
    }
}

/// A deterministic, in-process provider.
///
/// Returns the configured results for every query, or fails every query
/// when built with [`StaticSearch::failing`].
pub struct StaticSearch {
    results: Vec<SearchResult>,
    failure: Option<String>,
}

impl StaticSearch {
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            failure: None,
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            failure: Some(reason.into()),
        }
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(
        &self,
        _query: &str,
        max_results: u32,
    ) -> Result<Vec<SearchResult>, ToolError> {
        if let Some(reason) = &self.failure {
            return Err(ToolError::SearchFailed {
                provider: "static".into(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .results
            .iter()
            .take(max_results as usize)
            .cloned()
            .collect())
    }
}
