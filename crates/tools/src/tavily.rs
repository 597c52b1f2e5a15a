//! Tavily search API client.
//!
//! `POST {api_url}/search` with `{ query, max_results, topic }` and a
//! bearer API key. Tavily calls the snippet `content`.

use std::time::Duration;

use async_trait::async_trait;
use lumeo_core::error::ToolError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::web_search::{SearchProvider, SearchResult};

pub struct TavilySearch {
    api_url: String,
    api_key: Option<String>,
    topic: String,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>, topic: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "HTTP client builder failed, searches will have no timeout");
                reqwest::Client::new()
            });

        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            topic: topic.into(),
            client,
        }
    }

    fn failed(reason: impl Into<String>) -> ToolError {
        ToolError::SearchFailed {
            provider: "tavily".into(),
            reason: reason.into(),
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
    topic: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

impl From<TavilyResult> for SearchResult {
    fn from(r: TavilyResult) -> Self {
        SearchResult {
            title: r.title,
            url: r.url,
            snippet: r.content,
        }
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchResult>, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Self::failed("no API key configured (set TAVILY_API_KEY)"))?;

        let url = format!("{}/search", self.api_url);
        debug!(url = %url, topic = %self.topic, max_results, "Tavily request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&SearchRequest {
                query,
                max_results,
                topic: &self.topic,
            })
            .send()
            .await
            .map_err(|e| Self::failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Tavily returned error");
            return Err(Self::failed(format!("HTTP {}: {body}", status.as_u16())));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Self::failed(format!("invalid response: {e}")))?;

        Ok(parsed.results.into_iter().map(SearchResult::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(SearchRequest {
            query: "rust",
            max_results: 5,
            topic: "general",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"query": "rust", "max_results": 5, "topic": "general"}));
    }

    #[test]
    fn response_maps_content_to_snippet() {
        let raw = r#"{"query":"rust","results":[
            {"title":"Rust","url":"https://www.rust-lang.org","content":"A language","score":0.9},
            {"url":"https://doc.rust-lang.org"}
        ]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        let results: Vec<SearchResult> = parsed.results.into_iter().map(Into::into).collect();
        assert_eq!(results[0].snippet, "A language");
        assert_eq!(results[1].title, "");
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let search = TavilySearch::new("https://api.tavily.com/", Some(String::new()), "general");
        let err = search.search("rust", 5).await.unwrap_err();
        assert!(matches!(err, ToolError::SearchFailed { provider, .. } if provider == "tavily"));
    }
}
