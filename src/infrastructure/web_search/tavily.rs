//! Tavily search API adapter

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{DomainError, WebSearchProvider};
use crate::infrastructure::http_client::HttpClientTrait;

pub const DEFAULT_TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// Tavily search depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

/// Web search through the Tavily API
///
/// The payload handed to the pipeline is the JSON-encoded result list, so the
/// generator sees titles, URLs and snippets together.
#[derive(Debug)]
pub struct TavilySearchProvider<C: HttpClientTrait> {
    client: C,
    api_key: String,
    base_url: String,
    max_results: u32,
    search_depth: SearchDepth,
}

impl<C: HttpClientTrait> TavilySearchProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_TAVILY_BASE_URL.to_string(),
            max_results: 5,
            search_depth: SearchDepth::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_search_depth(mut self, depth: SearchDepth) -> Self {
        self.search_depth = depth;
        self
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }

    fn build_request(&self, query: &str) -> serde_json::Value {
        serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": self.max_results,
            "search_depth": self.search_depth,
            "include_answer": false,
            "include_raw_content": false,
            "include_images": false,
        })
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<String, DomainError> {
        let response: TavilyResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider("tavily", format!("Failed to parse response: {}", e))
        })?;

        serde_json::to_string(&response.results).map_err(|e| {
            DomainError::internal(format!("Failed to encode search results: {}", e))
        })
    }
}

#[async_trait]
impl<C: HttpClientTrait> WebSearchProvider for TavilySearchProvider<C> {
    async fn search(&self, query: &str) -> Result<String, DomainError> {
        if query.trim().is_empty() {
            return Err(DomainError::validation("Web search query cannot be empty"));
        }

        let body = self.build_request(query);
        let response = self
            .client
            .post_json(
                &self.search_url(),
                vec![("Content-Type", "application/json")],
                &body,
            )
            .await?;

        let payload = self.parse_response(response)?;
        debug!(query = %query, bytes = payload.len(), "Web search completed");
        Ok(payload)
    }

    fn provider_name(&self) -> &'static str {
        "tavily"
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    content: String,
    #[serde(default)]
    score: f64,
}
