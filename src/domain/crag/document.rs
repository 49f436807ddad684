//! Documents flowing through the pipeline

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::knowledge_base::SearchResult;

/// Metadata key holding where the text came from (URL, path, `web_search`)
pub const SOURCE_KEY: &str = "source";
/// Metadata key distinguishing index hits from web search payloads
pub const ORIGIN_KEY: &str = "origin";

/// Where a document entered the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOrigin {
    VectorStore,
    WebSearch,
}

impl DocumentOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VectorStore => "vector_store",
            Self::WebSearch => "web_search",
        }
    }
}

/// A unit of retrieved text plus descriptive metadata
///
/// Documents are never mutated once produced; nodes build new lists instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Convert an index hit, keeping its metadata and recording score and id
    pub fn from_search_result(result: SearchResult) -> Self {
        let source = result
            .source
            .clone()
            .or_else(|| {
                result
                    .metadata
                    .get(SOURCE_KEY)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| result.id.clone());

        let mut metadata = result.metadata;
        metadata.insert("id".to_string(), serde_json::json!(result.id));
        metadata.insert("score".to_string(), serde_json::json!(result.score));
        metadata.insert(SOURCE_KEY.to_string(), serde_json::json!(source));
        metadata.insert(
            ORIGIN_KEY.to_string(),
            serde_json::json!(DocumentOrigin::VectorStore.as_str()),
        );

        Self {
            page_content: result.content,
            metadata,
        }
    }

    /// Wrap a web search payload for the given query
    pub fn web_search(payload: impl Into<String>, query: &str) -> Self {
        Self::new(payload)
            .with_metadata(SOURCE_KEY, serde_json::json!("web_search"))
            .with_metadata(
                ORIGIN_KEY,
                serde_json::json!(DocumentOrigin::WebSearch.as_str()),
            )
            .with_metadata("query", serde_json::json!(query))
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(|v| v.as_str())
    }

    pub fn origin(&self) -> Option<DocumentOrigin> {
        match self.metadata.get(ORIGIN_KEY).and_then(|v| v.as_str()) {
            Some("vector_store") => Some(DocumentOrigin::VectorStore),
            Some("web_search") => Some(DocumentOrigin::WebSearch),
            _ => None,
        }
    }
}
