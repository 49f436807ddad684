//! Knowledge base provider trait

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;

use super::entity::{KnowledgeBaseId, SearchResult};
use super::validation::{validate_similarity_threshold, validate_top_k};
use crate::domain::error::DomainError;

/// Document to be indexed in a knowledge base
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeDocument {
    pub id: String,
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub source: Option<String>,
}

impl KnowledgeDocument {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
            source: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_all_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Search parameters for knowledge base queries
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub query: String,
    /// Maximum number of results to return
    pub top_k: u32,
    /// Results scoring below this are discarded
    pub similarity_threshold: f32,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: 4,
            similarity_threshold: 0.0,
        }
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Check bounds before the query reaches a backend
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.query.trim().is_empty() {
            return Err(DomainError::validation("Search query cannot be empty"));
        }
        validate_top_k(self.top_k).map_err(|e| DomainError::validation(e.to_string()))?;
        validate_similarity_threshold(self.similarity_threshold)
            .map_err(|e| DomainError::validation(e.to_string()))?;
        Ok(())
    }
}

/// Result of adding documents to a knowledge base
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddDocumentsResult {
    pub added: usize,
    pub failed: usize,
    /// `(document id, error message)` per rejected document
    pub errors: Vec<(String, String)>,
}

impl AddDocumentsResult {
    pub fn success(added: usize) -> Self {
        Self {
            added,
            failed: 0,
            errors: Vec::new(),
        }
    }

    pub fn partial(added: usize, errors: Vec<(String, String)>) -> Self {
        Self {
            added,
            failed: errors.len(),
            errors,
        }
    }
}

/// Provider trait for vector index backends
#[async_trait]
pub trait KnowledgeBaseProvider: Send + Sync + Debug {
    fn knowledge_base_id(&self) -> &KnowledgeBaseId;

    fn provider_type(&self) -> &'static str;

    /// Rank indexed documents against the query, best first
    async fn search(&self, params: SearchParams) -> Result<Vec<SearchResult>, DomainError>;

    async fn add_documents(
        &self,
        documents: Vec<KnowledgeDocument>,
    ) -> Result<AddDocumentsResult, DomainError>;

    async fn document_count(&self) -> Result<usize, DomainError>;

    async fn health_check(&self) -> Result<bool, DomainError>;
}
