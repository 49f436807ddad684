//! Retriever over a knowledge base provider

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::crag::{Document, Retriever};
use crate::domain::knowledge_base::{KnowledgeBaseProvider, SearchParams};
use crate::domain::DomainError;

/// Runs a similarity search and converts the hits into pipeline documents
#[derive(Debug, Clone)]
pub struct KnowledgeBaseRetriever {
    knowledge_base: Arc<dyn KnowledgeBaseProvider>,
    top_k: u32,
    similarity_threshold: f32,
}

impl KnowledgeBaseRetriever {
    pub fn new(knowledge_base: Arc<dyn KnowledgeBaseProvider>) -> Self {
        Self {
            knowledge_base,
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
}

#[async_trait]
impl Retriever for KnowledgeBaseRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, DomainError> {
        let params = SearchParams::new(query)
            .with_top_k(self.top_k)
            .with_similarity_threshold(self.similarity_threshold);

        let results = self.knowledge_base.search(params).await?;

        Ok(results.into_iter().map(Document::from_search_result).collect())
    }
}
