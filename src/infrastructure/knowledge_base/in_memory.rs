//! In-memory vector index

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::knowledge_base::{
    AddDocumentsResult, KnowledgeBaseId, KnowledgeBaseProvider, KnowledgeDocument, SearchParams,
    SearchResult,
};
use crate::domain::{cosine_similarity, DomainError, EmbeddingProvider};

/// Keeps documents and their embeddings in memory and ranks by cosine similarity
#[derive(Debug)]
pub struct InMemoryKnowledgeBaseProvider {
    id: KnowledgeBaseId,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_model: String,
    documents: RwLock<Vec<StoredDoc>>,
}

#[derive(Debug, Clone)]
struct StoredDoc {
    id: String,
    content: String,
    metadata: HashMap<String, serde_json::Value>,
    source: Option<String>,
    embedding: Vec<f32>,
}

impl InMemoryKnowledgeBaseProvider {
    pub fn new(
        id: KnowledgeBaseId,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            id,
            embedder,
            embedding_model: embedding_model.into(),
            documents: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl KnowledgeBaseProvider for InMemoryKnowledgeBaseProvider {
    fn knowledge_base_id(&self) -> &KnowledgeBaseId {
        &self.id
    }

    fn provider_type(&self) -> &'static str {
        "in_memory"
    }

    async fn search(&self, params: SearchParams) -> Result<Vec<SearchResult>, DomainError> {
        params.validate()?;

        if self.documents.read().await.is_empty() {
            debug!(knowledge_base = %self.id, "Index is empty, skipping query embedding");
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(&self.embedding_model, vec![params.query.clone()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::knowledge_base("Embedding provider returned no vector"))?;

        let docs = self.documents.read().await;

        let mut scored: Vec<(f32, &StoredDoc)> = docs
            .iter()
            .map(|doc| (cosine_similarity(&query_embedding, &doc.embedding), doc))
            .filter(|(score, _)| *score >= params.similarity_threshold)
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(params.top_k as usize);

        debug!(
            knowledge_base = %self.id,
            candidates = docs.len(),
            returned = scored.len(),
            "Vector search completed"
        );

        Ok(scored
            .into_iter()
            .map(|(score, doc)| {
                let mut result = SearchResult::new(&doc.id, &doc.content, score)
                    .with_all_metadata(doc.metadata.clone());
                if let Some(source) = &doc.source {
                    result = result.with_source(source);
                }
                result
            })
            .collect())
    }

    async fn add_documents(
        &self,
        documents: Vec<KnowledgeDocument>,
    ) -> Result<AddDocumentsResult, DomainError> {
        let (valid, rejected): (Vec<_>, Vec<_>) = documents
            .into_iter()
            .partition(|doc| !doc.content.trim().is_empty());

        let errors: Vec<(String, String)> = rejected
            .into_iter()
            .map(|doc| (doc.id, "Document content is empty".to_string()))
            .collect();

        if valid.is_empty() {
            return Ok(AddDocumentsResult::partial(0, errors));
        }

        let embeddings = self
            .embedder
            .embed(
                &self.embedding_model,
                valid.iter().map(|doc| doc.content.clone()).collect(),
            )
            .await?;

        if embeddings.len() != valid.len() {
            return Err(DomainError::knowledge_base(format!(
                "Expected {} embeddings, got {}",
                valid.len(),
                embeddings.len()
            )));
        }

        let added = valid.len();
        let mut docs = self.documents.write().await;

        for (doc, embedding) in valid.into_iter().zip(embeddings) {
            let stored = StoredDoc {
                id: doc.id,
                content: doc.content,
                metadata: doc.metadata,
                source: doc.source,
                embedding,
            };

            match docs.iter_mut().find(|existing| existing.id == stored.id) {
                Some(existing) => *existing = stored,
                None => docs.push(stored),
            }
        }

        Ok(AddDocumentsResult::partial(added, errors))
    }

    async fn document_count(&self) -> Result<usize, DomainError> {
        Ok(self.documents.read().await.len())
    }

    async fn health_check(&self) -> Result<bool, DomainError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::MockEmbeddingProvider;

    fn provider() -> InMemoryKnowledgeBaseProvider {
        InMemoryKnowledgeBaseProvider::new(
            KnowledgeBaseId::new("test-kb").unwrap(),
            Arc::new(MockEmbeddingProvider::new(256)),
            "mock",
        )
    }

    async fn seeded() -> InMemoryKnowledgeBaseProvider {
        let kb = provider();
        kb.add_documents(vec![
            KnowledgeDocument::new("agents", "LLM powered autonomous agents use planning and memory")
                .with_source("https://example.com/agents"),
            KnowledgeDocument::new("prompting", "Prompt engineering steers model behaviour"),
            KnowledgeDocument::new("attacks", "Adversarial attacks on LLMs include jailbreak prompts"),
        ])
        .await
        .unwrap();
        kb
    }

    #[tokio::test]
    async fn test_search_on_empty_index_skips_embedder() {
        let kb = InMemoryKnowledgeBaseProvider::new(
            KnowledgeBaseId::new("empty").unwrap(),
            Arc::new(MockEmbeddingProvider::new(8).with_error("should not be called")),
            "mock",
        );

        let results = kb.search(SearchParams::new("anything")).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_add_and_search_ranks_by_similarity() {
        let kb = seeded().await;

        let results = kb
            .search(SearchParams::new("agents planning memory").with_top_k(2))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "agents");
        assert_eq!(results[0].source.as_deref(), Some("https://example.com/agents"));
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_similarity_threshold_filters() {
        let kb = seeded().await;

        let results = kb
            .search(
                SearchParams::new("agents planning memory")
                    .with_top_k(10)
                    .with_similarity_threshold(0.99),
            )
            .await
            .unwrap();

        assert!(results.iter().all(|r| r.score >= 0.99));
    }

    #[tokio::test]
    async fn test_add_rejects_empty_content_and_replaces_duplicates() {
        let kb = seeded().await;

        let result = kb
            .add_documents(vec![
                KnowledgeDocument::new("blank", "   "),
                KnowledgeDocument::new("prompting", "Chain of thought prompting"),
            ])
            .await
            .unwrap();

        assert_eq!(result.added, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors[0].0, "blank");
        assert_eq!(kb.document_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let kb = provider();
        let results = kb.search(SearchParams::new("anything")).await.unwrap();
        assert!(results.is_empty());
        assert!(kb.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_search_rejects_invalid_params() {
        let kb = provider();
        assert!(matches!(
            kb.search(SearchParams::new("q").with_top_k(0)).await,
            Err(DomainError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let kb = InMemoryKnowledgeBaseProvider::new(
            KnowledgeBaseId::new("broken").unwrap(),
            Arc::new(MockEmbeddingProvider::new(8).with_error("quota")),
            "mock",
        );

        assert!(kb.search(SearchParams::new("q")).await.is_err());
        assert!(
            kb.add_documents(vec![KnowledgeDocument::new("a", "text")])
                .await
                .is_err()
        );
    }
}
