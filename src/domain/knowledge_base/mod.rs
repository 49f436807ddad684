//! Knowledge base domain - vector index abstraction used for retrieval

mod entity;
mod provider;
mod validation;

pub use entity::{KnowledgeBaseId, SearchResult};
pub use provider::{AddDocumentsResult, KnowledgeBaseProvider, KnowledgeDocument, SearchParams};
pub use validation::{
    validate_knowledge_base_id, validate_similarity_threshold, validate_top_k,
    KnowledgeBaseValidationError, MAX_KB_ID_LENGTH, MAX_TOP_K,
};

#[cfg(test)]
pub use provider::mock::MockKnowledgeBaseProvider;
