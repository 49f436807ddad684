//! Domain layer - Core types and traits of the corrective RAG pipeline

pub mod crag;
pub mod embedding;
pub mod error;
pub mod knowledge_base;
pub mod llm;
pub mod prompt;
pub mod web_search;

pub use crag::{
    Document, NodeId, PipelineError, PipelineGraph, PipelineRun, PipelineSettings, PipelineState,
    StateUpdate,
};
pub use embedding::{cosine_similarity, EmbeddingProvider};
pub use error::DomainError;
pub use knowledge_base::{
    KnowledgeBaseId, KnowledgeBaseProvider, KnowledgeDocument, SearchParams, SearchResult,
};
pub use llm::{LlmProvider, LlmRequest, LlmResponse, Message, MessageRole};
pub use prompt::{PromptTemplate, TemplateError};
pub use web_search::WebSearchProvider;
