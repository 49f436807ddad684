//! Corrective RAG infrastructure: LLM-backed collaborators, the node steps
//! and the graph interpreter

mod executor_impl;
mod factory;
mod kb_retriever;
mod llm_generator;
mod llm_grader;
mod llm_rewriter;
mod nodes;

pub use crate::config::LlmStepConfig;
pub use executor_impl::CragPipeline;
pub use factory::{CragPipelineFactory, PipelineBundle};
pub use kb_retriever::KnowledgeBaseRetriever;
pub use llm_generator::LlmAnswerGenerator;
pub use llm_grader::LlmRelevanceGrader;
pub use llm_rewriter::LlmQueryRewriter;
pub use nodes::CONTEXT_SEPARATOR;
