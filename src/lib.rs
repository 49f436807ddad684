//! Corrective RAG pipeline
//!
//! Answers a question from a local corpus, grading every retrieved document
//! for relevance. When no document survives grading the question is
//! rewritten and supplemented with a web search before the answer is
//! generated.

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::crag::{
    CragExecutor, Document, NodeId, PipelineError, PipelineRun, PipelineSettings, PipelineState,
};
pub use infrastructure::crag::{CragPipeline, CragPipelineFactory, PipelineBundle};
