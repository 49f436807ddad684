//! Corrective RAG domain
//!
//! A bounded five-node graph: retrieve candidates, grade them, and either
//! answer directly or rewrite the question and search the web before
//! answering. State is threaded through every node and merged with a fixed
//! per-channel reducer table.

mod config;
mod document;
mod error;
mod executor;
mod graph;
mod ports;
mod state;

pub use config::{
    PipelineSettings, PromptSet, PromptSettings, DEFAULT_GENERATION_PROMPT,
    DEFAULT_GRADING_CONCURRENCY, DEFAULT_GRADING_PROMPT, DEFAULT_RECURSION_LIMIT,
    DEFAULT_REWRITE_PROMPT,
};
pub use document::{Document, DocumentOrigin, ORIGIN_KEY, SOURCE_KEY};
pub use error::PipelineError;
pub use executor::{
    CragExecutor, NodeExecution, NoopObserver, PipelineComponents, PipelineRun, RunObserver,
};
pub use graph::{
    decide_to_generate, Edge, GenerateDecision, NodeId, PipelineGraph, PipelineGraphBuilder,
    Router, Target,
};
pub use ports::{AnswerGenerator, QueryRewriter, RelevanceGrade, RelevanceGrader, Retriever};
pub use state::{Channel, MergeStrategy, PipelineState, StateUpdate, CHANNELS};

#[cfg(test)]
pub use ports::{MockAnswerGenerator, MockQueryRewriter, MockRelevanceGrader, MockRetriever};
