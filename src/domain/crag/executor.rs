//! Run records, observation hooks and the executor trait

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::PipelineError;
use super::graph::NodeId;
use super::ports::{AnswerGenerator, QueryRewriter, RelevanceGrader, Retriever};
use super::state::PipelineState;
use crate::domain::web_search::WebSearchProvider;

/// One node execution within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecution {
    pub node: NodeId,
    pub execution_time_ms: u64,
    /// Size of the document set after the update was folded
    pub documents_after: usize,
    pub question_rewritten: bool,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub state: PipelineState,
    pub trace: Vec<NodeExecution>,
    pub steps: usize,
    pub execution_time_ms: u64,
}

impl PipelineRun {
    pub fn generation(&self) -> Option<&str> {
        self.state.generation.as_deref()
    }

    /// Node ids in execution order
    pub fn path(&self) -> Vec<NodeId> {
        self.trace.iter().map(|e| e.node).collect()
    }
}

/// Receives progress callbacks while a run executes
pub trait RunObserver: Send + Sync {
    fn on_node_start(&self, _node: NodeId) {}

    fn on_node_end(&self, _execution: &NodeExecution, _state: &PipelineState) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Handles to every collaborator a run needs
#[derive(Clone)]
pub struct PipelineComponents {
    pub retriever: Arc<dyn Retriever>,
    pub grader: Arc<dyn RelevanceGrader>,
    pub rewriter: Arc<dyn QueryRewriter>,
    pub web_search: Arc<dyn WebSearchProvider>,
    pub generator: Arc<dyn AnswerGenerator>,
}

impl std::fmt::Debug for PipelineComponents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineComponents")
            .field("web_search", &self.web_search.provider_name())
            .finish_non_exhaustive()
    }
}

/// Runs the corrective RAG pipeline for one question
#[async_trait]
pub trait CragExecutor: Send + Sync {
    async fn run(&self, question: &str) -> Result<PipelineRun, PipelineError>;

    async fn run_observed(
        &self,
        question: &str,
        observer: &dyn RunObserver,
    ) -> Result<PipelineRun, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::crag::Document;

    fn execution(node: NodeId) -> NodeExecution {
        NodeExecution {
            node,
            execution_time_ms: 1,
            documents_after: 0,
            question_rewritten: false,
        }
    }

    #[test]
    fn test_run_accessors() {
        let mut state = PipelineState::new("q");
        state.documents.push(Document::new("ctx"));
        state.generation = Some("answer".to_string());

        let run = PipelineRun {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            state,
            trace: vec![
                execution(NodeId::Retrieve),
                execution(NodeId::GradeDocuments),
                execution(NodeId::Generate),
            ],
            steps: 3,
            execution_time_ms: 3,
        };

        assert_eq!(run.generation(), Some("answer"));
        assert_eq!(
            run.path(),
            vec![NodeId::Retrieve, NodeId::GradeDocuments, NodeId::Generate]
        );

        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["state"]["generation"], "answer");
        assert_eq!(json["trace"][1]["node"], "grade_documents");
    }
}
