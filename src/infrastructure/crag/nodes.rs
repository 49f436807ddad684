//! The five pipeline steps
//!
//! Each step reads the folded state and returns a partial update; none of
//! them mutates the state it is given.

use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::domain::crag::{
    Document, NodeId, PipelineComponents, PipelineError, PipelineState, StateUpdate,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_document_graded;

/// Separator placed between documents in the generation context
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Dispatches a node id to its implementation
pub(crate) struct NodeRunner<'a> {
    components: &'a PipelineComponents,
    grading_concurrency: usize,
}

impl<'a> NodeRunner<'a> {
    pub(crate) fn new(components: &'a PipelineComponents, grading_concurrency: usize) -> Self {
        Self {
            components,
            grading_concurrency: grading_concurrency.max(1),
        }
    }

    pub(crate) async fn run(
        &self,
        node: NodeId,
        state: &PipelineState,
    ) -> Result<StateUpdate, PipelineError> {
        match node {
            NodeId::Retrieve => self.retrieve(state).await,
            NodeId::GradeDocuments => self.grade_documents(state).await,
            NodeId::Generate => self.generate(state).await,
            NodeId::TransformQuery => self.transform_query(state).await,
            NodeId::WebSearch => self.web_search(state).await,
        }
    }

    async fn retrieve(&self, state: &PipelineState) -> Result<StateUpdate, PipelineError> {
        let documents = self
            .components
            .retriever
            .retrieve(&state.question)
            .await
            .map_err(|e| PipelineError::adapter(NodeId::Retrieve, e))?;

        debug!(count = documents.len(), "Retrieved documents");
        Ok(StateUpdate::new().with_documents(documents))
    }

    /// Keep the documents judged relevant, in their original order
    ///
    /// Up to `grading_concurrency` judgments run at once. A malformed verdict
    /// drops its document; any other grader error aborts the step.
    async fn grade_documents(&self, state: &PipelineState) -> Result<StateUpdate, PipelineError> {
        let question = state.question.as_str();
        let grader = &self.components.grader;
        let total = state.documents.len();

        let judgments: Vec<_> = state
            .documents
            .iter()
            .enumerate()
            .map(|(index, document)| async move {
                match grader.judge_relevance(question, &document.page_content).await {
                    Ok(grade) => {
                        record_document_graded(grade.as_str());
                        debug!(index, grade = grade.as_str(), "Graded document");
                        Ok(grade.is_relevant().then(|| document.clone()))
                    }
                    Err(e) if e.is_malformed() => {
                        record_document_graded("malformed");
                        warn!(index, error = %e, "Dropping document with malformed relevance verdict");
                        Ok(None)
                    }
                    Err(e) => Err(PipelineError::adapter(NodeId::GradeDocuments, e)),
                }
            })
            .collect();

        let verdicts: Vec<Option<Document>> = stream::iter(judgments)
            .buffered(self.grading_concurrency)
            .try_collect()
            .await?;

        let relevant: Vec<Document> = verdicts.into_iter().flatten().collect();

        info!(total, relevant = relevant.len(), "Graded documents");
        Ok(StateUpdate::new().with_documents(relevant))
    }

    async fn transform_query(&self, state: &PipelineState) -> Result<StateUpdate, PipelineError> {
        let rewritten = self
            .components
            .rewriter
            .rewrite_query(&state.question)
            .await
            .map_err(|e| PipelineError::adapter(NodeId::TransformQuery, e))?
            .trim()
            .to_string();

        if rewritten.is_empty() {
            warn!("Query rewriter returned nothing, keeping the original question");
        } else {
            info!(original = %state.question, rewritten = %rewritten, "Rewrote question");
        }

        Ok(StateUpdate::new().with_question(rewritten))
    }

    async fn web_search(&self, state: &PipelineState) -> Result<StateUpdate, PipelineError> {
        let payload = self
            .components
            .web_search
            .search(&state.question)
            .await
            .map_err(|e| PipelineError::adapter(NodeId::WebSearch, e))?;

        let mut documents = state.documents.clone();
        documents.push(Document::web_search(payload, &state.question));

        debug!(count = documents.len(), "Appended web search result");
        Ok(StateUpdate::new().with_documents(documents))
    }

    async fn generate(&self, state: &PipelineState) -> Result<StateUpdate, PipelineError> {
        let context = state
            .documents
            .iter()
            .map(|d| d.page_content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        let answer = self
            .components
            .generator
            .generate_answer(&state.question, &context)
            .await
            .map_err(|e| PipelineError::adapter(NodeId::Generate, e))?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(PipelineError::adapter(
                NodeId::Generate,
                DomainError::provider("generator", "Generator returned an empty answer"),
            ));
        }

        Ok(StateUpdate::new().with_generation(answer))
    }
}
