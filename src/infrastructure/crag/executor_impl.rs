//! Corrective RAG executor implementation

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use super::nodes::NodeRunner;
use crate::domain::crag::{
    CragExecutor, NodeExecution, NoopObserver, PipelineComponents, PipelineError, PipelineGraph,
    PipelineRun, PipelineSettings, PipelineState, RunObserver, Target,
};
use crate::infrastructure::observability::{record_node_execution, record_run, NodeOutcome};

/// Interprets a [`PipelineGraph`] over the injected collaborators
#[derive(Debug, Clone)]
pub struct CragPipeline {
    components: PipelineComponents,
    graph: PipelineGraph,
    settings: PipelineSettings,
}

impl CragPipeline {
    /// Standard corrective RAG graph with default settings
    pub fn new(components: PipelineComponents) -> Self {
        Self {
            components,
            graph: PipelineGraph::corrective_rag(),
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_graph(mut self, graph: PipelineGraph) -> Self {
        self.graph = graph;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run nodes from the entry until END, folding each update into the state
    async fn execute(
        &self,
        run_id: Uuid,
        question: &str,
        observer: &dyn RunObserver,
    ) -> Result<PipelineRun, PipelineError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let limit = self.settings.recursion_limit;
        let runner = NodeRunner::new(&self.components, self.settings.effective_grading_concurrency());

        let mut state = PipelineState::new(question);
        let mut trace: Vec<NodeExecution> = Vec::new();
        let mut current = self.graph.entry();

        loop {
            if trace.len() >= limit {
                return Err(PipelineError::StepBudgetExceeded {
                    limit,
                    next_node: current,
                });
            }

            observer.on_node_start(current);
            debug!(node = %current, step = trace.len() + 1, "Executing node");

            let node_start = Instant::now();
            let update = match runner.run(current, &state).await {
                Ok(update) => update,
                Err(e) => {
                    record_node_execution(current.as_str(), NodeOutcome::Error, node_start.elapsed());
                    return Err(e);
                }
            };
            let elapsed = node_start.elapsed();

            let question_before = state.question.clone();
            state = state.apply(update);

            let execution = NodeExecution {
                node: current,
                execution_time_ms: elapsed.as_millis() as u64,
                documents_after: state.documents.len(),
                question_rewritten: state.question != question_before,
            };

            record_node_execution(current.as_str(), NodeOutcome::Success, elapsed);
            observer.on_node_end(&execution, &state);
            trace.push(execution);

            match self.graph.next(current, &state)? {
                Target::End => break,
                Target::Node(next) => current = next,
            }
        }

        if state.generation.is_none() {
            return Err(PipelineError::MissingGeneration);
        }

        Ok(PipelineRun {
            run_id,
            started_at,
            steps: trace.len(),
            state,
            trace,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl CragExecutor for CragPipeline {
    async fn run(&self, question: &str) -> Result<PipelineRun, PipelineError> {
        self.run_observed(question, &NoopObserver).await
    }

    async fn run_observed(
        &self,
        question: &str,
        observer: &dyn RunObserver,
    ) -> Result<PipelineRun, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::invalid_input("question cannot be empty"));
        }

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("crag_run", run_id = %run_id);
        let start = Instant::now();

        async {
            info!(question = %question, "Starting corrective RAG run");
            let execution = self.execute(run_id, question, observer);

            let result = match self.settings.timeout_ms {
                Some(timeout_ms) => tokio::time::timeout(Duration::from_millis(timeout_ms), execution)
                    .await
                    .unwrap_or(Err(PipelineError::Timeout { timeout_ms })),
                None => execution.await,
            };

            match &result {
                Ok(run) => {
                    record_run("success", Some(run.steps), start.elapsed());
                    info!(
                        steps = run.steps,
                        execution_time_ms = run.execution_time_ms,
                        documents = run.state.documents.len(),
                        "Corrective RAG run completed"
                    );
                }
                Err(e) => {
                    record_run(e.kind(), None, start.elapsed());
                    warn!(error = %e, "Corrective RAG run failed");
                }
            }

            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::crag::{
        decide_to_generate, AnswerGenerator, Document, MockAnswerGenerator, MockQueryRewriter,
        MockRelevanceGrader, MockRetriever, NodeId, RelevanceGrade, RelevanceGrader, Retriever,
    };
    use crate::domain::web_search::MockWebSearchProvider;
    use crate::domain::DomainError;
    use std::sync::{Arc, Mutex};

    struct Mocks {
        retriever: MockRetriever,
        grader: MockRelevanceGrader,
        rewriter: MockQueryRewriter,
        web_search: MockWebSearchProvider,
        generator: MockAnswerGenerator,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                retriever: MockRetriever::new(),
                grader: MockRelevanceGrader::new(),
                rewriter: MockQueryRewriter::new(),
                web_search: MockWebSearchProvider::new(),
                generator: MockAnswerGenerator::new(),
            }
        }

        fn retrieving(mut self, docs: &'static [&'static str]) -> Self {
            self.retriever
                .expect_retrieve()
                .returning(move |_| Ok(docs.iter().map(|d| Document::new(*d)).collect()));
            self
        }

        fn grading(mut self, relevant: &'static [&'static str]) -> Self {
            self.grader.expect_judge_relevance().returning(move |_, doc| {
                Ok(if relevant.iter().any(|r| *r == doc) {
                    RelevanceGrade::Yes
                } else {
                    RelevanceGrade::No
                })
            });
            self
        }

        fn pipeline(self) -> CragPipeline {
            CragPipeline::new(PipelineComponents {
                retriever: Arc::new(self.retriever),
                grader: Arc::new(self.grader),
                rewriter: Arc::new(self.rewriter),
                web_search: Arc::new(self.web_search),
                generator: Arc::new(self.generator),
            })
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RunObserver for RecordingObserver {
        fn on_node_start(&self, node: NodeId) {
            self.events.lock().unwrap().push(format!("start:{}", node));
        }

        fn on_node_end(&self, execution: &NodeExecution, _state: &PipelineState) {
            self.events
                .lock()
                .unwrap()
                .push(format!("end:{}:{}", execution.node, execution.documents_after));
        }
    }

    #[tokio::test]
    async fn test_direct_answer_path() {
        let mut mocks = Mocks::new()
            .retrieving(&["d1", "d2", "d3", "d4"])
            .grading(&["d2", "d3"]);
        mocks.rewriter.expect_rewrite_query().never();
        mocks.web_search.expect_search().never();
        mocks
            .generator
            .expect_generate_answer()
            .withf(|_, context| context == "d2\n\nd3")
            .times(1)
            .returning(|_, _| Ok("A".to_string()));

        let run = mocks.pipeline().run("What is agent memory?").await.unwrap();

        assert_eq!(run.generation(), Some("A"));
        assert_eq!(
            run.path(),
            vec![NodeId::Retrieve, NodeId::GradeDocuments, NodeId::Generate]
        );
        assert_eq!(run.steps, 3);
        assert_eq!(run.state.question, "What is agent memory?");
    }

    #[tokio::test]
    async fn test_corrective_path_when_nothing_is_relevant() {
        let mut mocks = Mocks::new().retrieving(&["d1", "d2"]).grading(&[]);
        mocks
            .rewriter
            .expect_rewrite_query()
            .withf(|q| q == "Q")
            .times(1)
            .returning(|_| Ok("Q'".to_string()));
        mocks
            .web_search
            .expect_search()
            .withf(|q| q == "Q'")
            .times(1)
            .returning(|_| Ok("W".to_string()));
        mocks
            .generator
            .expect_generate_answer()
            .withf(|q, context| q == "Q'" && context == "W")
            .times(1)
            .returning(|_, _| Ok("B".to_string()));

        let observer = RecordingObserver::default();
        let run = mocks.pipeline().run_observed("Q", &observer).await.unwrap();

        assert_eq!(run.generation(), Some("B"));
        assert_eq!(run.state.question, "Q'");
        assert_eq!(run.state.documents.len(), 1);
        assert_eq!(run.state.documents[0].source(), Some("web_search"));
        assert_eq!(
            run.path(),
            vec![
                NodeId::Retrieve,
                NodeId::GradeDocuments,
                NodeId::TransformQuery,
                NodeId::WebSearch,
                NodeId::Generate
            ]
        );
        assert!(run.trace[2].question_rewritten);
        assert!(!run.trace[3].question_rewritten);

        let events = observer.events.lock().unwrap().clone();
        assert_eq!(events[0], "start:retrieve");
        assert_eq!(events[1], "end:retrieve:2");
        assert_eq!(events[3], "end:grade_documents:0");
        assert_eq!(events.len(), 10);
    }

    #[tokio::test]
    async fn test_empty_retrieval_takes_corrective_path() {
        let mut mocks = Mocks::new().retrieving(&[]);
        mocks.grader.expect_judge_relevance().never();
        mocks
            .rewriter
            .expect_rewrite_query()
            .returning(|_| Ok("better".to_string()));
        mocks
            .web_search
            .expect_search()
            .returning(|_| Ok("web".to_string()));
        mocks
            .generator
            .expect_generate_answer()
            .returning(|_, _| Ok("C".to_string()));

        let run = mocks.pipeline().run("Q").await.unwrap();

        assert_eq!(run.generation(), Some("C"));
        assert_eq!(run.steps, 5);
    }

    #[tokio::test]
    async fn test_malformed_verdict_drops_document_only() {
        let mut mocks = Mocks::new().retrieving(&["d1", "d2"]);
        mocks.grader.expect_judge_relevance().returning(|_, doc| match doc {
            "d1" => Err(DomainError::malformed_response("grader", "garbage")),
            _ => Ok(RelevanceGrade::Yes),
        });
        mocks
            .generator
            .expect_generate_answer()
            .withf(|_, context| context == "d2")
            .returning(|_, _| Ok("D".to_string()));

        let run = mocks.pipeline().run("Q").await.unwrap();

        assert_eq!(run.generation(), Some("D"));
        assert_eq!(run.steps, 3);
    }

    #[tokio::test]
    async fn test_retriever_failure_aborts_run() {
        let mut mocks = Mocks::new();
        mocks
            .retriever
            .expect_retrieve()
            .returning(|_| Err(DomainError::knowledge_base("index offline")));
        mocks.grader.expect_judge_relevance().never();
        mocks.generator.expect_generate_answer().never();

        let error = mocks.pipeline().run("Q").await.unwrap_err();

        match error {
            PipelineError::Adapter { node, source } => {
                assert_eq!(node, NodeId::Retrieve);
                assert_eq!(source.to_string(), "Knowledge base error: index offline");
            }
            other => panic!("expected adapter failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_web_search_failure_aborts_run() {
        let mut mocks = Mocks::new().retrieving(&["d1"]).grading(&[]);
        mocks
            .rewriter
            .expect_rewrite_query()
            .returning(|q| Ok(q.to_string()));
        mocks
            .web_search
            .expect_search()
            .returning(|_| Err(DomainError::provider("tavily", "HTTP 401")));
        mocks.generator.expect_generate_answer().never();

        let error = mocks.pipeline().run("Q").await.unwrap_err();
        assert!(matches!(
            error,
            PipelineError::Adapter {
                node: NodeId::WebSearch,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected_before_start() {
        let mut mocks = Mocks::new();
        mocks.retriever.expect_retrieve().never();

        let error = mocks.pipeline().run("   ").await.unwrap_err();
        assert!(matches!(error, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_step_budget_on_cyclic_graph() {
        let mut mocks = Mocks::new().retrieving(&["d1"]).grading(&[]);
        mocks
            .rewriter
            .expect_rewrite_query()
            .returning(|q| Ok(format!("{}+", q)));
        mocks
            .web_search
            .expect_search()
            .returning(|_| Ok("web".to_string()));

        let looping = PipelineGraph::builder()
            .set_entry(NodeId::Retrieve)
            .add_edge(NodeId::Retrieve, Target::Node(NodeId::GradeDocuments))
            .add_conditional_edge(NodeId::GradeDocuments, decide_to_generate)
            .add_edge(NodeId::TransformQuery, Target::Node(NodeId::WebSearch))
            .add_edge(NodeId::WebSearch, Target::Node(NodeId::TransformQuery))
            .add_edge(NodeId::Generate, Target::End)
            .build()
            .unwrap();

        let error = mocks
            .pipeline()
            .with_graph(looping)
            .with_settings(PipelineSettings::default().with_recursion_limit(7))
            .run("Q")
            .await
            .unwrap_err();

        match error {
            PipelineError::StepBudgetExceeded { limit, next_node } => {
                assert_eq!(limit, 7);
                assert_eq!(next_node, NodeId::WebSearch);
            }
            other => panic!("expected step budget error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_standard_run_fits_small_budget() {
        let mut mocks = Mocks::new().retrieving(&["d1"]).grading(&[]);
        mocks
            .rewriter
            .expect_rewrite_query()
            .returning(|_| Ok("q2".to_string()));
        mocks
            .web_search
            .expect_search()
            .returning(|_| Ok("web".to_string()));
        mocks
            .generator
            .expect_generate_answer()
            .returning(|_, _| Ok("E".to_string()));

        let run = mocks
            .pipeline()
            .with_settings(PipelineSettings::default().with_recursion_limit(5))
            .run("Q")
            .await
            .unwrap();
        assert_eq!(run.steps, 5);
    }

    struct SlowRetriever;

    #[async_trait]
    impl Retriever for SlowRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Document>, DomainError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let mocks = Mocks::new();
        let pipeline = CragPipeline::new(PipelineComponents {
            retriever: Arc::new(SlowRetriever),
            grader: Arc::new(mocks.grader),
            rewriter: Arc::new(mocks.rewriter),
            web_search: Arc::new(mocks.web_search),
            generator: Arc::new(mocks.generator),
        })
        .with_settings(PipelineSettings::default().with_timeout_ms(20));

        let error = pipeline.run("Q").await.unwrap_err();
        assert!(matches!(error, PipelineError::Timeout { timeout_ms: 20 }));
    }

    /// Later documents finish first; output must still follow input order
    struct StaggeredGrader;

    #[async_trait]
    impl RelevanceGrader for StaggeredGrader {
        async fn judge_relevance(
            &self,
            _question: &str,
            document: &str,
        ) -> Result<RelevanceGrade, DomainError> {
            let index: u64 = document.trim_start_matches('d').parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(40 - index * 10)).await;
            Ok(RelevanceGrade::Yes)
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        async fn generate_answer(&self, _question: &str, context: &str) -> Result<String, DomainError> {
            Ok(context.replace("\n\n", ","))
        }
    }

    #[tokio::test]
    async fn test_concurrent_grading_preserves_order() {
        let mocks = Mocks::new().retrieving(&["d0", "d1", "d2", "d3"]);
        let pipeline = CragPipeline::new(PipelineComponents {
            retriever: Arc::new(mocks.retriever),
            grader: Arc::new(StaggeredGrader),
            rewriter: Arc::new(mocks.rewriter),
            web_search: Arc::new(mocks.web_search),
            generator: Arc::new(EchoGenerator),
        })
        .with_settings(PipelineSettings::default().with_grading_concurrency(4));

        let run = pipeline.run("Q").await.unwrap();
        assert_eq!(run.generation(), Some("d0,d1,d2,d3"));
    }

    #[tokio::test]
    async fn test_basic_graph_skips_grading_and_fallback() {
        let mut mocks = Mocks::new().retrieving(&["d1", "d2"]);
        mocks.grader.expect_judge_relevance().never();
        mocks.rewriter.expect_rewrite_query().never();
        mocks.web_search.expect_search().never();
        mocks
            .generator
            .expect_generate_answer()
            .withf(|q, context| q == "Q" && context == "d1\n\nd2")
            .times(1)
            .returning(|_, _| Ok("G".to_string()));

        let run = mocks
            .pipeline()
            .with_graph(PipelineGraph::basic_rag())
            .run("Q")
            .await
            .unwrap();

        assert_eq!(run.generation(), Some("G"));
        assert_eq!(run.path(), vec![NodeId::Retrieve, NodeId::Generate]);
    }

    #[tokio::test]
    async fn test_run_record_serializes() {
        let mut mocks = Mocks::new().retrieving(&["d1"]).grading(&["d1"]);
        mocks
            .generator
            .expect_generate_answer()
            .returning(|_, _| Ok("F".to_string()));

        let run = mocks.pipeline().run("Q").await.unwrap();
        let json = serde_json::to_value(&run).unwrap();

        assert_eq!(json["state"]["generation"], "F");
        assert_eq!(json["steps"], 3);
        assert!(json["run_id"].is_string());
    }
}
