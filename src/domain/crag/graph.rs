//! Pipeline topology: the nodes, their edges and the one conditional router

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::state::PipelineState;

/// The closed set of steps a run can execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Retrieve,
    GradeDocuments,
    Generate,
    TransformQuery,
    WebSearch,
}

impl NodeId {
    pub const ALL: [NodeId; 5] = [
        NodeId::Retrieve,
        NodeId::GradeDocuments,
        NodeId::Generate,
        NodeId::TransformQuery,
        NodeId::WebSearch,
    ];

    /// Name used in logs, metrics and the CLI trace
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retrieve => "retrieve",
            Self::GradeDocuments => "grade_documents",
            Self::Generate => "generate",
            Self::TransformQuery => "transform_query",
            Self::WebSearch => "web_search",
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an edge leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Node(NodeId),
    End,
}

/// Outcome of [`decide_to_generate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateDecision {
    /// At least one relevant document survived grading
    Generate,
    /// Nothing survived; repair the query and search the web
    TransformQuery,
}

impl GenerateDecision {
    pub fn target(self) -> Target {
        match self {
            Self::Generate => Target::Node(NodeId::Generate),
            Self::TransformQuery => Target::Node(NodeId::TransformQuery),
        }
    }
}

/// Route after grading, based only on how many documents are left
pub fn decide_to_generate(state: &PipelineState) -> GenerateDecision {
    if state.documents.is_empty() {
        GenerateDecision::TransformQuery
    } else {
        GenerateDecision::Generate
    }
}

/// Router signature for conditional edges
pub type Router = fn(&PipelineState) -> GenerateDecision;

/// Outgoing edge of a node
#[derive(Clone, Copy)]
pub enum Edge {
    Direct(Target),
    Conditional(Router),
}

impl Edge {
    /// Resolve the next target against the folded state
    pub fn next(&self, state: &PipelineState) -> Target {
        match self {
            Self::Direct(target) => *target,
            Self::Conditional(router) => router(state).target(),
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(target) => f.debug_tuple("Direct").field(target).finish(),
            Self::Conditional(_) => f.write_str("Conditional(<router>)"),
        }
    }
}

/// A validated pipeline graph
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    entry: NodeId,
    edges: HashMap<NodeId, Edge>,
}

impl PipelineGraph {
    pub fn builder() -> PipelineGraphBuilder {
        PipelineGraphBuilder::default()
    }

    /// The corrective RAG topology
    ///
    /// ```text
    /// START -> retrieve -> grade_documents -+-> generate -> END
    ///                                       |       ^
    ///                                       v       |
    ///                           transform_query -> web_search
    /// ```
    pub fn corrective_rag() -> Self {
        Self {
            entry: NodeId::Retrieve,
            edges: HashMap::from([
                (NodeId::Retrieve, Edge::Direct(Target::Node(NodeId::GradeDocuments))),
                (NodeId::GradeDocuments, Edge::Conditional(decide_to_generate)),
                (NodeId::TransformQuery, Edge::Direct(Target::Node(NodeId::WebSearch))),
                (NodeId::WebSearch, Edge::Direct(Target::Node(NodeId::Generate))),
                (NodeId::Generate, Edge::Direct(Target::End)),
            ]),
        }
    }

    /// Plain retrieve-then-generate: no grading and no web fallback
    ///
    /// ```text
    /// START -> retrieve -> generate -> END
    /// ```
    pub fn basic_rag() -> Self {
        Self {
            entry: NodeId::Retrieve,
            edges: HashMap::from([
                (NodeId::Retrieve, Edge::Direct(Target::Node(NodeId::Generate))),
                (NodeId::Generate, Edge::Direct(Target::End)),
            ]),
        }
    }

    pub fn entry(&self) -> NodeId {
        self.entry
    }

    pub fn edge(&self, node: NodeId) -> Option<&Edge> {
        self.edges.get(&node)
    }

    /// Next target after `node`, given the state folded after it ran
    pub fn next(&self, node: NodeId, state: &PipelineState) -> Result<Target, PipelineError> {
        self.edges
            .get(&node)
            .map(|edge| edge.next(state))
            .ok_or_else(|| PipelineError::invalid_graph(format!("node '{}' has no outgoing edge", node)))
    }
}

impl Default for PipelineGraph {
    fn default() -> Self {
        Self::corrective_rag()
    }
}

/// Builder for [`PipelineGraph`]
#[derive(Debug, Default)]
pub struct PipelineGraphBuilder {
    entry: Option<NodeId>,
    edges: HashMap<NodeId, Edge>,
    duplicates: Vec<NodeId>,
}

impl PipelineGraphBuilder {
    pub fn set_entry(mut self, node: NodeId) -> Self {
        self.entry = Some(node);
        self
    }

    pub fn add_edge(self, from: NodeId, to: Target) -> Self {
        self.insert(from, Edge::Direct(to))
    }

    pub fn add_conditional_edge(self, from: NodeId, router: Router) -> Self {
        self.insert(from, Edge::Conditional(router))
    }

    fn insert(mut self, from: NodeId, edge: Edge) -> Self {
        if self.edges.insert(from, edge).is_some() {
            self.duplicates.push(from);
        }
        self
    }

    /// Validate that every node reachable from the entry has exactly one outgoing edge
    pub fn build(self) -> Result<PipelineGraph, PipelineError> {
        let entry = self
            .entry
            .ok_or_else(|| PipelineError::invalid_graph("no entry node set"))?;

        if let Some(node) = self.duplicates.first() {
            return Err(PipelineError::invalid_graph(format!(
                "node '{}' has more than one outgoing edge",
                node
            )));
        }

        let mut visited = HashSet::new();
        let mut pending = vec![entry];

        while let Some(node) = pending.pop() {
            if !visited.insert(node) {
                continue;
            }

            let edge = self.edges.get(&node).ok_or_else(|| {
                PipelineError::invalid_graph(format!("node '{}' has no outgoing edge", node))
            })?;

            match edge {
                Edge::Direct(Target::Node(next)) => pending.push(*next),
                Edge::Direct(Target::End) => {}
                Edge::Conditional(_) => {
                    for decision in [GenerateDecision::Generate, GenerateDecision::TransformQuery] {
                        if let Target::Node(next) = decision.target() {
                            pending.push(next);
                        }
                    }
                }
            }
        }

        Ok(PipelineGraph {
            entry,
            edges: self.edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::crag::Document;

    fn standard_builder() -> PipelineGraphBuilder {
        PipelineGraph::builder()
            .set_entry(NodeId::Retrieve)
            .add_edge(NodeId::Retrieve, Target::Node(NodeId::GradeDocuments))
            .add_conditional_edge(NodeId::GradeDocuments, decide_to_generate)
            .add_edge(NodeId::TransformQuery, Target::Node(NodeId::WebSearch))
            .add_edge(NodeId::WebSearch, Target::Node(NodeId::Generate))
            .add_edge(NodeId::Generate, Target::End)
    }

    #[test]
    fn test_decide_to_generate() {
        let mut state = PipelineState::new("q");
        assert_eq!(decide_to_generate(&state), GenerateDecision::TransformQuery);

        state.documents.push(Document::new("relevant"));
        assert_eq!(decide_to_generate(&state), GenerateDecision::Generate);
    }

    #[test]
    fn test_corrective_rag_edges() {
        let graph = PipelineGraph::corrective_rag();
        let empty = PipelineState::new("q");
        let mut graded = PipelineState::new("q");
        graded.documents.push(Document::new("d"));

        assert_eq!(graph.entry(), NodeId::Retrieve);
        assert_eq!(
            graph.next(NodeId::Retrieve, &empty).unwrap(),
            Target::Node(NodeId::GradeDocuments)
        );
        assert_eq!(
            graph.next(NodeId::GradeDocuments, &empty).unwrap(),
            Target::Node(NodeId::TransformQuery)
        );
        assert_eq!(
            graph.next(NodeId::GradeDocuments, &graded).unwrap(),
            Target::Node(NodeId::Generate)
        );
        assert_eq!(
            graph.next(NodeId::TransformQuery, &empty).unwrap(),
            Target::Node(NodeId::WebSearch)
        );
        assert_eq!(
            graph.next(NodeId::WebSearch, &empty).unwrap(),
            Target::Node(NodeId::Generate)
        );
        assert_eq!(graph.next(NodeId::Generate, &empty).unwrap(), Target::End);
    }

    #[test]
    fn test_basic_rag_edges() {
        let graph = PipelineGraph::basic_rag();
        let state = PipelineState::new("q");

        assert_eq!(graph.entry(), NodeId::Retrieve);
        assert_eq!(
            graph.next(NodeId::Retrieve, &state).unwrap(),
            Target::Node(NodeId::Generate)
        );
        assert_eq!(graph.next(NodeId::Generate, &state).unwrap(), Target::End);
        assert!(graph.edge(NodeId::GradeDocuments).is_none());

        let built = PipelineGraph::builder()
            .set_entry(NodeId::Retrieve)
            .add_edge(NodeId::Retrieve, Target::Node(NodeId::Generate))
            .add_edge(NodeId::Generate, Target::End)
            .build();
        assert!(built.is_ok());
    }

    #[test]
    fn test_builder_matches_standard_graph() {
        let graph = standard_builder().build().unwrap();
        for node in NodeId::ALL {
            assert!(graph.edge(node).is_some(), "missing edge for {}", node);
        }
    }

    #[test]
    fn test_builder_rejects_missing_edge() {
        let result = PipelineGraph::builder()
            .set_entry(NodeId::Retrieve)
            .add_edge(NodeId::Retrieve, Target::Node(NodeId::GradeDocuments))
            .add_conditional_edge(NodeId::GradeDocuments, decide_to_generate)
            .add_edge(NodeId::TransformQuery, Target::Node(NodeId::WebSearch))
            .add_edge(NodeId::Generate, Target::End)
            .build();

        match result {
            Err(PipelineError::InvalidGraph(message)) => assert!(message.contains("web_search")),
            other => panic!("expected InvalidGraph, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_rejects_missing_entry() {
        assert!(matches!(
            PipelineGraph::builder()
                .add_edge(NodeId::Generate, Target::End)
                .build(),
            Err(PipelineError::InvalidGraph(_))
        ));
    }

    #[test]
    fn test_builder_rejects_duplicate_edge() {
        let result = standard_builder()
            .add_edge(NodeId::Generate, Target::Node(NodeId::Retrieve))
            .build();
        assert!(matches!(result, Err(PipelineError::InvalidGraph(_))));
    }

    #[test]
    fn test_unreachable_nodes_need_no_edges() {
        let graph = PipelineGraph::builder()
            .set_entry(NodeId::Generate)
            .add_edge(NodeId::Generate, Target::End)
            .build()
            .unwrap();
        assert_eq!(graph.entry(), NodeId::Generate);
    }
}
