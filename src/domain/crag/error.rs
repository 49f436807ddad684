use thiserror::Error;

use super::graph::NodeId;
use crate::domain::DomainError;

/// Errors that end a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Node '{node}' failed: {source}")]
    Adapter {
        node: NodeId,
        #[source]
        source: DomainError,
    },

    /// `next_node` is the node that would have run once the budget was spent
    #[error("Step budget of {limit} exceeded before running {next_node}")]
    StepBudgetExceeded { limit: usize, next_node: NodeId },

    #[error("Pipeline timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid pipeline graph: {0}")]
    InvalidGraph(String),

    #[error("Pipeline finished without a generation")]
    MissingGeneration,
}

impl PipelineError {
    pub fn adapter(node: NodeId, source: DomainError) -> Self {
        Self::Adapter { node, source }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_graph(message: impl Into<String>) -> Self {
        Self::InvalidGraph(message.into())
    }

    /// Label used for the run outcome metric
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Adapter { .. } => "adapter_failure",
            Self::StepBudgetExceeded { .. } => "step_budget_exceeded",
            Self::Timeout { .. } => "timeout",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidGraph(_) => "invalid_graph",
            Self::MissingGeneration => "missing_generation",
        }
    }
}
