//! Pipeline metrics
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding application installs a recorder.

use std::time::Duration;

use metrics::{counter, histogram};

/// Result label for a node execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    Success,
    Error,
}

impl NodeOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Record one node execution and how long it took
pub fn record_node_execution(node: &str, outcome: NodeOutcome, duration: Duration) {
    let labels = [
        ("node", node.to_string()),
        ("status", outcome.as_str().to_string()),
    ];

    counter!("crag_node_executions_total", &labels).increment(1);
    histogram!("crag_node_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record a grading verdict: `yes`, `no` or `malformed`
pub fn record_document_graded(verdict: &'static str) {
    counter!("crag_documents_graded_total", "verdict" => verdict).increment(1);
}

/// Record the end of a run; `outcome` is `success` or an error kind
///
/// `steps` is only known for completed runs and is left out otherwise.
pub fn record_run(outcome: &'static str, steps: Option<usize>, duration: Duration) {
    counter!("crag_runs_total", "outcome" => outcome).increment(1);
    if let Some(steps) = steps {
        histogram!("crag_run_steps").record(steps as f64);
    }
    histogram!("crag_run_duration_seconds", "outcome" => outcome).record(duration.as_secs_f64());
}
