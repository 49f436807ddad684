//! Observability infrastructure - pipeline metrics

mod metrics;

pub use metrics::{record_document_graded, record_node_execution, record_run, NodeOutcome};
