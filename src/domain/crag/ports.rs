//! Collaborators the pipeline nodes call out to
//!
//! Every external service is reached through one of these traits so the
//! controller can be exercised without network access.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use super::document::Document;
use crate::domain::DomainError;

/// Binary relevance verdict for one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceGrade {
    Yes,
    No,
}

impl RelevanceGrade {
    /// Parse a `yes`/`no` score, ignoring case and surrounding whitespace
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            _ => None,
        }
    }

    pub fn is_relevant(&self) -> bool {
        matches!(self, Self::Yes)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

/// Similarity search over the indexed corpus
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Documents ordered by descending similarity
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, DomainError>;
}

/// Structured relevance judgment of one document against a question
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RelevanceGrader: Send + Sync {
    /// Unparseable judgments must be reported as `DomainError::MalformedResponse`
    async fn judge_relevance(
        &self,
        question: &str,
        document: &str,
    ) -> Result<RelevanceGrade, DomainError>;
}

/// Rephrases a question for better retrieval
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    async fn rewrite_query(&self, question: &str) -> Result<String, DomainError>;
}

/// Produces the final answer from a question and its context
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate_answer(&self, question: &str, context: &str) -> Result<String, DomainError>;
}
