//! Pipeline tuning and prompt configuration

use serde::{Deserialize, Serialize};

use crate::domain::prompt::{PromptTemplate, TemplateError};

/// Default step budget for one run
pub const DEFAULT_RECURSION_LIMIT: usize = 50;

/// Default number of grading calls in flight
pub const DEFAULT_GRADING_CONCURRENCY: usize = 4;

pub const DEFAULT_GRADING_PROMPT: &str = "You are a grader assessing relevance of a retrieved document to a user question.\n\
Here is the retrieved document:\n\n${var:context}\n\n\
Here is the user question: ${var:question}\n\n\
If the document contains keyword(s) or semantic meaning related to the user question, grade it as relevant.\n\
Give a binary score 'yes' or 'no' score to indicate whether the document is relevant to the question.";

pub const DEFAULT_REWRITE_PROMPT: &str = "You are generating a question that is well optimized for semantic search retrieval.\n\
Look at the input and try to reason about the underlying semantic intent / meaning.\n\
Here is the initial question:\n\n -------\n\n${var:question}\n\n -------\n\n\
Formulate an improved question: ";

pub const DEFAULT_GENERATION_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\
Question: ${var:question}\n\
Context: ${var:context}\n\
Answer:";

/// Execution limits for the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Maximum node executions per run
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
    /// Overall deadline for a run, unbounded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Grading calls in flight at once; 1 grades strictly one after another
    #[serde(default = "default_grading_concurrency")]
    pub grading_concurrency: usize,
}

fn default_recursion_limit() -> usize {
    DEFAULT_RECURSION_LIMIT
}

fn default_grading_concurrency() -> usize {
    DEFAULT_GRADING_CONCURRENCY
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            recursion_limit: default_recursion_limit(),
            timeout_ms: None,
            grading_concurrency: default_grading_concurrency(),
        }
    }
}

impl PipelineSettings {
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_grading_concurrency(mut self, concurrency: usize) -> Self {
        self.grading_concurrency = concurrency;
        self
    }

    /// Concurrency clamped to at least one
    pub fn effective_grading_concurrency(&self) -> usize {
        self.grading_concurrency.max(1)
    }
}

/// Prompt overrides; unset entries use the built-in prompts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
}

/// Parsed prompt templates for the three LLM-backed steps
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSet {
    /// Variables: `question`, `context` (the document under review)
    pub grading: PromptTemplate,
    /// Variables: `question`
    pub rewrite: PromptTemplate,
    /// Variables: `question`, `context` (all surviving documents)
    pub generation: PromptTemplate,
}

impl PromptSet {
    /// Build the templates, checking each override references what its step supplies
    pub fn from_settings(settings: &PromptSettings) -> Result<Self, TemplateError> {
        Ok(Self {
            grading: PromptTemplate::parse_expecting(
                settings.grading.as_deref().unwrap_or(DEFAULT_GRADING_PROMPT),
                &["question", "context"],
            )?,
            rewrite: PromptTemplate::parse_expecting(
                settings.rewrite.as_deref().unwrap_or(DEFAULT_REWRITE_PROMPT),
                &["question"],
            )?,
            generation: PromptTemplate::parse_expecting(
                settings
                    .generation
                    .as_deref()
                    .unwrap_or(DEFAULT_GENERATION_PROMPT),
                &["question", "context"],
            )?,
        })
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            grading: PromptTemplate::parse(DEFAULT_GRADING_PROMPT),
            rewrite: PromptTemplate::parse(DEFAULT_REWRITE_PROMPT),
            generation: PromptTemplate::parse(DEFAULT_GENERATION_PROMPT),
        }
    }
}
