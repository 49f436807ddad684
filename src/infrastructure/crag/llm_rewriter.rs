//! LLM-backed query rewriter

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::LlmStepConfig;
use crate::domain::crag::QueryRewriter;
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::{DomainError, PromptTemplate};

/// Rephrases the question for semantic search
#[derive(Debug)]
pub struct LlmQueryRewriter {
    provider: Arc<dyn LlmProvider>,
    step: LlmStepConfig,
    prompt: PromptTemplate,
}

impl LlmQueryRewriter {
    pub fn new(provider: Arc<dyn LlmProvider>, step: LlmStepConfig, prompt: PromptTemplate) -> Self {
        Self {
            provider,
            step,
            prompt,
        }
    }
}

#[async_trait]
impl QueryRewriter for LlmQueryRewriter {
    /// Returns the trimmed completion, which may be empty
    async fn rewrite_query(&self, question: &str) -> Result<String, DomainError> {
        let prompt = self
            .prompt
            .render(&HashMap::from([("question", question)]))
            .map_err(|e| DomainError::configuration(e.to_string()))?;

        let request = LlmRequest::builder()
            .user(prompt)
            .temperature(self.step.temperature)
            .build();

        let response = self.provider.chat(&self.step.model, request).await?;

        Ok(response.content().unwrap_or_default().trim().to_string())
    }
}
