//! LLM-backed answer generator

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::LlmStepConfig;
use crate::domain::crag::AnswerGenerator;
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::{DomainError, PromptTemplate};

/// Answers from the supplied context only
#[derive(Debug)]
pub struct LlmAnswerGenerator {
    provider: Arc<dyn LlmProvider>,
    step: LlmStepConfig,
    prompt: PromptTemplate,
}

impl LlmAnswerGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, step: LlmStepConfig, prompt: PromptTemplate) -> Self {
        Self {
            provider,
            step,
            prompt,
        }
    }
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn generate_answer(&self, question: &str, context: &str) -> Result<String, DomainError> {
        let prompt = self
            .prompt
            .render(&HashMap::from([("question", question), ("context", context)]))
            .map_err(|e| DomainError::configuration(e.to_string()))?;

        let mut builder = LlmRequest::builder()
            .user(prompt)
            .temperature(self.step.temperature);
        if let Some(max_tokens) = self.step.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        let response = self.provider.chat(&self.step.model, builder.build()).await?;

        if response.is_truncated() {
            warn!(model = %self.step.model, "Answer was cut off by max_tokens");
        }
        if let Some(usage) = response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Generation token usage"
            );
        }

        Ok(response.content().unwrap_or_default().trim().to_string())
    }
}
