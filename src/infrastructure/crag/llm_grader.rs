//! LLM-backed relevance grader

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::LlmStepConfig;
use crate::domain::crag::{RelevanceGrade, RelevanceGrader};
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::{DomainError, PromptTemplate};

const GRADER_NAME: &str = "llm_grader";

/// Asks the model for a `{"binary_score": "yes" | "no"}` verdict
#[derive(Debug)]
pub struct LlmRelevanceGrader {
    provider: Arc<dyn LlmProvider>,
    step: LlmStepConfig,
    prompt: PromptTemplate,
}

impl LlmRelevanceGrader {
    pub fn new(provider: Arc<dyn LlmProvider>, step: LlmStepConfig, prompt: PromptTemplate) -> Self {
        Self {
            provider,
            step,
            prompt,
        }
    }

    fn grade_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "binary_score": {
                    "type": "string",
                    "enum": ["yes", "no"],
                    "description": "Relevance score 'yes' or 'no'"
                }
            },
            "required": ["binary_score"],
            "additionalProperties": false
        })
    }
}

/// Extract JSON object from a string (handles markdown code blocks)
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Read a verdict out of the model's reply
pub(crate) fn parse_grade(content: &str) -> Result<RelevanceGrade, DomainError> {
    let malformed =
        |detail: String| DomainError::malformed_response(GRADER_NAME, detail);

    let Some(json) = extract_json(content) else {
        return RelevanceGrade::parse(content)
            .ok_or_else(|| malformed(format!("expected a yes/no verdict, got '{}'", content.trim())));
    };

    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| malformed(format!("invalid JSON verdict: {}", e)))?;

    let score = value
        .get("binary_score")
        .or_else(|| value.get("binaryScore"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| malformed("missing binary_score".to_string()))?;

    RelevanceGrade::parse(score)
        .ok_or_else(|| malformed(format!("binary_score must be 'yes' or 'no', got '{}'", score)))
}

#[async_trait]
impl RelevanceGrader for LlmRelevanceGrader {
    async fn judge_relevance(
        &self,
        question: &str,
        document: &str,
    ) -> Result<RelevanceGrade, DomainError> {
        let prompt = self
            .prompt
            .render(&HashMap::from([("question", question), ("context", document)]))
            .map_err(|e| DomainError::configuration(e.to_string()))?;

        let request = LlmRequest::builder()
            .user(prompt)
            .temperature(self.step.temperature)
            .json_schema("grade", Self::grade_schema())
            .build();

        let response = self
            .provider
            .chat(&self.step.model, request)
            .await
            .map_err(|e| match e {
                DomainError::Refused { message, .. } => DomainError::malformed_response(
                    GRADER_NAME,
                    format!("model refused to grade: {}", message),
                ),
                other => other,
            })?;
        let content = response.content().unwrap_or_default();

        let grade = parse_grade(content)?;
        debug!(model = %self.step.model, grade = grade.as_str(), "Document graded");
        Ok(grade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{LlmResponseFormat, MockLlmProvider};
    use crate::infrastructure::http_client::mock::MockHttpClient;
    use crate::infrastructure::llm::OpenAiProvider;

    fn grader(provider: Arc<MockLlmProvider>) -> LlmRelevanceGrader {
        LlmRelevanceGrader::new(
            provider,
            LlmStepConfig::new("gpt-4-0125-preview"),
            PromptTemplate::parse("Doc: ${var:context} Question: ${var:question}"),
        )
    }

    #[test]
    fn test_extract_json() {
        let text = "```json\n{\"binary_score\": \"yes\"}\n```";
        assert_eq!(extract_json(text), Some("{\"binary_score\": \"yes\"}"));
        assert_eq!(extract_json("no braces"), None);
    }

    #[test]
    fn test_parse_grade_variants() {
        assert_eq!(parse_grade(r#"{"binary_score": "yes"}"#).unwrap(), RelevanceGrade::Yes);
        assert_eq!(parse_grade(r#"{"binaryScore": "no"}"#).unwrap(), RelevanceGrade::No);
        assert_eq!(parse_grade(" Yes ").unwrap(), RelevanceGrade::Yes);
    }

    #[test]
    fn test_parse_grade_malformed() {
        for reply in [
            "",
            "probably",
            r#"{"binary_score": "maybe"}"#,
            r#"{"score": "yes"}"#,
            r#"{"binary_score": }"#,
        ] {
            let error = parse_grade(reply).unwrap_err();
            assert!(error.is_malformed(), "reply {:?} gave {:?}", reply, error);
        }
    }

    #[tokio::test]
    async fn test_grader_request() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_response(r#"{"binary_score":"yes"}"#));
        let grade = grader(provider.clone())
            .judge_relevance("what is memory?", "Agents keep memory")
            .await
            .unwrap();

        assert!(grade.is_relevant());

        let (model, request) = provider.requests().remove(0);
        assert_eq!(model, "gpt-4-0125-preview");
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(
            request.last_user_text(),
            Some("Doc: Agents keep memory Question: what is memory?")
        );
        assert!(matches!(
            request.response_format,
            Some(LlmResponseFormat::JsonSchema { .. })
        ));
    }

    #[tokio::test]
    async fn test_refusal_counts_as_malformed_verdict() {
        let client = MockHttpClient::new().with_response(
            "https://api.openai.com/v1/chat/completions",
            serde_json::json!({
                "id": "chatcmpl-9",
                "model": "gpt-4-0125-preview",
                "choices": [{
                    "message": { "role": "assistant", "content": null, "refusal": "I can't help with that." },
                    "finish_reason": "stop"
                }]
            }),
        );
        let provider = Arc::new(OpenAiProvider::new(client, "sk-test"));
        let grader = LlmRelevanceGrader::new(
            provider,
            LlmStepConfig::new("gpt-4-0125-preview"),
            PromptTemplate::parse("Doc: ${var:context} Question: ${var:question}"),
        );

        let error = grader.judge_relevance("q", "d").await.unwrap_err();

        assert!(error.is_malformed(), "got {:?}", error);
        assert!(error.to_string().contains("I can't help with that."));
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_malformed() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_error("HTTP 503"));
        let error = grader(provider).judge_relevance("q", "d").await.unwrap_err();
        assert!(!error.is_malformed());
    }
}
