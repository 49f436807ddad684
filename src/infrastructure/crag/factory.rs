//! Builds a ready-to-run pipeline from application configuration

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{
    CragPipeline, KnowledgeBaseRetriever, LlmAnswerGenerator, LlmQueryRewriter,
    LlmRelevanceGrader,
};
use crate::config::AppConfig;
use crate::domain::crag::{PipelineComponents, PromptSet};
use crate::domain::knowledge_base::{KnowledgeBaseId, KnowledgeBaseProvider};
use crate::domain::{DomainError, LlmProvider, WebSearchProvider};
use crate::infrastructure::embedding::OpenAiEmbeddingProvider;
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::knowledge_base::{load_corpus, InMemoryKnowledgeBaseProvider};
use crate::infrastructure::llm::OpenAiProvider;
use crate::infrastructure::web_search::TavilySearchProvider;

/// A pipeline together with the index it retrieves from
#[derive(Debug, Clone)]
pub struct PipelineBundle {
    pub pipeline: CragPipeline,
    pub knowledge_base: Arc<dyn KnowledgeBaseProvider>,
}

/// Factory for the corrective RAG pipeline
#[derive(Debug)]
pub struct CragPipelineFactory;

impl CragPipelineFactory {
    /// Wire OpenAI, Tavily and the in-memory index, loading the corpus if configured
    pub async fn create(config: &AppConfig) -> Result<PipelineBundle, DomainError> {
        let openai_key = require_key(config.llm.api_key.as_deref(), "llm.api_key", "OPENAI_API_KEY")?;
        let tavily_key = require_key(
            config.web_search.api_key.as_deref(),
            "web_search.api_key",
            "TAVILY_API_KEY",
        )?;

        let http = HttpClient::with_timeout(Duration::from_secs(config.llm.request_timeout_secs))?;

        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::with_base_url(
            http.clone(),
            openai_key,
            &config.llm.base_url,
        ));

        let knowledge_base = Self::build_knowledge_base(config, http.clone(), openai_key).await?;

        let web_search: Arc<dyn WebSearchProvider> = Arc::new(
            TavilySearchProvider::new(http, tavily_key)
                .with_base_url(&config.web_search.base_url)
                .with_max_results(config.web_search.max_results)
                .with_search_depth(config.web_search.search_depth),
        );

        let components = Self::components(config, llm, knowledge_base.clone(), web_search)?;
        let pipeline = CragPipeline::new(components).with_settings(config.pipeline.clone());

        Ok(PipelineBundle {
            pipeline,
            knowledge_base,
        })
    }

    /// Build only the index, for commands that never reach the LLM or web search
    pub async fn create_knowledge_base(
        config: &AppConfig,
    ) -> Result<Arc<dyn KnowledgeBaseProvider>, DomainError> {
        let openai_key = require_key(config.llm.api_key.as_deref(), "llm.api_key", "OPENAI_API_KEY")?;
        let http = HttpClient::with_timeout(Duration::from_secs(config.llm.request_timeout_secs))?;

        Self::build_knowledge_base(config, http, openai_key).await
    }

    /// Build the in-memory index and load the configured corpus into it
    async fn build_knowledge_base(
        config: &AppConfig,
        http: HttpClient,
        api_key: &str,
    ) -> Result<Arc<dyn KnowledgeBaseProvider>, DomainError> {
        let id = KnowledgeBaseId::new(&config.retrieval.knowledge_base_id)
            .map_err(|e| DomainError::configuration(e.to_string()))?;

        let embedder = OpenAiEmbeddingProvider::with_base_url(
            http,
            api_key,
            config
                .embedding
                .base_url
                .as_deref()
                .unwrap_or(&config.llm.base_url),
        );

        let knowledge_base =
            InMemoryKnowledgeBaseProvider::new(id, Arc::new(embedder), &config.embedding.model);

        match &config.retrieval.corpus_path {
            Some(path) => {
                load_corpus(path, &knowledge_base).await?;
            }
            None => warn!("No corpus configured, retrieval will return no documents"),
        }

        Ok(Arc::new(knowledge_base))
    }

    /// Wire the collaborators around already-built services
    pub fn components(
        config: &AppConfig,
        llm: Arc<dyn LlmProvider>,
        knowledge_base: Arc<dyn KnowledgeBaseProvider>,
        web_search: Arc<dyn WebSearchProvider>,
    ) -> Result<PipelineComponents, DomainError> {
        let prompts = PromptSet::from_settings(&config.llm.prompts)
            .map_err(|e| DomainError::configuration(format!("Invalid prompt override: {}", e)))?;

        let retriever = KnowledgeBaseRetriever::new(knowledge_base)
            .with_top_k(config.retrieval.top_k)
            .with_similarity_threshold(config.retrieval.similarity_threshold);

        info!(
            grading_model = %config.llm.grading.model,
            rewrite_model = %config.llm.rewrite.model,
            generation_model = %config.llm.generation.model,
            web_search = web_search.provider_name(),
            "Pipeline components configured"
        );

        Ok(PipelineComponents {
            retriever: Arc::new(retriever),
            grader: Arc::new(LlmRelevanceGrader::new(
                llm.clone(),
                config.llm.grading.clone(),
                prompts.grading,
            )),
            rewriter: Arc::new(LlmQueryRewriter::new(
                llm.clone(),
                config.llm.rewrite.clone(),
                prompts.rewrite,
            )),
            web_search,
            generator: Arc::new(LlmAnswerGenerator::new(
                llm,
                config.llm.generation.clone(),
                prompts.generation,
            )),
        })
    }
}

fn require_key<'a>(
    value: Option<&'a str>,
    setting: &str,
    env_var: &str,
) -> Result<&'a str, DomainError> {
    value.filter(|k| !k.is_empty()).ok_or_else(|| {
        DomainError::configuration(format!("Missing {} (or {} environment variable)", setting, env_var))
    })
}
