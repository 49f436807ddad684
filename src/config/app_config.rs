use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::crag::{PipelineSettings, PromptSettings};
use crate::infrastructure::web_search::SearchDepth;

/// Application configuration
///
/// Sources, later ones winning: `config/default.*`, `config/local.*`, then
/// `CRAG__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub web_search: WebSearchConfig,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Model settings for one LLM-backed step
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmStepConfig {
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl LlmStepConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Chat completion service shared by grading, rewriting and generation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    /// Falls back to `OPENAI_API_KEY`
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub grading: LlmStepConfig,
    pub rewrite: LlmStepConfig,
    pub generation: LlmStepConfig,
    pub prompts: PromptSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Defaults to the LLM base URL
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub knowledge_base_id: String,
    pub top_k: u32,
    pub similarity_threshold: f32,
    /// JSON corpus indexed at start-up
    pub corpus_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    pub base_url: String,
    /// Falls back to `TAVILY_API_KEY`
    pub api_key: Option<String>,
    pub max_results: u32,
    pub search_depth: SearchDepth,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            request_timeout_secs: 60,
            grading: LlmStepConfig::new("gpt-4-0125-preview"),
            rewrite: LlmStepConfig::new("gpt-4-0125-preview"),
            generation: LlmStepConfig::new("gpt-3.5-turbo"),
            prompts: PromptSettings::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            base_url: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            knowledge_base_id: "corpus".to_string(),
            top_k: 4,
            similarity_threshold: 0.0,
            corpus_path: None,
        }
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tavily.com".to_string(),
            api_key: None,
            max_results: 5,
            search_depth: SearchDepth::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("CRAG")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.apply_key_fallbacks(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Fill unset API keys from the conventional provider variables
    pub fn apply_key_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.llm.api_key.as_deref().is_none_or(str::is_empty) {
            self.llm.api_key = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty());
        }
        if self.web_search.api_key.as_deref().is_none_or(str::is_empty) {
            self.web_search.api_key = lookup("TAVILY_API_KEY").filter(|k| !k.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    fn from_json(json: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(json, FileFormat::Json))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.llm.grading.model, "gpt-4-0125-preview");
        assert_eq!(config.llm.generation.model, "gpt-3.5-turbo");
        assert_eq!(config.llm.generation.temperature, 0.0);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.web_search.max_results, 5);
        assert_eq!(config.pipeline.recursion_limit, 50);
    }

    #[test]
    fn test_partial_sources_keep_defaults() {
        let config = from_json(
            r#"{
                "logging": {"format": "json"},
                "llm": {"generation": {"model": "gpt-4o-mini", "max_tokens": 300}},
                "retrieval": {"corpus_path": "data/corpus.json", "top_k": 6},
                "web_search": {"search_depth": "advanced"},
                "pipeline": {"grading_concurrency": 1, "timeout_ms": 45000}
            }"#,
        );

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.llm.generation.model, "gpt-4o-mini");
        assert_eq!(config.llm.generation.max_tokens, Some(300));
        assert_eq!(config.llm.grading.model, "gpt-4-0125-preview");
        assert_eq!(
            config.retrieval.corpus_path,
            Some(PathBuf::from("data/corpus.json"))
        );
        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.web_search.search_depth, SearchDepth::Advanced);
        assert_eq!(config.pipeline.grading_concurrency, 1);
        assert_eq!(config.pipeline.timeout_ms, Some(45000));
        assert_eq!(config.pipeline.recursion_limit, 50);
    }

    #[test]
    fn test_key_fallbacks() {
        let mut config = AppConfig::default();
        config.apply_key_fallbacks(|name| match name {
            "OPENAI_API_KEY" => Some("sk-env".to_string()),
            "TAVILY_API_KEY" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.web_search.api_key, None);
    }

    #[test]
    fn test_explicit_keys_win_over_fallbacks() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-config".to_string());
        config.apply_key_fallbacks(|_| Some("sk-env".to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-config"));
        assert_eq!(config.web_search.api_key.as_deref(), Some("sk-env"));
    }
}
