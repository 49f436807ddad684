//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, EmbeddingConfig, LlmConfig, LlmStepConfig, LogFormat, LoggingConfig,
    RetrievalConfig, WebSearchConfig,
};
