//! Infrastructure layer - External service implementations

pub mod crag;
pub mod embedding;
pub mod http_client;
pub mod knowledge_base;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod web_search;
