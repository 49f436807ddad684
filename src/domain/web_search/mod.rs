//! Web search domain - live search used when the index has nothing relevant

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::domain::DomainError;

/// External search tool
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    /// Search the web and return the combined results as one text payload
    async fn search(&self, query: &str) -> Result<String, DomainError>;

    fn provider_name(&self) -> &'static str;
}
