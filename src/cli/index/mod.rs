//! Index command - loads the corpus and reports on the resulting index

use anyhow::Context;
use tracing::warn;

use crate::domain::knowledge_base::KnowledgeBaseProvider;
use crate::infrastructure::crag::CragPipelineFactory;

/// Load the configured corpus and print a short summary
pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    if config.retrieval.corpus_path.is_none() {
        warn!("retrieval.corpus_path is not set, the index will be empty");
    }

    let knowledge_base = CragPipelineFactory::create_knowledge_base(&config)
        .await
        .context("Failed to build knowledge base")?;

    println!("{}", summarize(knowledge_base.as_ref()).await?);

    Ok(())
}

async fn summarize(knowledge_base: &dyn KnowledgeBaseProvider) -> anyhow::Result<String> {
    let count = knowledge_base.document_count().await?;
    let healthy = knowledge_base.health_check().await?;

    Ok(format!(
        "Knowledge base '{}' ({}): {} documents, {}",
        knowledge_base.knowledge_base_id(),
        knowledge_base.provider_type(),
        count,
        if healthy { "healthy" } else { "unhealthy" }
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge_base::{MockKnowledgeBaseProvider, SearchResult};

    #[tokio::test]
    async fn test_summarize_reports_count_and_health() {
        let kb = MockKnowledgeBaseProvider::new("corpus").with_results(vec![
            SearchResult::new("a", "first", 0.9),
            SearchResult::new("b", "second", 0.8),
        ]);

        let summary = tokio_test::assert_ok!(summarize(&kb).await);

        assert!(summary.starts_with("Knowledge base 'corpus'"));
        assert!(summary.contains("2 documents"));
        assert!(summary.ends_with("healthy"));
        assert!(!summary.contains("unhealthy"));
    }
}
