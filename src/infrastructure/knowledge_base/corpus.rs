//! Loads a JSON corpus file into a knowledge base
//!
//! Accepted shapes: a bare array of records or `{"documents": [...]}`, where
//! each record is `{ "id"?, "content", "source"?, "metadata"? }`.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::knowledge_base::{AddDocumentsResult, KnowledgeBaseProvider, KnowledgeDocument};
use crate::domain::DomainError;

/// Number of documents sent to the index per embedding batch
const LOAD_BATCH_SIZE: usize = 64;

#[derive(Debug, Deserialize)]
struct CorpusRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "pageContent", alias = "text")]
    content: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CorpusFile {
    Records(Vec<CorpusRecord>),
    Wrapped { documents: Vec<CorpusRecord> },
}

/// Parse corpus JSON into documents, assigning positional ids where missing
pub fn parse_corpus(raw: &str) -> Result<Vec<KnowledgeDocument>, DomainError> {
    let file: CorpusFile = serde_json::from_str(raw)
        .map_err(|e| DomainError::validation(format!("Invalid corpus JSON: {}", e)))?;

    let records = match file {
        CorpusFile::Records(records) => records,
        CorpusFile::Wrapped { documents } => documents,
    };

    Ok(records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let mut doc = KnowledgeDocument::new(
                record.id.unwrap_or_else(|| format!("doc-{}", index)),
                record.content,
            )
            .with_all_metadata(record.metadata);
            // Loader exports keep the URL under metadata.source
            let source = record.source.or_else(|| {
                doc.metadata
                    .get("source")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            });
            if let Some(source) = source {
                doc = doc.with_source(source);
            }
            doc
        })
        .collect())
}

/// Read, parse and index a corpus file
pub async fn load_corpus(
    path: &Path,
    knowledge_base: &dyn KnowledgeBaseProvider,
) -> Result<AddDocumentsResult, DomainError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        DomainError::configuration(format!(
            "Failed to read corpus file {}: {}",
            path.display(),
            e
        ))
    })?;

    let documents = parse_corpus(&raw)?;
    let total = documents.len();
    let mut summary = AddDocumentsResult::default();

    let mut remaining = documents.into_iter().peekable();
    while remaining.peek().is_some() {
        let batch: Vec<KnowledgeDocument> = remaining.by_ref().take(LOAD_BATCH_SIZE).collect();
        let result = knowledge_base.add_documents(batch).await?;
        summary.added += result.added;
        summary.failed += result.failed;
        summary.errors.extend(result.errors);
    }

    for (id, error) in &summary.errors {
        warn!(document_id = %id, error = %error, "Skipped corpus document");
    }

    info!(
        path = %path.display(),
        knowledge_base = %knowledge_base.knowledge_base_id(),
        total,
        added = summary.added,
        failed = summary.failed,
        "Corpus loaded"
    );

    Ok(summary)
}
