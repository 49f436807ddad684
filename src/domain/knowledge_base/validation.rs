//! Knowledge base validation utilities

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Maximum length for knowledge base IDs
pub const MAX_KB_ID_LENGTH: usize = 50;

/// Upper bound accepted for `top_k`
pub const MAX_TOP_K: u32 = 100;

static KB_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]$|^[a-zA-Z0-9]$")
        .expect("knowledge base id pattern is valid")
});

/// Knowledge base validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KnowledgeBaseValidationError {
    #[error("Knowledge base ID cannot be empty")]
    EmptyId,

    #[error("Knowledge base ID too long: {length} characters (max {max})")]
    IdTooLong { length: usize, max: usize },

    #[error("Invalid knowledge base ID format '{id}': must be alphanumeric with hyphens")]
    InvalidIdFormat { id: String },

    #[error("Invalid top_k {value}: must be between 1 and {max}")]
    InvalidTopK { value: u32, max: u32 },

    #[error("Invalid similarity threshold {value}: must be between -1.0 and 1.0")]
    InvalidSimilarityThreshold { value: f32 },
}

/// Validate a knowledge base ID
pub fn validate_knowledge_base_id(id: &str) -> Result<(), KnowledgeBaseValidationError> {
    if id.is_empty() {
        return Err(KnowledgeBaseValidationError::EmptyId);
    }

    if id.len() > MAX_KB_ID_LENGTH {
        return Err(KnowledgeBaseValidationError::IdTooLong {
            length: id.len(),
            max: MAX_KB_ID_LENGTH,
        });
    }

    if !KB_ID_PATTERN.is_match(id) {
        return Err(KnowledgeBaseValidationError::InvalidIdFormat { id: id.to_string() });
    }

    Ok(())
}

/// Validate the number of results requested from a search
pub fn validate_top_k(top_k: u32) -> Result<(), KnowledgeBaseValidationError> {
    if top_k == 0 || top_k > MAX_TOP_K {
        return Err(KnowledgeBaseValidationError::InvalidTopK {
            value: top_k,
            max: MAX_TOP_K,
        });
    }
    Ok(())
}

/// Validate a cosine similarity cut-off
pub fn validate_similarity_threshold(threshold: f32) -> Result<(), KnowledgeBaseValidationError> {
    if !(-1.0..=1.0).contains(&threshold) || threshold.is_nan() {
        return Err(KnowledgeBaseValidationError::InvalidSimilarityThreshold { value: threshold });
    }
    Ok(())
}
