//! Knowledge base provider implementations

mod corpus;
mod in_memory;

pub use corpus::{load_corpus, parse_corpus};
pub use in_memory::InMemoryKnowledgeBaseProvider;
