//! Pipeline state and the per-channel merge rules applied to node updates

use serde::{Deserialize, Serialize};

use super::document::Document;

/// Shared state threaded through every node of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    /// Starts as the user input, may be replaced by the query rewriter
    pub question: String,
    pub documents: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
}

impl PipelineState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            documents: Vec::new(),
            generation: None,
        }
    }

    /// Fold a node update into this state, channel by channel
    pub fn apply(self, update: StateUpdate) -> Self {
        let StateUpdate {
            question,
            documents,
            generation,
        } = update;

        Self {
            question: Channel::Question
                .strategy()
                .merge_text(self.question, question),
            documents: Channel::Documents
                .strategy()
                .merge_list(self.documents, documents),
            generation: Channel::Generation
                .strategy()
                .merge_optional_text(self.generation, generation),
        }
    }
}

/// Partial state returned by a node; absent fields leave the state untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub question: Option<String>,
    pub documents: Option<Vec<Document>>,
    pub generation: Option<String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    pub fn with_documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn with_generation(mut self, generation: impl Into<String>) -> Self {
        self.generation = Some(generation.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.question.is_none() && self.documents.is_none() && self.generation.is_none()
    }
}

/// A field of [`PipelineState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Question,
    Documents,
    Generation,
}

/// How an incoming value combines with the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Take the incoming value when it is present and non-empty
    ReplaceIfNonEmpty,
    /// Take the incoming value whenever it is present, even if empty
    ReplaceIfPresent,
}

/// Reducer table for the state channels
pub const CHANNELS: [(Channel, MergeStrategy); 3] = [
    (Channel::Question, MergeStrategy::ReplaceIfNonEmpty),
    (Channel::Documents, MergeStrategy::ReplaceIfPresent),
    (Channel::Generation, MergeStrategy::ReplaceIfNonEmpty),
];

impl Channel {
    pub fn strategy(self) -> MergeStrategy {
        CHANNELS
            .iter()
            .find(|(channel, _)| *channel == self)
            .map(|(_, strategy)| *strategy)
            .unwrap_or(MergeStrategy::ReplaceIfPresent)
    }
}

impl MergeStrategy {
    fn accepts(self, is_empty: bool) -> bool {
        match self {
            Self::ReplaceIfNonEmpty => !is_empty,
            Self::ReplaceIfPresent => true,
        }
    }

    fn merge_text(self, current: String, incoming: Option<String>) -> String {
        match incoming {
            Some(value) if self.accepts(value.is_empty()) => value,
            _ => current,
        }
    }

    fn merge_optional_text(self, current: Option<String>, incoming: Option<String>) -> Option<String> {
        match incoming {
            Some(value) if self.accepts(value.is_empty()) => Some(value),
            _ => current,
        }
    }

    fn merge_list<T>(self, current: Vec<T>, incoming: Option<Vec<T>>) -> Vec<T> {
        match incoming {
            Some(value) if self.accepts(value.is_empty()) => value,
            _ => current,
        }
    }
}
