use serde::{Deserialize, Serialize};

use crate::defs::{ChatMessage, Document, ScrapedPage};

/// The record threaded through every research stage.
///
/// A stage never mutates the state it is given. It returns a [`StateUpdate`]
/// and the driver produces the next state with [`ResearchState::apply`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    pub topic: String,
    pub search_queries: Vec<String>,
    pub retrieved_docs: Vec<Document>,
    pub scraped_data: Vec<ScrapedPage>,
    pub summaries: Vec<String>,
    pub final_report: String,
    pub error_message: String,
    pub messages: Vec<ChatMessage>,
}

impl ResearchState {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error_message.is_empty()
    }

    /// Merge a stage's partial update. Fields present in the update replace
    /// the current value, absent fields persist, messages are appended.
    pub fn apply(mut self, update: StateUpdate) -> Self {
        if let Some(search_queries) = update.search_queries {
            self.search_queries = search_queries;
        }
        if let Some(retrieved_docs) = update.retrieved_docs {
            self.retrieved_docs = retrieved_docs;
        }
        if let Some(scraped_data) = update.scraped_data {
            self.scraped_data = scraped_data;
        }
        if let Some(summaries) = update.summaries {
            self.summaries = summaries;
        }
        if let Some(final_report) = update.final_report {
            self.final_report = final_report;
        }
        if let Some(error_message) = update.error_message {
            self.error_message = error_message;
        }
        self.messages.extend(update.messages);
        self
    }
}

/// Partial update returned by a stage. There is no `topic` field: the topic is
/// fixed when the state is created.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateUpdate {
    pub search_queries: Option<Vec<String>>,
    pub retrieved_docs: Option<Vec<Document>>,
    pub scraped_data: Option<Vec<ScrapedPage>>,
    pub summaries: Option<Vec<String>>,
    pub final_report: Option<String>,
    pub error_message: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl StateUpdate {
    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error_message = Some(error.to_string());
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error_message = Some(String::new());
        self
    }

    pub fn error_message(&self) -> &str {
        self.error_message.as_deref().unwrap_or("")
    }
}
