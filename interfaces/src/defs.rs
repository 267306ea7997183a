use std::fmt;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role-tagged message. Used both as LLM input and as an audit record in
/// the research state's message log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A search result candidate, keyed by URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub snippet: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub snippet: String,
}

impl From<SearchHit> for Document {
    fn from(hit: SearchHit) -> Self {
        Self {
            url: hit.url,
            snippet: hit.snippet,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmResponse {
    pub content: String,
}

/// Raw response of a page fetch. The body is undecoded; `content_type` is the
/// `Content-Type` header, when the server sent one.
#[derive(Clone, Debug, Default)]
pub struct FetchedPage {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// Object style note:
// Implementations of these traits are handed to the pipeline stages as
// shared handles (`Arc<dyn LlmClient>` and so on). They should hold only
// connection-level state (HTTP client, credentials, model name) and be safe
// to call repeatedly from a single task. Failures are reported as errors and
// the stages decide how to degrade.

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse>;
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Checked once per search stage, before any query is issued.
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

/// Raw HTTP GET. Non-2xx statuses are returned as-is; only transport-level
/// faults (DNS, connect, timeout) are errors.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage>;
}
