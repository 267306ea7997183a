use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

pub use interfaces::{
    ChatMessage, Document, FetchedPage, LlmClient, LlmResponse, PageFetcher, ResearchState, Role,
    ScrapedPage, SearchClient, SearchHit, StateUpdate,
};

/// Characters of page text kept per scraped document.
pub const MAX_CONTENT_CHARS: usize = 5000;
/// Search results requested per query.
pub const RESULTS_PER_QUERY: usize = 3;
/// Upper bound on generated search queries.
pub const MAX_QUERIES: usize = 5;
/// Page bodies are cut off after this many bytes.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_redirects: usize,
    pub max_content_chars: usize,
    pub max_body_bytes: usize,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Research-Agent/1.0".to_string(),
            timeout_seconds: 10,
            max_redirects: 5,
            max_content_chars: MAX_CONTENT_CHARS,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LlmProvider {
    Gemini,
    #[value(name = "openai")]
    OpenAi,
}

impl LlmProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini-1.5-flash",
            LlmProvider::OpenAi => "gpt-4o-mini",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            "openai" => Ok(LlmProvider::OpenAi),
            other => Err(ResearchError::InvalidConfig(format!(
                "unknown LLM provider '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub provider: LlmProvider,
    pub model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub tavily_api_key: Option<String>,
    pub tavily_base_url: Option<String>,
    pub llm_timeout_seconds: u64,
    pub search_timeout_seconds: u64,
    pub fetch: FetchConfig,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Gemini,
            model: None,
            gemini_api_key: None,
            gemini_base_url: None,
            openai_api_key: None,
            openai_base_url: None,
            tavily_api_key: None,
            tavily_base_url: None,
            llm_timeout_seconds: 60,
            search_timeout_seconds: 30,
            fetch: FetchConfig::default(),
        }
    }
}

impl ResearchConfig {
    /// Load configuration from the process environment, reading a `.env`
    /// file first if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let provider = match non_empty_var("LLM_PROVIDER") {
            Some(value) => value.parse()?,
            None => defaults.provider,
        };

        let config = Self {
            provider,
            model: non_empty_var("LLM_MODEL"),
            gemini_api_key: non_empty_var("GEMINI_API_KEY")
                .or_else(|| non_empty_var("GOOGLE_API_KEY")),
            gemini_base_url: non_empty_var("GEMINI_BASE_URL"),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_base_url: non_empty_var("OPENAI_BASE_URL"),
            tavily_api_key: non_empty_var("TAVILY_API_KEY"),
            tavily_base_url: non_empty_var("TAVILY_BASE_URL"),
            llm_timeout_seconds: seconds_var(
                "LLM_TIMEOUT_SECONDS",
                defaults.llm_timeout_seconds,
            )?,
            search_timeout_seconds: seconds_var(
                "SEARCH_TIMEOUT_SECONDS",
                defaults.search_timeout_seconds,
            )?,
            fetch: FetchConfig {
                user_agent: non_empty_var("USER_AGENT").unwrap_or(defaults.fetch.user_agent),
                timeout_seconds: seconds_var(
                    "FETCH_TIMEOUT_SECONDS",
                    defaults.fetch.timeout_seconds,
                )?,
                ..defaults.fetch
            },
        };

        debug!(
            provider = ?config.provider,
            model = config.model_name(),
            has_tavily_key = config.tavily_api_key.is_some(),
            "Loaded research configuration"
        );
        Ok(config)
    }

    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_seconds)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_seconds)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn seconds_var(name: &str, default: u64) -> Result<u64> {
    match non_empty_var(name) {
        Some(value) => value.trim().parse().map_err(|_| {
            ResearchError::InvalidConfig(format!(
                "{} must be a whole number of seconds, got '{}'",
                name, value
            ))
        }),
        None => Ok(default),
    }
}

/// Infrastructure errors raised by service clients, the checkpoint stores and
/// the CLI. Stage-level outcomes are reported through [`StageError`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API error ({status}): {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Response from {url} is {length} bytes, over the {limit} byte limit")]
    ResponseTooLarge {
        url: String,
        length: u64,
        limit: usize,
    },

    #[error("Empty response from {0}")]
    EmptyResponse(&'static str),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No checkpoint found for run {run_id}")]
    CheckpointNotFound { run_id: Uuid },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ResearchError>;

/// Stage diagnostics. The `Display` text is what ends up in
/// `ResearchState::error_message` and in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("Invalid topic: the topic must be a non-empty string")]
    InvalidInput,

    #[error("Error generating queries: {0}")]
    LlmFailure(String),

    #[error("No search queries provided")]
    NoQueries,

    #[error("Error during web search: {0}")]
    SearchServiceFailure(String),

    #[error("No documents to scrape")]
    NoDocuments,

    #[error("No scraped content available to summarize.")]
    NoContent,

    #[error("{}", no_summaries_generated(*had_errors))]
    NoSummariesGenerated { had_errors: bool },

    #[error("No summaries available to compile a report.")]
    NoSummaries,

    #[error("Error compiling report: {0}")]
    ReportCompilationFailure(String),

    #[error("Search failed for query '{query}': {cause}")]
    QuerySearchFailed { query: String, cause: String },

    #[error("Failed to scrape {url}: {cause}")]
    ScrapeFailed { url: String, cause: String },

    #[error("Error summarizing content from {url}: {cause}")]
    SummaryFailed { url: String, cause: String },

    #[error("LLM returned an empty summary for {url}")]
    EmptySummary { url: String },
}

fn no_summaries_generated(had_errors: bool) -> &'static str {
    if had_errors {
        "Could not generate any summaries: every summarization attempt failed or returned nothing."
    } else {
        "Could not generate any summaries: none of the scraped documents had usable content."
    }
}

impl StageError {
    pub fn audit(&self) -> ChatMessage {
        ChatMessage::assistant(self.to_string())
    }
}
