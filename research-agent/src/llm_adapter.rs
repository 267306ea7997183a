use crate::types::{
    ChatMessage, LlmClient, LlmProvider, LlmResponse, ResearchConfig, ResearchError, Result, Role,
};
use crate::utils::text::truncate_chars;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const MAX_ERROR_BODY_CHARS: usize = 800;

/// Build the LLM client selected by the configuration.
pub fn build_llm_client(config: &ResearchConfig) -> Result<Arc<dyn LlmClient>> {
    let model = config.model_name();
    let timeout = config.llm_timeout();

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Gemini => {
            let api_key = config.gemini_api_key.as_deref().ok_or_else(|| {
                ResearchError::MissingConfig(
                    "GEMINI_API_KEY (or GOOGLE_API_KEY) is not set".to_string(),
                )
            })?;
            let mut client = GeminiClient::new(api_key, model, timeout)?;
            if let Some(base_url) = &config.gemini_base_url {
                client = client.with_base_url(base_url);
            }
            Arc::new(client)
        }
        LlmProvider::OpenAi => {
            let api_key = config.openai_api_key.as_deref().ok_or_else(|| {
                ResearchError::MissingConfig("OPENAI_API_KEY is not set".to_string())
            })?;
            let mut client = OpenAiClient::new(api_key, model, timeout)?;
            if let Some(base_url) = &config.openai_base_url {
                client = client.with_base_url(base_url);
            }
            Arc::new(client)
        }
    };

    info!("Using {:?} LLM with model {}", config.provider, model);
    Ok(client)
}

async fn api_error(service: &'static str, response: reqwest::Response) -> ResearchError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ResearchError::Api {
        service,
        status,
        body: truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS),
    }
}

// Gemini

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

/// Google Generative Language `generateContent` client.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: GEMINI_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn build_request(messages: &[ChatMessage]) -> GeminiRequest {
        let mut system_instruction = None;
        let mut contents = Vec::new();

        for message in messages {
            let part = GeminiPart { text: message.content.clone() };
            match message.role {
                Role::System => {
                    system_instruction = Some(GeminiContent {
                        role: "system".to_string(),
                        parts: vec![part],
                    });
                }
                // Gemini names the assistant role "model".
                Role::Assistant => contents.push(GeminiContent {
                    role: "model".to_string(),
                    parts: vec![part],
                }),
                Role::User => contents.push(GeminiContent {
                    role: "user".to_string(),
                    parts: vec![part],
                }),
            }
        }

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig { temperature: 0.0 },
        }
    }

    pub async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = Self::build_request(messages);

        debug!(model = %self.model, messages = messages.len(), "Gemini generateContent request");

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error("Gemini", response).await);
        }

        let body: GeminiResponse = response.json().await?;
        let content = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .ok_or(ResearchError::EmptyResponse("Gemini"))?;

        Ok(content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<LlmResponse> {
        let content = self.generate(messages).await?;
        Ok(LlmResponse { content })
    }
}

// OpenAI-compatible chat completions

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for any `/chat/completions` endpoint speaking the OpenAI protocol.
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: OPENAI_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|message| ChatRequestMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            temperature: 0.0,
        };

        debug!(model = %self.model, messages = messages.len(), "OpenAI chat request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error("OpenAI", response).await);
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ResearchError::EmptyResponse("OpenAI"))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<LlmResponse> {
        let content = self.chat(messages).await?;
        Ok(LlmResponse { content })
    }
}
