#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use research_agent::{
    ChatMessage, FetchedPage, LlmClient, LlmResponse, PageFetcher, SearchClient, SearchHit,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// LLM that replays scripted replies in order. Once the script runs out it
/// keeps returning `fallback`.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback: Result<String, String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: Ok(String::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call gets the same reply.
    pub fn always(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Ok(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Err(error.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<LlmResponse> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            Ok(content) => Ok(LlmResponse { content }),
            Err(e) => Err(anyhow!(e)),
        }
    }
}

/// Search service backed by a fixed query -> results table.
#[derive(Default)]
pub struct FakeSearch {
    results: HashMap<String, Result<Vec<SearchHit>, String>>,
    unavailable: Option<String>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, urls: &[&str]) -> Self {
        let hits = urls
            .iter()
            .map(|url| SearchHit {
                url: url.to_string(),
                snippet: format!("snippet for {} from '{}'", url, query),
            })
            .collect();
        self.results.insert(query.to_string(), Ok(hits));
        self
    }

    pub fn with_failure(mut self, query: &str, error: &str) -> Self {
        self.results.insert(query.to_string(), Err(error.to_string()));
        self
    }

    pub fn unavailable(mut self, reason: &str) -> Self {
        self.unavailable = Some(reason.to_string());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchClient for FakeSearch {
    async fn ensure_ready(&self) -> anyhow::Result<()> {
        match &self.unavailable {
            Some(reason) => Err(anyhow!(reason.clone())),
            None => Ok(()),
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        match self.results.get(query) {
            Some(Ok(hits)) => Ok(hits.iter().take(max_results).cloned().collect()),
            Some(Err(e)) => Err(anyhow!(e.clone())),
            None => Ok(Vec::new()),
        }
    }
}

/// Fetcher serving canned pages. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, Result<FetchedPage, String>>,
    requests: Mutex<Vec<(String, Duration)>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.with_bytes(url, Some("text/html; charset=utf-8"), html.as_bytes())
    }

    pub fn with_bytes(mut self, url: &str, content_type: Option<&str>, body: &[u8]) -> Self {
        let page = FetchedPage {
            status: 200,
            content_type: content_type.map(|c| c.to_string()),
            body: body.to_vec(),
        };
        self.pages.insert(url.to_string(), Ok(page));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        let page = FetchedPage {
            status,
            ..Default::default()
        };
        self.pages.insert(url.to_string(), Ok(page));
        self
    }

    pub fn with_error(mut self, url: &str, error: &str) -> Self {
        self.pages.insert(url.to_string(), Err(error.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        let requests = self.requests.lock().unwrap();
        requests.iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn timeouts(&self) -> Vec<Duration> {
        let requests = self.requests.lock().unwrap();
        requests.iter().map(|(_, timeout)| *timeout).collect()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> anyhow::Result<FetchedPage> {
        self.requests.lock().unwrap().push((url.to_string(), timeout));
        match self.pages.get(url) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(e)) => Err(anyhow!(e.clone())),
            None => Ok(FetchedPage {
                status: 404,
                ..Default::default()
            }),
        }
    }
}

pub fn article_page(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{title}</title><style>.x {{ color: red }}</style></head>\
         <body><header>Site header</header>\
         <article><h1>{title}</h1><p>{body}</p><script>trackVisitor()</script></article>\
         <footer>Site footer</footer></body></html>"
    )
}

pub fn has_message(messages: &[ChatMessage], needle: &str) -> bool {
    messages.iter().any(|m| m.content.contains(needle))
}
