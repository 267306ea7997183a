mod common;

use common::{article_page, has_message, init_tracing, FakeFetcher, FakeSearch, ScriptedLlm};
use research_agent::stages::{
    ContentScraper, ContentSummarizer, QueryGenerator, ReportCompiler, WebSearcher,
};
use research_agent::{
    Document, FetchConfig, ResearchStage, ResearchState, Role, ScrapedPage, StateUpdate,
};
use std::sync::Arc;
use std::time::Duration;

fn doc(url: &str) -> Document {
    Document {
        url: url.to_string(),
        snippet: String::new(),
    }
}

fn page(url: &str, content: &str) -> ScrapedPage {
    ScrapedPage {
        url: url.to_string(),
        content: content.to_string(),
    }
}

fn state_with<F: FnOnce(&mut ResearchState)>(topic: &str, f: F) -> ResearchState {
    let mut state = ResearchState::new(topic);
    f(&mut state);
    state
}

// Query generation

#[tokio::test]
async fn query_generator_parses_numbered_list() {
    init_tracing();
    let llm = Arc::new(ScriptedLlm::always("1. Q1\n2. Q2\n3. Q3"));
    let stage = QueryGenerator::new(llm.clone());

    let update = stage.run(&ResearchState::new("AI and creative writing")).await;

    assert_eq!(
        update.search_queries,
        Some(vec!["Q1".to_string(), "Q2".to_string(), "Q3".to_string()])
    );
    assert_eq!(update.error_message(), "");
    assert_eq!(llm.call_count(), 1);
    assert!(llm.prompts()[0]
        .iter()
        .any(|m| m.role == Role::User && m.content.contains("AI and creative writing")));
    assert!(has_message(&update.messages, "Generated 3 search queries"));
}

#[tokio::test]
async fn query_generator_caps_at_five_queries() {
    init_tracing();
    let reply = (1..=8).map(|i| format!("{}. query {}", i, i)).collect::<Vec<_>>().join("\n");
    let stage = QueryGenerator::new(Arc::new(ScriptedLlm::always(&reply)));

    let update = stage.run(&ResearchState::new("ocean acidification")).await;
    let queries = update.search_queries.unwrap();

    assert_eq!(queries.len(), 5);
    assert_eq!(queries[0], "query 1");
    assert_eq!(queries[4], "query 5");
}

#[tokio::test]
async fn query_generator_rejects_blank_topic_without_calling_llm() {
    init_tracing();
    let llm = Arc::new(ScriptedLlm::always("1. never used"));
    let stage = QueryGenerator::new(llm.clone());

    for topic in ["", "   \t\n"] {
        let update = stage.run(&ResearchState::new(topic)).await;
        assert_eq!(update.search_queries, Some(Vec::new()));
        assert!(update.error_message().contains("Invalid topic"));
    }
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn query_generator_reports_llm_failure() {
    init_tracing();
    let stage = QueryGenerator::new(Arc::new(ScriptedLlm::failing("quota exceeded")));

    let update = stage.run(&ResearchState::new("fusion power")).await;

    assert_eq!(update.search_queries, Some(Vec::new()));
    assert!(update.error_message().contains("Error generating queries"));
    assert!(update.error_message().contains("quota exceeded"));
    assert!(has_message(&update.messages, "quota exceeded"));
}

#[tokio::test]
async fn query_generator_treats_empty_reply_as_failure() {
    init_tracing();
    let stage = QueryGenerator::new(Arc::new(ScriptedLlm::always("  \n ")));

    let update = stage.run(&ResearchState::new("fusion power")).await;

    assert_eq!(update.search_queries, Some(Vec::new()));
    assert!(update.error_message().contains("Error generating queries"));
}

// Web search

#[tokio::test]
async fn web_searcher_deduplicates_by_url() {
    init_tracing();
    let search = Arc::new(
        FakeSearch::new()
            .with_results("q1", &["http://a", "http://shared"])
            .with_results("q2", &["http://shared", "http://b"]),
    );
    let stage = WebSearcher::new(search.clone());
    let state = state_with("topic", |s| s.search_queries = vec!["q1".into(), "q2".into()]);

    let update = stage.run(&state).await;
    let docs = update.retrieved_docs.unwrap();
    let urls: Vec<_> = docs.iter().map(|d| d.url.as_str()).collect();

    assert_eq!(urls, vec!["http://a", "http://shared", "http://b"]);
    assert_eq!(docs.iter().filter(|d| d.url == "http://shared").count(), 1);
    assert_eq!(search.queries(), vec!["q1", "q2"]);
    assert_eq!(update.error_message.as_deref(), Some(""));
}

#[tokio::test]
async fn web_searcher_without_queries_skips_the_service() {
    init_tracing();
    let search = Arc::new(FakeSearch::new().with_results("q", &["http://a"]));
    let stage = WebSearcher::new(search.clone());

    let update = stage.run(&ResearchState::new("topic")).await;

    assert_eq!(update.retrieved_docs, Some(Vec::new()));
    assert!(update.error_message().contains("No search queries provided"));
    assert!(search.queries().is_empty());
}

#[tokio::test]
async fn web_searcher_keeps_going_after_a_failed_query() {
    init_tracing();
    let search = Arc::new(
        FakeSearch::new()
            .with_failure("bad", "rate limited")
            .with_results("good", &["http://ok"]),
    );
    let stage = WebSearcher::new(search);
    let state = state_with("topic", |s| s.search_queries = vec!["bad".into(), "good".into()]);

    let update = stage.run(&state).await;

    assert_eq!(update.retrieved_docs.as_ref().unwrap().len(), 1);
    assert_eq!(update.error_message(), "");
    assert!(has_message(&update.messages, "Search failed for query 'bad'"));
}

#[tokio::test]
async fn web_searcher_reports_unavailable_service() {
    init_tracing();
    let search = Arc::new(FakeSearch::new().unavailable("TAVILY_API_KEY is not set"));
    let stage = WebSearcher::new(search.clone());
    let state = state_with("topic", |s| s.search_queries = vec!["q".into()]);

    let update = stage.run(&state).await;

    assert_eq!(update.retrieved_docs, Some(Vec::new()));
    assert!(update.error_message().contains("Error during web search"));
    assert!(search.queries().is_empty());
}

#[tokio::test]
async fn web_searcher_limits_results_per_query() {
    init_tracing();
    let search = Arc::new(FakeSearch::new().with_results(
        "q",
        &["http://1", "http://2", "http://3", "http://4", "http://5"],
    ));
    let stage = WebSearcher::new(search);
    let state = state_with("topic", |s| s.search_queries = vec!["q".into()]);

    let update = stage.run(&state).await;

    assert_eq!(update.retrieved_docs.unwrap().len(), 3);
}

// Scraping

#[tokio::test]
async fn scraper_records_failures_per_document() {
    init_tracing();
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with_page("http://good", &article_page("Good", "Useful findings."))
            .with_status("http://missing", 404)
            .with_status("http://broken", 500)
            .with_error("http://slow", "operation timed out"),
    );
    let stage = ContentScraper::new(fetcher, &FetchConfig::default());
    let state = state_with("topic", |s| {
        s.retrieved_docs = vec![
            doc("http://good"),
            doc("http://missing"),
            doc("http://broken"),
            doc("http://slow"),
        ]
    });

    let update = stage.run(&state).await;
    let scraped = update.scraped_data.clone().unwrap();

    assert_eq!(scraped.len(), 1);
    assert_eq!(scraped[0].url, "http://good");
    assert_eq!(update.error_message(), "");
    assert!(has_message(&update.messages, "Failed to scrape http://missing: HTTP 404"));
    assert!(has_message(&update.messages, "Failed to scrape http://broken: HTTP 500"));
    assert!(has_message(&update.messages, "Failed to scrape http://slow"));
}

#[tokio::test]
async fn scraper_extracts_article_without_scripts_or_styles() {
    init_tracing();
    let fetcher = Arc::new(
        FakeFetcher::new().with_page("http://x", &article_page("Title", "Body text here.")),
    );
    let stage = ContentScraper::new(fetcher, &FetchConfig::default());
    let state = state_with("topic", |s| s.retrieved_docs = vec![doc("http://x")]);

    let update = stage.run(&state).await;
    let content = &update.scraped_data.unwrap()[0].content;

    assert!(content.contains("Body text here."));
    assert!(!content.contains("trackVisitor"));
    assert!(!content.contains("color: red"));
    assert!(!content.contains("Site header"));
    assert!(!content.contains("Site footer"));
}

#[tokio::test]
async fn scraper_truncates_content() {
    init_tracing();
    let long_body = "word ".repeat(3000);
    let fetcher = Arc::new(
        FakeFetcher::new().with_page("http://long", &article_page("T", &long_body)),
    );
    let stage = ContentScraper::new(fetcher, &FetchConfig::default());
    let state = state_with("topic", |s| s.retrieved_docs = vec![doc("http://long")]);

    let update = stage.run(&state).await;

    assert_eq!(update.scraped_data.unwrap()[0].content.chars().count(), 5000);
}

#[tokio::test]
async fn scraper_fetches_each_url_once() {
    init_tracing();
    let fetcher = Arc::new(FakeFetcher::new().with_page("http://x", &article_page("X", "content")));
    let stage = ContentScraper::new(fetcher.clone(), &FetchConfig::default());
    let state = state_with("topic", |s| s.retrieved_docs = vec![doc("http://x"), doc("http://x")]);

    let update = stage.run(&state).await;

    assert_eq!(fetcher.requests(), vec!["http://x"]);
    assert_eq!(update.scraped_data.unwrap().len(), 1);
}

#[tokio::test]
async fn scraper_without_documents_reports_error() {
    init_tracing();
    let fetcher = Arc::new(FakeFetcher::new());
    let stage = ContentScraper::new(fetcher.clone(), &FetchConfig::default());

    let update = stage.run(&ResearchState::new("topic")).await;

    assert_eq!(update.scraped_data, Some(Vec::new()));
    assert!(update.error_message().contains("No documents to scrape"));
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn scraper_skips_non_http_urls() {
    init_tracing();
    let fetcher = Arc::new(FakeFetcher::new());
    let stage = ContentScraper::new(fetcher.clone(), &FetchConfig::default());
    let state = state_with("topic", |s| {
        s.retrieved_docs = vec![doc("ftp://files.example.com/report"), doc("   ")]
    });

    let update = stage.run(&state).await;

    assert!(fetcher.requests().is_empty());
    assert_eq!(update.scraped_data, Some(Vec::new()));
    assert!(has_message(&update.messages, "Failed to scrape ftp://files.example.com/report"));
}

#[tokio::test]
async fn scraper_fetches_with_the_configured_timeout() {
    init_tracing();
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with_page("http://a", &article_page("A", "first"))
            .with_page("http://b", &article_page("B", "second")),
    );
    let stage = ContentScraper::new(fetcher.clone(), &FetchConfig::default());
    let state = state_with("topic", |s| s.retrieved_docs = vec![doc("http://a"), doc("http://b")]);

    stage.run(&state).await;

    assert_eq!(
        fetcher.timeouts(),
        vec![Duration::from_secs(10), Duration::from_secs(10)]
    );

    let custom = FetchConfig {
        timeout_seconds: 3,
        ..FetchConfig::default()
    };
    let fetcher = Arc::new(FakeFetcher::new());
    let stage = ContentScraper::new(fetcher.clone(), &custom);
    stage.run(&state).await;

    assert_eq!(
        fetcher.timeouts(),
        vec![Duration::from_secs(3), Duration::from_secs(3)]
    );
}

#[tokio::test]
async fn scraper_decodes_pages_in_their_declared_charset() {
    init_tracing();
    let latin1: &[u8] = b"<html><head><meta charset=\"iso-8859-1\"></head>\
                          <body><p>caf\xe9 na\xefve</p></body></html>";
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with_bytes("http://meta", Some("text/html"), latin1)
            .with_bytes(
                "http://header",
                Some("text/html; charset=windows-1252"),
                b"<p>\xc0 la carte</p>",
            ),
    );
    let stage = ContentScraper::new(fetcher, &FetchConfig::default());
    let state = state_with("topic", |s| {
        s.retrieved_docs = vec![doc("http://meta"), doc("http://header")]
    });

    let update = stage.run(&state).await;
    let scraped = update.scraped_data.unwrap();

    assert_eq!(scraped[0].content, "café naïve");
    assert_eq!(scraped[1].content, "À la carte");
}

#[tokio::test]
async fn scraper_keeps_the_document_url_as_given() {
    init_tracing();
    let fetcher = Arc::new(FakeFetcher::new().with_page("http://x", &article_page("X", "content")));
    let stage = ContentScraper::new(fetcher.clone(), &FetchConfig::default());
    let state = state_with("topic", |s| s.retrieved_docs = vec![doc("  http://x \n")]);

    let update = stage.run(&state).await;
    let scraped = update.scraped_data.unwrap();

    assert_eq!(fetcher.requests(), vec!["http://x"]);
    assert_eq!(scraped.len(), 1);
    assert_eq!(scraped[0].url, "  http://x \n");
}

// Summarization

#[tokio::test]
async fn summarizer_skips_blank_content_without_llm_call() {
    init_tracing();
    let llm = Arc::new(ScriptedLlm::always("  A short summary.  "));
    let stage = ContentSummarizer::new(llm.clone());
    let state = state_with("topic", |s| {
        s.scraped_data = vec![page("http://blank", "  \n\t "), page("http://full", "Real content.")]
    });

    let update = stage.run(&state).await;

    assert_eq!(llm.call_count(), 1);
    assert_eq!(update.summaries, Some(vec!["A short summary.".to_string()]));
    assert_eq!(update.error_message(), "");
    assert!(has_message(&update.messages, "Skipping summarization for http://blank"));
    assert!(has_message(&update.messages, "Successfully summarized content from 1 document(s)."));
}

#[tokio::test]
async fn summarizer_continues_past_failures() {
    init_tracing();
    let llm = Arc::new(ScriptedLlm::new(vec![
        Err("model overloaded".to_string()),
        Ok("   ".to_string()),
        Ok("Third summary".to_string()),
    ]));
    let stage = ContentSummarizer::new(llm.clone());
    let state = state_with("topic", |s| {
        s.scraped_data = vec![
            page("http://1", "one"),
            page("http://2", "two"),
            page("http://3", "three"),
        ]
    });

    let update = stage.run(&state).await;

    assert_eq!(llm.call_count(), 3);
    assert_eq!(update.summaries, Some(vec!["Third summary".to_string()]));
    assert_eq!(update.error_message(), "");
    assert!(has_message(&update.messages, "Error summarizing content from http://1"));
    assert!(has_message(&update.messages, "LLM returned an empty summary for http://2"));
}

#[tokio::test]
async fn summarizer_reports_when_nothing_was_summarized() {
    init_tracing();
    let stage = ContentSummarizer::new(Arc::new(ScriptedLlm::failing("timeout")));
    let state = state_with("topic", |s| s.scraped_data = vec![page("http://1", "text")]);

    let update = stage.run(&state).await;

    assert_eq!(update.summaries, Some(Vec::new()));
    assert!(update.error_message().contains("Could not generate any summaries"));

    let all_blank = ContentSummarizer::new(Arc::new(ScriptedLlm::always("unused")));
    let state = state_with("topic", |s| s.scraped_data = vec![page("http://1", " ")]);
    let update = all_blank.run(&state).await;
    assert!(update.error_message().contains("Could not generate any summaries"));
}

#[tokio::test]
async fn summarizer_without_content_reports_error() {
    init_tracing();
    let llm = Arc::new(ScriptedLlm::always("unused"));
    let stage = ContentSummarizer::new(llm.clone());

    let update = stage.run(&ResearchState::new("topic")).await;

    assert_eq!(update.summaries, Some(Vec::new()));
    assert!(update.error_message().contains("No scraped content available to summarize"));
    assert_eq!(llm.call_count(), 0);
}

// Report compilation

#[tokio::test]
async fn report_compiler_without_summaries_skips_llm() {
    init_tracing();
    let llm = Arc::new(ScriptedLlm::always("# Report"));
    let stage = ReportCompiler::new(llm.clone());

    let update = stage.run(&ResearchState::new("topic")).await;

    assert_eq!(update.final_report, Some(String::new()));
    assert!(update.error_message().contains("No summaries available"));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn report_compiler_joins_summaries_into_prompt() {
    init_tracing();
    let llm = Arc::new(ScriptedLlm::always("# Report\n\nIntro, body, conclusion."));
    let stage = ReportCompiler::new(llm.clone());
    let state = state_with("deep sea mining", |s| {
        s.summaries = vec!["First summary".into(), "Second summary".into()]
    });

    let update = stage.run(&state).await;

    assert_eq!(
        update.final_report.as_deref(),
        Some("# Report\n\nIntro, body, conclusion.")
    );
    assert_eq!(update.error_message(), "");
    let prompt = &llm.prompts()[0];
    let user = prompt.iter().find(|m| m.role == Role::User).unwrap();
    assert!(user.content.contains("First summary\n\n---\n\nSecond summary"));
    assert!(user.content.contains("deep sea mining"));
}

#[tokio::test]
async fn report_compiler_reports_llm_failure() {
    init_tracing();
    let stage = ReportCompiler::new(Arc::new(ScriptedLlm::failing("connection reset")));
    let state = state_with("topic", |s| s.summaries = vec!["s".into()]);

    let update = stage.run(&state).await;

    assert_eq!(update.final_report, Some(String::new()));
    assert!(update.error_message().contains("Error compiling report"));
}

#[test]
fn stage_updates_merge_into_state() {
    let state = ResearchState::new("topic").apply(StateUpdate {
        search_queries: Some(vec!["q".into()]),
        ..Default::default()
    });
    assert_eq!(state.search_queries, vec!["q"]);
    assert_eq!(state.topic, "topic");
}
