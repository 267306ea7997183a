pub mod content_scraper;
pub mod content_summarizer;
pub mod query_generator;
pub mod report_compiler;
pub mod web_searcher;

pub use content_scraper::ContentScraper;
pub use content_summarizer::ContentSummarizer;
pub use query_generator::QueryGenerator;
pub use report_compiler::ReportCompiler;
pub use web_searcher::WebSearcher;
