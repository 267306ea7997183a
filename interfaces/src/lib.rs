pub mod defs;
pub mod state;

pub use defs::{
    ChatMessage, Document, FetchedPage, LlmClient, LlmResponse, PageFetcher, Role, ScrapedPage,
    SearchClient, SearchHit,
};
pub use state::{ResearchState, StateUpdate};
