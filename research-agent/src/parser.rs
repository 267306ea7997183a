use encoding_rs::{Encoding, UTF_8};
use regex::bytes::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::debug;

use crate::types::{FetchedPage, MAX_CONTENT_CHARS};
use crate::utils::text::truncate_chars;

/// Containers tried in order when looking for a page's main content.
const CONTENT_ROOTS: [&str; 3] = ["article", "main", "body"];

/// Subtrees whose text is never part of the readable content.
const SKIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Bytes scanned for a `<meta>` charset declaration.
const META_PRESCAN_BYTES: usize = 1024;

/// Extracts readable text from an HTML page.
pub struct ContentExtractor {
    max_chars: usize,
}

impl ContentExtractor {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Decode a fetched page and extract its readable text.
    pub fn extract_page(&self, page: &FetchedPage) -> String {
        let html = decode_body(&page.body, page.content_type.as_deref());
        self.extract(&html)
    }

    pub fn extract(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let root = select_content_root(&document);

        let mut lines = Vec::new();
        collect_text(root, &mut lines);

        let text = lines.join("\n");
        let text = text.trim();
        debug!(
            root = root.value().name(),
            chars = text.chars().count(),
            "Extracted page text"
        );
        truncate_chars(text, self.max_chars)
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(MAX_CONTENT_CHARS)
    }
}

fn meta_charset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i-u)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_.:-]+)"#)
            .expect("meta charset pattern is valid")
    })
}

fn header_charset(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches(|c: char| c == '"' || c == '\''))
}

fn meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(META_PRESCAN_BYTES)];
    meta_charset_pattern()
        .captures(head)
        .and_then(|captures| captures.get(1))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
}

/// Decode an HTML body. A byte-order mark wins, then the `Content-Type`
/// charset, then a `<meta>` declaration; anything else is read as UTF-8.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(header_charset)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| meta_charset(body))
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        debug!(encoding = used.name(), "Page body contained malformed sequences");
    }
    text.into_owned()
}

fn select_content_root(document: &Html) -> ElementRef<'_> {
    CONTENT_ROOTS
        .iter()
        .filter_map(|tag| Selector::parse(tag).ok())
        .find_map(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element())
}

fn collect_text(element: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if SKIPPED_TAGS.contains(&child_element.value().name()) {
                continue;
            }
            collect_text(child_element, lines);
        }
    }
}
