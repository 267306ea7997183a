/// Text processing utilities
pub mod text {
    use regex::Regex;
    use std::sync::OnceLock;

    fn list_item_pattern() -> &'static Regex {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        PATTERN.get_or_init(|| {
            Regex::new(r"^\s*(?:\d+\s*[.)]|[-*•])\s+(.+?)\s*$")
                .expect("list item pattern is valid")
        })
    }

    /// Keep at most `max_chars` characters, never splitting a code point.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((byte_index, _)) => text[..byte_index].to_string(),
            None => text.to_string(),
        }
    }

    /// Items of a numbered (`1.`, `2)`) or bulleted (`-`, `*`, `•`) list.
    /// When no line looks like a list item every non-blank line is taken.
    pub fn parse_list_items(text: &str) -> Vec<String> {
        let pattern = list_item_pattern();

        let items: Vec<String> = text
            .lines()
            .filter_map(|line| pattern.captures(line))
            .filter_map(|captures| captures.get(1))
            .map(|item| strip_quotes(item.as_str()))
            .filter(|item| !item.is_empty())
            .collect();

        if !items.is_empty() {
            return items;
        }

        text.lines()
            .map(strip_quotes)
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Trim whitespace and one layer of matching quotes.
    pub fn strip_quotes(text: &str) -> String {
        let trimmed = text.trim();
        for quote in ['"', '\'', '`'] {
            if let Some(inner) = trimmed
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
            {
                return inner.trim().to_string();
            }
        }
        trimmed.to_string()
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Only absolute http(s) URLs are worth fetching.
    pub fn is_fetchable_url(url_str: &str) -> bool {
        match Url::parse(url_str) {
            Ok(url) => url.scheme() == "http" || url.scheme() == "https",
            Err(_) => false,
        }
    }
}
