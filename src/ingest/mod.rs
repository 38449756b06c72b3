// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::ingest::types::{Headline, HeadlineSource};
use metrics::counter;

/// Normalize a title: decode HTML entities, strip tags, collapse whitespace, trim.
pub fn normalize_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Cap a title at `max` chars, appending "..." when something was cut.
/// Counts chars, so Cyrillic/emoji titles never split mid-codepoint.
pub fn truncate_title(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    } else {
        s.to_string()
    }
}

/// Normalize + truncate; `None` for titles that end up empty.
pub fn clean_title(raw: &str, max: usize) -> Option<String> {
    let t = normalize_title(raw);
    if t.is_empty() {
        None
    } else {
        Some(truncate_title(&t, max))
    }
}

/// Query every provider in order. Failed providers are logged and skipped;
/// the result is whatever the rest returned.
pub async fn collect(providers: &[Box<dyn HeadlineSource>]) -> Vec<Headline> {
    let mut all = Vec::new();
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut v) => {
                tracing::debug!(provider = p.name(), items = v.len(), "provider fetched");
                counter!("ingest_items_total").increment(v.len() as u64);
                all.append(&mut v);
            }
            Err(e) => {
                tracing::error!(error = ?e, provider = p.name(), "headline fetch failed");
                counter!("ingest_provider_errors_total").increment(1);
            }
        }
    }
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_title_decodes_and_collapses() {
        let s = "  Stocks&nbsp;&amp; <b>bonds</b>\n rally  ";
        assert_eq!(normalize_title(s), "Stocks & bonds rally");
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let s = "Ж".repeat(120);
        let out = truncate_title(&s, 100);
        assert_eq!(out.chars().count(), 103);
        assert!(out.ends_with("..."));
        assert!(out.starts_with("ЖЖЖ"));
    }

    #[test]
    fn short_titles_are_untouched() {
        assert_eq!(truncate_title("Fed holds", 100), "Fed holds");
        let exact = "a".repeat(100);
        assert_eq!(truncate_title(&exact, 100), exact);
    }

    #[test]
    fn blank_titles_are_dropped() {
        assert_eq!(clean_title(" &nbsp; ", 100), None);
        assert_eq!(clean_title("x", 100), Some("x".to_string()));
    }
}
