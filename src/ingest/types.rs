// src/ingest/types.rs
use anyhow::Result;

/// One title pulled from a feed or listing; lives for a single bot cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub source: String,    // e.g. "BBC News", "r/stocks"
    pub title: String,     // normalized + truncated
    pub url: Option<String>,
    pub published_at: u64, // unix seconds, 0 when unknown
}

#[async_trait::async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Headline>>;
    fn name(&self) -> &str;
}
