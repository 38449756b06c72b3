// src/ingest/providers/reddit.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::{RedditConfig, RedditCredentials};
use crate::ingest::clean_title;
use crate::ingest::types::{Headline, HeadlineSource};

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}
#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}
#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}
#[derive(Debug, Deserialize)]
struct Post {
    title: String,
    #[serde(default)]
    over_18: bool,
    permalink: Option<String>,
    #[serde(default)]
    created_utc: f64,
}

#[derive(Debug, Deserialize)]
struct TokenResp {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Hot posts from a fixed set of subreddits, NSFW dropped.
pub struct RedditProvider {
    subreddits: Vec<String>,
    limit: usize,
    title_max_chars: usize,
    mode: Mode,
}

enum Mode {
    /// Listing JSON keyed by subreddit name.
    Fixture(Vec<(String, String)>),
    Http {
        client: reqwest::Client,
        cfg: RedditConfig,
        creds: RedditCredentials,
        token: Mutex<Option<CachedToken>>,
    },
}

impl RedditProvider {
    pub fn new(
        client: reqwest::Client,
        cfg: RedditConfig,
        creds: RedditCredentials,
        subreddits: Vec<String>,
        limit: usize,
        title_max_chars: usize,
    ) -> Self {
        Self {
            subreddits,
            limit,
            title_max_chars,
            mode: Mode::Http {
                client,
                cfg,
                creds,
                token: Mutex::new(None),
            },
        }
    }

    pub fn from_fixtures(
        listings: Vec<(String, String)>,
        limit: usize,
        title_max_chars: usize,
    ) -> Self {
        Self {
            subreddits: listings.iter().map(|(s, _)| s.clone()).collect(),
            limit,
            title_max_chars,
            mode: Mode::Fixture(listings),
        }
    }

    fn parse_listing(&self, subreddit: &str, json: &str) -> Result<Vec<Headline>> {
        let listing: Listing = serde_json::from_str(json)
            .with_context(|| format!("parsing r/{subreddit} listing"))?;
        Ok(listing
            .data
            .children
            .into_iter()
            .take(self.limit)
            .filter(|c| !c.data.over_18)
            .filter_map(|c| {
                let title = clean_title(&c.data.title, self.title_max_chars)?;
                Some(Headline {
                    source: format!("r/{subreddit}"),
                    title,
                    url: c
                        .data
                        .permalink
                        .map(|p| format!("https://www.reddit.com{p}")),
                    published_at: c.data.created_utc.max(0.0) as u64,
                })
            })
            .collect())
    }

    async fn fetch_subreddit(&self, subreddit: &str) -> Result<Vec<Headline>> {
        match &self.mode {
            Mode::Fixture(listings) => {
                let json = listings
                    .iter()
                    .find(|(s, _)| s == subreddit)
                    .map(|(_, j)| j.as_str())
                    .ok_or_else(|| anyhow!("no fixture for r/{subreddit}"))?;
                self.parse_listing(subreddit, json)
            }
            Mode::Http {
                client,
                cfg,
                creds,
                token,
            } => {
                let url = format!(
                    "{}/r/{}/hot",
                    cfg.api_base.trim_end_matches('/'),
                    subreddit
                );
                // A 401 means the cached token was revoked: drop it and retry once.
                let mut fresh_token = false;
                let rsp = loop {
                    let bearer = access_token(client, cfg, creds, token).await?;
                    let rsp = client
                        .get(&url)
                        .query(&[("limit", self.limit.to_string()), ("raw_json", "1".to_string())])
                        .bearer_auth(&bearer)
                        .header(reqwest::header::USER_AGENT, &cfg.user_agent)
                        .send()
                        .await
                        .with_context(|| format!("r/{subreddit} http get()"))?;
                    if rsp.status() != reqwest::StatusCode::UNAUTHORIZED {
                        break rsp;
                    }
                    *token.lock().await = None;
                    if fresh_token {
                        break rsp;
                    }
                    tracing::warn!(subreddit = %subreddit, "reddit token rejected, refreshing");
                    fresh_token = true;
                };
                let body = rsp
                    .error_for_status()
                    .with_context(|| format!("r/{subreddit} non-2xx"))?
                    .text()
                    .await
                    .with_context(|| format!("r/{subreddit} http .text()"))?;
                self.parse_listing(subreddit, &body)
            }
        }
    }
}

/// Application-only OAuth token, reused until a minute before expiry.
async fn access_token(
    client: &reqwest::Client,
    cfg: &RedditConfig,
    creds: &RedditCredentials,
    slot: &Mutex<Option<CachedToken>>,
) -> Result<String> {
    let mut guard = slot.lock().await;
    if let Some(t) = guard.as_ref() {
        if Instant::now() < t.expires_at {
            return Ok(t.value.clone());
        }
    }

    let resp: TokenResp = client
        .post(&cfg.auth_url)
        .basic_auth(&creds.client_id, Some(&creds.client_secret))
        .header(reqwest::header::USER_AGENT, &cfg.user_agent)
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .context("reddit token request")?
        .error_for_status()
        .context("reddit token non-2xx")?
        .json()
        .await
        .context("reddit token body")?;

    let ttl = Duration::from_secs(resp.expires_in.saturating_sub(60));
    *guard = Some(CachedToken {
        value: resp.access_token.clone(),
        expires_at: Instant::now() + ttl,
    });
    tracing::debug!(ttl_secs = ttl.as_secs(), "reddit token refreshed");
    Ok(resp.access_token)
}

#[async_trait]
impl HeadlineSource for RedditProvider {
    async fn fetch_latest(&self) -> Result<Vec<Headline>> {
        let mut out = Vec::new();
        let mut last_err = None;
        for sub in &self.subreddits {
            tracing::info!(subreddit = %sub, "fetching reddit posts");
            match self.fetch_subreddit(sub).await {
                Ok(mut v) => out.append(&mut v),
                Err(e) => {
                    tracing::warn!(error = ?e, subreddit = %sub, "subreddit fetch failed");
                    metrics::counter!("ingest_provider_errors_total").increment(1);
                    last_err = Some(e);
                }
            }
        }
        // Only a total wipe-out is an error; partial results still get posted.
        match (out.is_empty(), last_err) {
            (true, Some(e)) => Err(e),
            _ => Ok(out),
        }
    }

    fn name(&self) -> &str {
        "Reddit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(posts: &[(&str, bool)]) -> String {
        let children: Vec<serde_json::Value> = posts
            .iter()
            .map(|(t, nsfw)| {
                serde_json::json!({
                    "kind": "t3",
                    "data": {
                        "title": t,
                        "over_18": nsfw,
                        "permalink": "/r/x/comments/abc/",
                        "created_utc": 1_700_000_000.0
                    }
                })
            })
            .collect();
        serde_json::json!({ "kind": "Listing", "data": { "children": children } }).to_string()
    }

    #[tokio::test]
    async fn nsfw_posts_are_dropped() {
        let p = RedditProvider::from_fixtures(
            vec![(
                "stocks".into(),
                listing(&[("Safe one", false), ("Spicy", true), ("Safe two", false)]),
            )],
            3,
            100,
        );
        let items = p.fetch_latest().await.unwrap();
        let titles: Vec<&str> = items.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["Safe one", "Safe two"]);
        assert_eq!(items[0].source, "r/stocks");
        assert_eq!(
            items[0].url.as_deref(),
            Some("https://www.reddit.com/r/x/comments/abc/")
        );
        assert_eq!(items[0].published_at, 1_700_000_000);
    }

    #[tokio::test]
    async fn limit_applies_per_subreddit() {
        let posts = [("a", false), ("b", false), ("c", false), ("d", false)];
        let p = RedditProvider::from_fixtures(
            vec![("one".into(), listing(&posts)), ("two".into(), listing(&posts))],
            3,
            100,
        );
        assert_eq!(p.fetch_latest().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn one_broken_subreddit_does_not_sink_the_rest() {
        let p = RedditProvider::from_fixtures(
            vec![
                ("broken".into(), "{not json".into()),
                ("ok".into(), listing(&[("fine", false)])),
            ],
            3,
            100,
        );
        let items = p.fetch_latest().await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn all_broken_is_an_error() {
        let p = RedditProvider::from_fixtures(vec![("broken".into(), "{}".into())], 3, 100);
        assert!(p.fetch_latest().await.is_err());
    }
}
