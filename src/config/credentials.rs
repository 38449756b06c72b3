// src/config/credentials.rs
use anyhow::{anyhow, Result};
use std::env;

#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Secrets read from the environment (or `.env`).
#[derive(Clone, Default)]
pub struct Credentials {
    pub telegram_token: String,
    pub openai_api_key: String,
    pub reddit: Option<RedditCredentials>,
}

impl std::fmt::Debug for Credentials {
    // Never print secrets; lengths are enough for diagnostics.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("telegram_token_len", &self.telegram_token.len())
            .field("openai_api_key_len", &self.openai_api_key.len())
            .field("reddit", &self.reddit.is_some())
            .finish()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Credentials {
    /// Reads `TELEGRAM_TOKEN`, `OPENAI_API_KEY`, `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`.
    ///
    /// Telegram and OpenAI keys are mandatory unless `dry_run` is set (or the LLM
    /// is mocked via `AI_TEST_MODE=mock`). Reddit is optional: without it the
    /// Reddit category simply finds nothing to post.
    pub fn from_env(dry_run: bool) -> Result<Self> {
        let mock_ai = env::var("AI_TEST_MODE").is_ok_and(|v| v == "mock");

        let telegram_token = match non_empty_var("TELEGRAM_TOKEN") {
            Some(v) => v,
            None if dry_run => String::new(),
            None => return Err(anyhow!("Missing TELEGRAM_TOKEN env var")),
        };
        let openai_api_key = match non_empty_var("OPENAI_API_KEY") {
            Some(v) => v,
            None if dry_run || mock_ai => String::new(),
            None => return Err(anyhow!("Missing OPENAI_API_KEY env var")),
        };
        let reddit = match (
            non_empty_var("REDDIT_CLIENT_ID"),
            non_empty_var("REDDIT_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(client_secret)) => Some(RedditCredentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        Ok(Self {
            telegram_token,
            openai_api_key,
            reddit,
        })
    }
}
