use anyhow::{anyhow, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Publisher;

/// Bot API hard limit for `sendMessage` text.
pub const MAX_MESSAGE_CHARS: usize = 4096;

const MAX_RETRY_WAIT: Duration = Duration::from_secs(60);

/// Posts to one fixed chat through the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramPublisher {
    client: Client,
    /// `{api_base}/bot{token}/sendMessage`; never logged.
    endpoint: String,
    chat_id: String,
    parse_mode: Option<String>,
    max_retries: u8,
    backoff: Duration,
}

impl TelegramPublisher {
    pub fn new(client: Client, api_base: &str, token: &str, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
            chat_id: chat_id.into(),
            parse_mode: Some("HTML".to_string()),
            max_retries: 3,
            backoff: Duration::from_millis(500),
        }
    }

    pub fn with_parse_mode(mut self, mode: Option<String>) -> Self {
        self.parse_mode = mode;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Base delay; attempt `n` waits `backoff << (n - 1)`.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn send_once(&self, text: &str, parse_mode: Option<&str>) -> Attempt {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode,
        };
        let rsp = match self.client.post(&self.endpoint).json(&payload).send().await {
            Ok(rsp) => rsp,
            // the endpoint embeds the bot token
            Err(e) => return Attempt::Retry(anyhow!("telegram request failed: {}", e.without_url()), None),
        };

        let status = rsp.status();
        let body: ApiResp = rsp.json().await.unwrap_or_default();
        if status.is_success() && body.ok {
            return Attempt::Sent;
        }

        let desc = body
            .description
            .unwrap_or_else(|| "no description".to_string());
        let err = anyhow!("telegram HTTP {status}: {desc}");
        let retry_after = body
            .parameters
            .and_then(|p| p.retry_after)
            .map(Duration::from_secs);

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Attempt::Retry(err, retry_after)
        } else if status == StatusCode::BAD_REQUEST && desc.contains("can't parse entities") {
            Attempt::BadMarkup(err)
        } else {
            Attempt::Fatal(err)
        }
    }
}

enum Attempt {
    Sent,
    Retry(anyhow::Error, Option<Duration>),
    /// Model output is not valid for the chosen `parse_mode`.
    BadMarkup(anyhow::Error),
    Fatal(anyhow::Error),
}

#[async_trait::async_trait]
impl Publisher for TelegramPublisher {
    async fn publish(&self, text: &str) -> Result<()> {
        let text = clip_message(text);
        let mut parse_mode = self.parse_mode.as_deref();

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.send_once(&text, parse_mode).await {
                Attempt::Sent => return Ok(()),
                Attempt::BadMarkup(e) if parse_mode.is_some() => {
                    tracing::warn!(error = %e, "markup rejected, resending as plain text");
                    parse_mode = None;
                    attempt -= 1;
                }
                Attempt::BadMarkup(e) | Attempt::Fatal(e) => return Err(e),
                Attempt::Retry(e, retry_after) => {
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    let wait = retry_after
                        .unwrap_or_else(|| backoff_delay(self.backoff, attempt))
                        .min(MAX_RETRY_WAIT);
                    tracing::warn!(error = %e, attempt, wait_ms = wait.as_millis() as u64, "telegram send retry");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

/// `base << (attempt - 1)`, saturating instead of overflowing.
fn backoff_delay(base: Duration, attempt: u8) -> Duration {
    let factor = 1u32
        .checked_shl(u32::from(attempt.saturating_sub(1)))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Keep the message within the Bot API limit, cutting on a char boundary.
pub fn clip_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_MESSAGE_CHARS - 1).collect();
    out.push('…');
    out
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResp {
    #[serde(default)]
    ok: bool,
    description: Option<String>,
    parameters: Option<RespParams>,
}

#[derive(Debug, Deserialize)]
struct RespParams {
    retry_after: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_short_text() {
        assert_eq!(clip_message("hi"), "hi");
    }

    #[test]
    fn clip_respects_limit_in_chars() {
        let long = "Я".repeat(5000);
        let out = clip_message(&long);
        assert_eq!(out.chars().count(), MAX_MESSAGE_CHARS);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn backoff_doubles_then_saturates() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), base);
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 33), base * u32::MAX);
        assert_eq!(backoff_delay(Duration::MAX, 255), Duration::MAX);
    }

    #[test]
    fn endpoint_embeds_token() {
        let p = TelegramPublisher::new(Client::new(), "https://api.telegram.org/", "123:abc", "@chan");
        assert_eq!(p.endpoint, "https://api.telegram.org/bot123:abc/sendMessage");
    }

    #[test]
    fn payload_omits_missing_parse_mode() {
        let v = serde_json::to_value(SendMessage {
            chat_id: "@c",
            text: "t",
            parse_mode: None,
        })
        .unwrap();
        assert!(v.get("parse_mode").is_none());
    }
}
