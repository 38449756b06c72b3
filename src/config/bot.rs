// src/config/bot.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::content::CategoryWeights;

pub const ENV_CONFIG_PATH: &str = "BOT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/bot.toml";

const DEFAULT_TITLE_MAX_CHARS: usize = 100;
const MAX_SEND_RETRIES: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsSource {
    pub name: String,
    pub url: String,
}

impl NewsSource {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

fn default_news_sources() -> Vec<NewsSource> {
    vec![
        NewsSource::new("Yahoo Finance", "https://finance.yahoo.com/rss/topstories"),
        NewsSource::new("BBC News", "http://feeds.bbci.co.uk/news/rss.xml"),
        NewsSource::new("TechCrunch", "https://techcrunch.com/feed/"),
        NewsSource::new("Crypto News", "https://cryptonews.com/news/feed/"),
    ]
}

fn default_subreddits() -> Vec<String> {
    ["stocks", "technology", "crypto", "finance"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_finance_topics() -> Vec<String> {
    [
        "Лучшие способы пассивного дохода в 2025 году",
        "Почему важно инвестировать в себя?",
        "Какие активы защищают деньги от инфляции?",
        "Как минимизировать риски при инвестициях?",
        "Ошибки начинающих инвесторов и как их избежать",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Chat-completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    /// Used for news breakdowns and finance tips.
    pub analytic_model: String,
    /// Used for Reddit riffs.
    pub casual_model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
    /// Posted instead of the generated text when the completion call fails.
    pub fallback_text: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            analytic_model: "gpt-4-turbo".to_string(),
            casual_model: "gpt-3.5-turbo".to_string(),
            max_tokens: 1000,
            system_prompt:
                "Ты ведешь Telegram-канал. Пиши интересно, добавляй эмоции и инсайды.".to_string(),
            fallback_text: "🤖 Ошибка AI. Обсудим в комментариях!".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_base: String,
    pub parse_mode: Option<String>,
    pub max_retries: u8,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            parse_mode: Some("HTML".to_string()),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub user_agent: String,
    pub auth_url: String,
    pub api_base: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: "MyTelegramBot/0.1 by defiler16".to_string(),
            auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            api_base: "https://oauth.reddit.com".to_string(),
        }
    }
}

/// Everything the bot loop needs apart from secrets (see [`super::Credentials`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Destination chat, e.g. `@channel_name` or a numeric id.
    pub channel_id: String,
    pub news_sources: Vec<NewsSource>,
    pub subreddits: Vec<String>,
    /// Items taken from the top of each feed / listing.
    pub items_per_source: usize,
    pub title_max_chars: usize,
    /// Inclusive bounds of the pause between posts.
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
    pub weights: CategoryWeights,
    pub finance_topics: Vec<String>,
    pub http_timeout_secs: u64,
    /// Log posts instead of sending them.
    pub dry_run: bool,
    /// Bind address for `/health` + `/metrics`; disabled when absent.
    pub status_addr: Option<SocketAddr>,
    pub llm: LlmConfig,
    pub telegram: TelegramConfig,
    pub reddit: RedditConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            channel_id: "@gachistocks".to_string(),
            news_sources: default_news_sources(),
            subreddits: default_subreddits(),
            items_per_source: 3,
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
            min_delay_secs: 1800,
            max_delay_secs: 10_800,
            weights: CategoryWeights::default(),
            finance_topics: default_finance_topics(),
            http_timeout_secs: 10,
            dry_run: false,
            status_addr: None,
            llm: LlmConfig::default(),
            telegram: TelegramConfig::default(),
            reddit: RedditConfig::default(),
        }
    }
}

impl BotConfig {
    /// Parse a TOML file. Missing keys take their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading bot config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing bot config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: BotConfig = toml::from_str(s)?;
        Ok(cfg.sanitized())
    }

    /// Resolve config using env var + fallbacks:
    /// 1) $BOT_CONFIG_PATH
    /// 2) config/bot.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::load_from(&fallback);
        }
        Ok(Self::default())
    }

    fn sanitized(mut self) -> Self {
        if self.min_delay_secs > self.max_delay_secs {
            std::mem::swap(&mut self.min_delay_secs, &mut self.max_delay_secs);
        }
        if self.title_max_chars == 0 {
            self.title_max_chars = DEFAULT_TITLE_MAX_CHARS;
        }
        if self.items_per_source == 0 {
            self.items_per_source = 1;
        }
        if self.http_timeout_secs == 0 {
            self.http_timeout_secs = 10;
        }
        self.weights = self.weights.clamped();
        self.telegram.max_retries = self.telegram.max_retries.clamp(1, MAX_SEND_RETRIES);
        self.channel_id = self.channel_id.trim().to_string();
        self.subreddits = clean_list(std::mem::take(&mut self.subreddits));
        self.finance_topics = clean_list(std::mem::take(&mut self.finance_topics));
        self
    }
}

/// Trim entries, drop blanks and repeats; keeps first-seen order.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
