//! Text generation: provider abstraction + OpenAI chat completions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// Which configured model to use for a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Heavier model for news breakdowns and advice.
    Analytic,
    /// Cheaper model for light commentary.
    Casual,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, tier: ModelTier) -> Result<String>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn TextGenerator>;

/// Factory.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock generator.
/// * Otherwise builds the OpenAI client.
pub fn build_generator(cfg: &LlmConfig, api_key: &str, timeout: Duration) -> Result<DynGenerator> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockGenerator::echo()));
    }
    Ok(Arc::new(OpenAiGenerator::new(cfg.clone(), api_key, timeout)?))
}

/// Chat Completions client. Sends the channel system prompt plus the user prompt.
pub struct OpenAiGenerator {
    http: reqwest::Client,
    api_key: String,
    cfg: LlmConfig,
}

impl OpenAiGenerator {
    pub fn new(cfg: LlmConfig, api_key: &str, timeout: Duration) -> Result<Self> {
        // Completions of ~1000 tokens routinely take longer than a feed fetch.
        let http = reqwest::Client::builder()
            .user_agent(concat!("content-bot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout.max(Duration::from_secs(60)))
            .build()
            .context("building llm http client")?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            cfg,
        })
    }

    fn model(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Analytic => &self.cfg.analytic_model,
            ModelTier::Casual => &self.cfg.casual_model,
        }
    }

    async fn complete(&self, prompt: &str, tier: ModelTier) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        if self.api_key.is_empty() {
            return Err(anyhow!("OPENAI_API_KEY is empty"));
        }

        let req = Req {
            model: self.model(tier),
            messages: vec![
                Msg {
                    role: "system",
                    content: &self.cfg.system_prompt,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.cfg.max_tokens,
        };

        let url = format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        );
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("chat completion request")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "chat completion HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            ));
        }

        let body: Resp = resp.json().await.context("chat completion body")?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(anyhow!("chat completion returned no content"));
        }
        Ok(content)
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str, tier: ModelTier) -> Result<String> {
        let t0 = std::time::Instant::now();
        let out = self.complete(prompt, tier).await;
        histogram!("llm_request_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        if out.is_err() {
            counter!("llm_errors_total").increment(1);
        }
        out
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Deterministic generator for tests and local runs.
#[derive(Clone)]
pub struct MockGenerator {
    fixed: Option<String>,
    fail: bool,
}

impl MockGenerator {
    /// Echoes the prompt back, prefixed with the tier.
    pub fn echo() -> Self {
        Self {
            fixed: None,
            fail: false,
        }
    }

    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            fixed: Some(text.into()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fixed: None,
            fail: true,
        }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str, tier: ModelTier) -> Result<String> {
        if self.fail {
            return Err(anyhow!("mock generator failure"));
        }
        Ok(match &self.fixed {
            Some(s) => s.clone(),
            None => format!("[{tier:?}] {prompt}"),
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
