//! The posting loop: pick a category, gather material, generate, publish, sleep.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::config::{BotConfig, Credentials};
use crate::content::{self, ContentKind};
use crate::ingest::{
    self,
    providers::{reddit::RedditProvider, rss::RssProvider},
    types::HeadlineSource,
};
use crate::llm::{self, DynGenerator};
use crate::metrics::{BotStatus, SharedStatus};
use crate::publish::{LogPublisher, Publisher, TelegramPublisher};

/// What a single cycle ended with. Cycles never fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Posted {
        kind: ContentKind,
        /// The model call failed and the fallback text went out instead.
        used_fallback: bool,
    },
    /// Nothing to post (empty fetch or empty topic list).
    Skipped { kind: ContentKind },
    PublishFailed { kind: ContentKind },
}

impl CycleOutcome {
    pub fn kind(&self) -> ContentKind {
        match *self {
            CycleOutcome::Posted { kind, .. }
            | CycleOutcome::Skipped { kind }
            | CycleOutcome::PublishFailed { kind } => kind,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Posted {
                used_fallback: false,
                ..
            } => "posted",
            CycleOutcome::Posted {
                used_fallback: true,
                ..
            } => "posted_fallback",
            CycleOutcome::Skipped { .. } => "skipped",
            CycleOutcome::PublishFailed { .. } => "publish_failed",
        }
    }
}

pub struct ContentBot {
    cfg: BotConfig,
    news: Vec<Box<dyn HeadlineSource>>,
    reddit: Vec<Box<dyn HeadlineSource>>,
    generator: DynGenerator,
    publisher: Arc<dyn Publisher>,
    status: SharedStatus,
}

impl ContentBot {
    pub fn new(
        cfg: BotConfig,
        news: Vec<Box<dyn HeadlineSource>>,
        reddit: Vec<Box<dyn HeadlineSource>>,
        generator: DynGenerator,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            cfg,
            news,
            reddit,
            generator,
            publisher,
            status: Arc::new(RwLock::new(BotStatus::default())),
        }
    }

    /// Wire real providers, the LLM client and the publisher from config + secrets.
    pub fn from_config(cfg: BotConfig, creds: &Credentials) -> Result<Self> {
        let timeout = Duration::from_secs(cfg.http_timeout_secs);
        let client = reqwest::Client::builder()
            .user_agent(concat!("content-bot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("building http client")?;

        let news: Vec<Box<dyn HeadlineSource>> = cfg
            .news_sources
            .iter()
            .map(|s| {
                Box::new(RssProvider::from_url(
                    s.name.clone(),
                    s.url.clone(),
                    client.clone(),
                    cfg.items_per_source,
                    cfg.title_max_chars,
                )) as Box<dyn HeadlineSource>
            })
            .collect();

        let reddit: Vec<Box<dyn HeadlineSource>> = match &creds.reddit {
            Some(rc) if !cfg.subreddits.is_empty() => vec![Box::new(RedditProvider::new(
                client.clone(),
                cfg.reddit.clone(),
                rc.clone(),
                cfg.subreddits.clone(),
                cfg.items_per_source,
                cfg.title_max_chars,
            ))],
            _ => {
                warn!("Reddit credentials or subreddits missing; Reddit posts disabled");
                Vec::new()
            }
        };

        let generator = llm::build_generator(&cfg.llm, &creds.openai_api_key, timeout)?;

        let publisher: Arc<dyn Publisher> = if cfg.dry_run {
            Arc::new(LogPublisher::new(cfg.channel_id.clone()))
        } else {
            Arc::new(
                TelegramPublisher::new(
                    client,
                    &cfg.telegram.api_base,
                    &creds.telegram_token,
                    cfg.channel_id.clone(),
                )
                .with_parse_mode(cfg.telegram.parse_mode.clone())
                .with_retries(cfg.telegram.max_retries),
            )
        };

        info!(
            channel = %cfg.channel_id,
            feeds = news.len(),
            reddit = !reddit.is_empty(),
            llm = generator.provider_name(),
            publisher = publisher.name(),
            "content bot wired"
        );
        Ok(Self::new(cfg, news, reddit, generator, publisher))
    }

    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    /// One iteration. Fetch, model and publish failures are logged and folded
    /// into the outcome; nothing propagates.
    #[instrument(skip_all)]
    pub async fn run_cycle<R: Rng + Send + ?Sized>(&self, rng: &mut R) -> CycleOutcome {
        let kind = content::pick_kind(rng, &self.cfg.weights);
        info!(%kind, "generating new post");
        counter!("bot_cycles_total", "kind" => kind.as_str()).increment(1);

        let outcome = match self.build_prompt(kind, rng).await {
            Some(prompt) => self.generate_and_publish(kind, &prompt).await,
            None => {
                counter!("bot_skipped_total").increment(1);
                CycleOutcome::Skipped { kind }
            }
        };
        self.record(&outcome).await;
        outcome
    }

    async fn build_prompt<R: Rng + Send + ?Sized>(
        &self,
        kind: ContentKind,
        rng: &mut R,
    ) -> Option<String> {
        match kind {
            ContentKind::News => {
                let items = ingest::collect(&self.news).await;
                match items.choose(rng) {
                    Some(h) => {
                        info!(source = %h.source, title = %h.title, "picked headline");
                        Some(content::news_prompt(&h.title))
                    }
                    None => {
                        warn!("no fresh news");
                        None
                    }
                }
            }
            ContentKind::Reddit => {
                let items = ingest::collect(&self.reddit).await;
                match items.choose(rng) {
                    Some(h) => {
                        info!(source = %h.source, title = %h.title, "picked reddit post");
                        Some(content::reddit_prompt(&h.title))
                    }
                    None => {
                        warn!("no current Reddit posts");
                        None
                    }
                }
            }
            ContentKind::FinanceTips => match content::pick_topic(rng, &self.cfg.finance_topics) {
                Some(topic) => {
                    info!(%topic, "picked finance topic");
                    Some(content::finance_prompt(topic))
                }
                None => {
                    warn!("finance topic list is empty");
                    None
                }
            },
        }
    }

    async fn generate_and_publish(&self, kind: ContentKind, prompt: &str) -> CycleOutcome {
        let (text, used_fallback) = match self.generator.generate(prompt, kind.tier()).await {
            Ok(t) => (t, false),
            Err(e) => {
                error!(error = ?e, %kind, "AI text generation failed; using fallback");
                counter!("bot_fallback_posts_total").increment(1);
                (self.cfg.llm.fallback_text.clone(), true)
            }
        };

        match self.publisher.publish(&text).await {
            Ok(()) => {
                info!(%kind, chars = text.chars().count(), publisher = self.publisher.name(), "post published");
                counter!("bot_posts_total").increment(1);
                CycleOutcome::Posted {
                    kind,
                    used_fallback,
                }
            }
            Err(e) => {
                error!(error = ?e, %kind, "failed to publish post");
                counter!("bot_publish_errors_total").increment(1);
                CycleOutcome::PublishFailed { kind }
            }
        }
    }

    async fn record(&self, outcome: &CycleOutcome) {
        let mut s = self.status.write().await;
        s.cycles += 1;
        if matches!(outcome, CycleOutcome::Posted { .. }) {
            s.posts += 1;
        }
        s.last_kind = Some(outcome.kind().as_str().to_string());
        s.last_outcome = Some(outcome.label().to_string());
        s.last_cycle_at = Some(Utc::now());
    }

    /// Uniform pause within the configured inclusive bounds.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let lo = self.cfg.min_delay_secs.min(self.cfg.max_delay_secs);
        let hi = self.cfg.min_delay_secs.max(self.cfg.max_delay_secs);
        let secs = rng.random_range(lo..=hi);
        info!(minutes = secs / 60, "next post in {} minutes", secs / 60);
        Duration::from_secs(secs)
    }

    /// Loop until `shutdown` resolves. Returns the number of completed cycles.
    pub async fn run<F: Future<Output = ()>>(&self, shutdown: F) -> u64 {
        self.run_with_rng(&mut StdRng::from_os_rng(), shutdown).await
    }

    /// Shutdown is honoured mid-cycle as well as mid-sleep.
    pub async fn run_with_rng<R, F>(&self, rng: &mut R, shutdown: F) -> u64
    where
        R: Rng + Send + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.status.write().await.started_at = Some(Utc::now());

        let mut cycles = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                outcome = self.run_cycle(rng) => {
                    cycles += 1;
                    tracing::debug!(?outcome, cycles, "cycle finished");
                }
            }

            let delay = self.next_delay(rng);
            self.status.write().await.next_post_at = next_post_at(delay);

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        info!(cycles, "bot loop stopped");
        cycles
    }
}

/// Wall-clock time of the next post; `None` if it is past what chrono can represent.
fn next_post_at(delay: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| Utc::now().checked_add_signed(d))
}
