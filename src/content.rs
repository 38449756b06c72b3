//! Content categories, the weighted category draw, and the prompt texts.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::llm::ModelTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    News,
    Reddit,
    FinanceTips,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [
        ContentKind::News,
        ContentKind::Reddit,
        ContentKind::FinanceTips,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::News => "news",
            ContentKind::Reddit => "reddit",
            ContentKind::FinanceTips => "finance_tips",
        }
    }

    /// Analytic model for news and tips, the cheaper one for Reddit chatter.
    pub fn tier(self) -> ModelTier {
        match self {
            ContentKind::Reddit => ModelTier::Casual,
            ContentKind::News | ContentKind::FinanceTips => ModelTier::Analytic,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative weights of each category. Equal weights give a uniform draw.
/// Negative values count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub news: i64,
    pub reddit: i64,
    pub finance_tips: i64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            news: 1,
            reddit: 1,
            finance_tips: 1,
        }
    }
}

impl CategoryWeights {
    /// Negative weights become 0.
    pub fn clamped(self) -> Self {
        Self {
            news: self.news.max(0),
            reddit: self.reddit.max(0),
            finance_tips: self.finance_tips.max(0),
        }
    }

    fn as_array(&self) -> [u64; 3] {
        [self.news, self.reddit, self.finance_tips].map(|w| u64::try_from(w).unwrap_or(0))
    }
}

/// Draw the category for this cycle. All-zero (or all-negative) weights fall
/// back to uniform.
pub fn pick_kind<R: Rng + ?Sized>(rng: &mut R, weights: &CategoryWeights) -> ContentKind {
    match WeightedIndex::new(weights.as_array()) {
        Ok(dist) => ContentKind::ALL[dist.sample(rng)],
        Err(_) => ContentKind::ALL[rng.random_range(0..ContentKind::ALL.len())],
    }
}

/// Uniform pick of one finance topic.
pub fn pick_topic<'a, R: Rng + ?Sized>(rng: &mut R, topics: &'a [String]) -> Option<&'a str> {
    topics.choose(rng).map(String::as_str)
}

pub fn news_prompt(title: &str) -> String {
    format!("Разбери эту новость кратко: {title}. Добавь мнение и инсайды.")
}

pub fn reddit_prompt(title: &str) -> String {
    format!("Дай свой краткий разбор поста: {title}. Пиши живо и интересно.")
}

pub fn finance_prompt(topic: &str) -> String {
    format!("Дай экспертный совет на тему: {topic}")
}
