pub mod bot;
pub mod credentials;

pub use bot::{BotConfig, LlmConfig, NewsSource, RedditConfig, TelegramConfig};
pub use credentials::{Credentials, RedditCredentials};
