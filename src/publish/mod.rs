pub mod log;
pub mod telegram;

use anyhow::Result;

pub use log::LogPublisher;
pub use telegram::TelegramPublisher;

/// Destination for finished posts.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}
