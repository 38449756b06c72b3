use anyhow::Result;

use super::Publisher;

/// Dry-run publisher: writes the post to the log instead of a channel.
#[derive(Debug, Clone)]
pub struct LogPublisher {
    channel_id: String,
}

impl LogPublisher {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, text: &str) -> Result<()> {
        tracing::info!(channel = %self.channel_id, chars = text.chars().count(), "dry run post:\n{text}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
