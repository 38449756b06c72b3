// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod bot;
pub mod config;
pub mod content;
pub mod ingest;
pub mod llm;
pub mod metrics;
pub mod publish;
pub mod telemetry;

pub use crate::bot::{ContentBot, CycleOutcome};
pub use crate::config::{BotConfig, Credentials};
pub use crate::content::ContentKind;
