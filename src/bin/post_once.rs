//! Run a single bot cycle and exit. Handy for checking credentials and prompts;
//! set `dry_run = true` in the config to print the post instead of sending it.

use content_bot::{telemetry, BotConfig, ContentBot, Credentials};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = BotConfig::load_default()?;
    let creds = Credentials::from_env(cfg.dry_run)?;
    let bot = ContentBot::from_config(cfg, &creds)?;

    let outcome = bot.run_cycle(&mut StdRng::from_os_rng()).await;
    println!("post-once done: {outcome:?}");
    Ok(())
}
