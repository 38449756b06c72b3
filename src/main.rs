//! Content bot: binary entrypoint.
//! Loads config + secrets, wires providers, and runs the posting loop until Ctrl-C.

use anyhow::Result;
use content_bot::metrics::{serve_status, status_router, Metrics};
use content_bot::{telemetry, BotConfig, ContentBot, Credentials};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = BotConfig::load_default()?;
    let creds = Credentials::from_env(cfg.dry_run)?;
    info!(?creds, dry_run = cfg.dry_run, "configuration loaded");

    let status_addr = cfg.status_addr;
    let bot = ContentBot::from_config(cfg, &creds)?;

    let (stop_tx, stop_rx) = watch::channel(false);

    let status_task = match status_addr {
        Some(addr) => {
            let handle = match Metrics::init() {
                Ok(m) => Some(m.handle),
                Err(e) => {
                    warn!(error = ?e, "metrics recorder unavailable");
                    None
                }
            };
            let router = status_router(handle, bot.status());
            let mut rx = stop_rx.clone();
            Some(tokio::spawn(async move {
                let stop = async move {
                    let _ = rx.wait_for(|v| *v).await;
                };
                if let Err(e) = serve_status(addr, router, stop).await {
                    error!(error = ?e, "status server failed");
                }
            }))
        }
        None => None,
    };

    info!("🚀 content bot started");
    let cycles = bot
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = ?e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
        })
        .await;

    let _ = stop_tx.send(true);
    if let Some(t) = status_task {
        let _ = t.await;
    }
    info!(cycles, "content bot stopped");
    Ok(())
}
