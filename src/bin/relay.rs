//! Scheduled batch entry point
//!
//! Usage:
//!   cargo run --release --bin relay
//!
//! Environment variables: see `RelayConfig::from_env`. Exit code is 0 on
//! normal completion (including an empty batch); a configuration, lock or
//! persistence failure propagates and exits non-zero.

use chrono::{Local, Timelike, Utc};
use log::info;
use newsrelay::config::RelayConfig;
use newsrelay::pipeline::run_relay;
use newsrelay::transport::GatewayTransport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RelayConfig::from_env()?;

    info!("🚀 Starting relay run");
    info!("   ├─ Gateway: {}", config.gateway_url);
    info!("   ├─ Target: {}", config.target_channel);
    info!("   ├─ State dir: {}", config.state_dir.display());
    info!("   └─ Lookback: {} days", config.lookback_days);

    let transport = GatewayTransport::new(&config.gateway_url, config.gateway_token.clone())?;

    let now = Utc::now().timestamp();
    let local_hour = Local::now().hour();

    let report = run_relay(&config, &transport, now, local_hour).await?;

    info!(
        "✅ Done: {} relayed, {} failed, digest {}",
        report.sent_count(),
        report.failed_count(),
        if report.digest_sent { "sent" } else { "none" }
    );

    Ok(())
}
