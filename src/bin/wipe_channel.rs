//! Maintenance tool - deletes every recent message in the target channel
//!
//! Usage:
//!   cargo run --release --bin wipe_channel
//!
//! Fetches up to 1000 recent messages and deletes them one by one with the
//! same pacing the relay uses. Per-message failures are logged and skipped.

use log::{error, info};
use newsrelay::config::RelayConfig;
use newsrelay::transport::{GatewayTransport, Transport};
use std::time::Duration;
use tokio::time::sleep;

const WIPE_FETCH_LIMIT: usize = 1000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RelayConfig::from_env()?;
    let transport = GatewayTransport::new(&config.gateway_url, config.gateway_token.clone())?;

    let messages = transport
        .fetch_recent(&config.target_channel, WIPE_FETCH_LIMIT)
        .await?;

    info!("🔍 Found {} messages in {}. Deleting...", messages.len(), config.target_channel);

    let mut deleted = 0usize;
    for message in &messages {
        match transport
            .delete_messages(&config.target_channel, &[message.id])
            .await
        {
            Ok(()) => {
                deleted += 1;
                info!("🗑 Deleted message {}", message.id);
            }
            Err(e) => {
                error!("❌ Failed to delete {}: {}", message.id, e);
            }
        }
        sleep(Duration::from_millis(config.pacing_ms)).await;
    }

    info!("✅ Done: {} of {} deleted", deleted, messages.len());
    Ok(())
}
