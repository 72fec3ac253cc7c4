//! One batch run end to end
//!
//! Lock → load state → poll sources → emit chronologically → digest →
//! trim → persist. Per-source and per-item failures are isolated; lock,
//! configuration and persistence failures propagate and fail the run.

use super::emitter::emit_candidates;
use super::poller::poll_all_sources;
use super::sent_store::{SentStore, EVICT_BATCH, MAX_TRACKED};
use super::types::RunReport;
use crate::config::RelayConfig;
use crate::digest::{build_digest, Cursor};
use crate::runlock::RunLock;
use crate::transport::Transport;

/// Execute one relay run.
///
/// `now` is the unix timestamp the lookback cutoff is computed from and
/// `local_hour` feeds the digest gate; both are injected so tests can pin
/// the clock. The run succeeds even when individual items fail.
pub async fn run_relay(
    config: &RelayConfig,
    transport: &dyn Transport,
    now: i64,
    local_hour: u32,
) -> Result<RunReport, Box<dyn std::error::Error>> {
    let _lock = RunLock::acquire(&config.lock_path())?;

    let mut store = SentStore::load(&config.sent_path())?;
    let cutoff = now - config.lookback_days * 86400;

    log::info!("🔍 Polling {} sources (cutoff {})", config.sources.len(), cutoff);
    let candidates = poll_all_sources(
        transport,
        config.sources,
        &store,
        config.keywords,
        cutoff,
        config.fetch_limit,
    )
    .await;

    let mut report = RunReport::default();

    if candidates.is_empty() {
        log::info!("✅ No new posts this run");
    } else {
        log::info!("📢 Emitting {} candidates", candidates.len());
        report.outcomes = emit_candidates(
            transport,
            &config.target_channel,
            candidates,
            &mut store,
            config.pacing_ms,
        )
        .await;
    }

    let digest_result = deliver_digest(config, transport, now, local_hour, &mut report).await;

    // Persist the store before surfacing a digest state error, so confirmed
    // sends are never replayed next run
    store.trim(MAX_TRACKED, EVICT_BATCH);
    store.persist(&config.sent_path())?;
    digest_result?;

    log::info!(
        "✅ Run complete: {} relayed, {} failed, digest {}",
        report.sent_count(),
        report.failed_count(),
        if report.digest_sent { "sent" } else { "none" }
    );

    Ok(report)
}

/// Build and deliver the digest; the cursor advances only on confirmed
/// delivery. Scrape and send failures are isolated to the digest, state
/// file failures propagate like any other persistence error.
async fn deliver_digest(
    config: &RelayConfig,
    transport: &dyn Transport,
    now: i64,
    local_hour: u32,
    report: &mut RunReport,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut cursor = Cursor::load(&config.cursor_path(), now)?;

    let digest = match build_digest(
        &config.digest_site_url,
        &config.scrape_window,
        &cursor,
        local_hour,
    )
    .await
    {
        Ok(Some(digest)) => digest,
        Ok(None) => return Ok(()),
        Err(e) => {
            log::error!("❌ Digest scrape failed: {}", e);
            return Ok(());
        }
    };

    match transport
        .send_message(&config.target_channel, &digest.message, true)
        .await
    {
        Ok(()) => {
            report.digest_sent = true;
            if cursor.advance_to(digest.watermark) {
                cursor.persist(&config.cursor_path())?;
            }
        }
        Err(e) => {
            log::error!("❌ Failed to send digest: {}", e);
        }
    }

    Ok(())
}
