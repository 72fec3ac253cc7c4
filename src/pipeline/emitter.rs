//! Chronological emission of candidates to the destination channel
//!
//! Candidates from all sources are merged into one timestamp-ordered
//! sequence and sent strictly sequentially with a pacing delay between
//! sends. A failed send is logged and skipped; the dedup store is only
//! updated on confirmed success, so the item stays eligible next run.

use super::sent_store::SentStore;
use super::types::{CandidateItem, EmissionOutcome, EmissionStatus};
use crate::transport::Transport;
use chrono::{DateTime, FixedOffset};
use std::time::Duration;
use tokio::time::sleep;

/// Fixed display offset applied to post timestamps (destination audience
/// timezone, determined empirically)
const DISPLAY_OFFSET_HOURS: i32 = 2;

/// Truncation length for log lines carrying post text
const LOG_TEXT_LEN: usize = 50;

fn truncate_text(text: &str) -> String {
    if text.chars().count() <= LOG_TEXT_LEN {
        return text.to_string();
    }
    let cut: String = text.chars().take(LOG_TEXT_LEN).collect();
    format!("{}...", cut)
}

/// `HH:MM dd.mm.yy` in the destination display timezone
pub fn format_timestamp(timestamp: i64) -> String {
    let offset = FixedOffset::east_opt(DISPLAY_OFFSET_HOURS * 3600)
        .expect("fixed offset is in range");
    match DateTime::from_timestamp(timestamp, 0) {
        Some(utc) => utc.with_timezone(&offset).format("%H:%M %d.%m.%y").to_string(),
        None => String::new(),
    }
}

/// Destination payload for a plain (non-album) candidate
pub fn format_relay_message(item: &CandidateItem) -> String {
    format!(
        "📅 **{} | {}**\n\n{}",
        format_timestamp(item.timestamp),
        item.source.label,
        item.text
    )
}

/// Send all candidates in chronological order, recording per-item outcomes.
///
/// The sort is stable, so candidates with equal timestamps keep their
/// discovery order. Returns one outcome per candidate; the caller folds
/// them into the run report.
pub async fn emit_candidates(
    transport: &dyn Transport,
    target: &str,
    mut candidates: Vec<CandidateItem>,
    store: &mut SentStore,
    pacing_ms: u64,
) -> Vec<EmissionOutcome> {
    candidates.sort_by_key(|c| c.timestamp);

    let mut outcomes = Vec::with_capacity(candidates.len());

    for item in &candidates {
        log::info!("📢 Relaying {}: {}", item.source.channel, truncate_text(&item.text));

        let result = match &item.group_members {
            Some(members) => {
                transport
                    .forward_messages(target, item.source.channel, members)
                    .await
                    .map(|_| EmissionStatus::Forwarded(members.len()))
            }
            None => {
                let payload = format_relay_message(item);
                transport
                    .send_message(target, &payload, false)
                    .await
                    .map(|_| EmissionStatus::Sent)
            }
        };

        let status = match result {
            Ok(status) => {
                // Record every album part, so a textful sibling cannot
                // re-trigger the same forward on a later run
                match &item.group_members {
                    Some(members) => {
                        for id in members {
                            store.record(*id);
                        }
                    }
                    None => store.record(item.external_id),
                }
                log::info!("✅ Relayed {} from {}", item.external_id, item.source.channel);
                sleep(Duration::from_millis(pacing_ms)).await;
                status
            }
            Err(e) => {
                log::error!(
                    "❌ Failed to relay '{}': {}",
                    truncate_text(&item.text),
                    e
                );
                EmissionStatus::Failed(e.to_string())
            }
        };

        outcomes.push(EmissionOutcome {
            external_id: item.external_id,
            channel: item.source.channel,
            status,
        });
    }

    outcomes
}
