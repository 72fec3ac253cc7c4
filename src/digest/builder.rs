//! Digest assembly: gate check, cursor filter, HTML message formatting

use super::cursor::{Cursor, ScrapeWindow};
use super::page::{fetch_page, parse_entries, DigestEntry, DigestError};
use chrono::{DateTime, FixedOffset};

/// Timezone the site publishes in; used for the per-entry time line
const SITE_OFFSET_HOURS: i32 = 3;

/// A digest ready for delivery plus the watermark it was built from.
///
/// The cursor is committed only after the message is confirmed sent, so a
/// failed delivery re-surfaces the same entries next run.
#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub message: String,
    pub watermark: i64,
}

/// Keep entries newer than the cursor, ascending; returns the max timestamp
pub fn select_entries(entries: Vec<DigestEntry>, cursor: i64) -> (Vec<DigestEntry>, i64) {
    let mut selected: Vec<DigestEntry> = entries
        .into_iter()
        .filter(|e| e.published_at > cursor)
        .collect();

    selected.sort_by_key(|e| e.published_at);

    let watermark = selected.last().map(|e| e.published_at).unwrap_or(cursor);
    (selected, watermark)
}

fn format_entry_time(published_at: i64) -> String {
    let offset = FixedOffset::east_opt(SITE_OFFSET_HOURS * 3600)
        .expect("fixed offset is in range");
    match DateTime::from_timestamp(published_at, 0) {
        Some(utc) => utc.with_timezone(&offset).format("%H:%M").to_string(),
        None => String::new(),
    }
}

/// One HTML message: fixed header, then a bold time line and linked title
/// per entry, ascending
pub fn format_digest(entries: &[DigestEntry]) -> String {
    let mut message = String::from("<b>rusfootball | Главные новости</b>\n\n");

    for entry in entries {
        message.push_str(&format!(
            "<b>{} {}</b>\n<a href=\"{}\">{}</a>\n",
            entry.section_label,
            format_entry_time(entry.published_at),
            entry.url,
            entry.title
        ));
    }

    message
}

/// Build this run's digest, or `None` when there is nothing to send.
///
/// Outside the scrape window no network call is made and the cursor stays
/// untouched. Inside it, the page is fetched and parsed; entries at or
/// below the cursor are dropped. Fetch/parse failures propagate to the
/// caller, which logs and skips the digest for this run.
pub async fn build_digest(
    site_url: &str,
    window: &ScrapeWindow,
    cursor: &Cursor,
    local_hour: u32,
) -> Result<Option<Digest>, DigestError> {
    if !window.allows(local_hour) {
        log::info!("⏰ Digest scrape skipped (hour {} outside window)", local_hour);
        return Ok(None);
    }

    let html = fetch_page(site_url).await?;
    let entries = parse_entries(&html, site_url)?;
    let total = entries.len();

    let (selected, watermark) = select_entries(entries, cursor.value());

    if selected.is_empty() {
        log::info!("✅ No digest entries newer than cursor ({} parsed)", total);
        return Ok(None);
    }

    log::info!("📰 Digest: {} new of {} parsed entries", selected.len(), total);

    Ok(Some(Digest {
        message: format_digest(&selected),
        watermark,
    }))
}
