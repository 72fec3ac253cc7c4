//! Persisted digest watermark and the hour-of-day scrape gate

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Hours of the local day during which the digest scrape is allowed to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeWindow {
    /// Scrape every run
    Always,
    /// Scrape when the local hour is >= the threshold
    AfterHour(u32),
    /// Scrape only during the listed hours
    Hours(Vec<u32>),
}

impl ScrapeWindow {
    pub fn allows(&self, hour: u32) -> bool {
        match self {
            ScrapeWindow::Always => true,
            ScrapeWindow::AfterHour(threshold) => hour >= *threshold,
            ScrapeWindow::Hours(hours) => hours.contains(&hour),
        }
    }

    /// Parse the `SCRAPE_HOURS` spec: `always`, `>=N`, or `N,M,...`
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();

        if spec.eq_ignore_ascii_case("always") {
            return Some(ScrapeWindow::Always);
        }

        if let Some(rest) = spec.strip_prefix(">=") {
            let hour: u32 = rest.trim().parse().ok()?;
            if hour > 23 {
                return None;
            }
            return Some(ScrapeWindow::AfterHour(hour));
        }

        let hours: Option<Vec<u32>> = spec
            .split(',')
            .map(|h| h.trim().parse::<u32>().ok().filter(|h| *h <= 23))
            .collect();
        let hours = hours?;
        if hours.is_empty() {
            return None;
        }
        Some(ScrapeWindow::Hours(hours))
    }
}

/// Persisted watermark: newest digest entry already processed.
///
/// Monotonically non-decreasing across runs. When the file is absent, the
/// cursor starts one day in the past so a fresh deployment picks up only
/// reasonably recent entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "lastSeenTimestamp")]
    last_seen_timestamp: i64,
}

impl Cursor {
    pub fn new(last_seen_timestamp: i64) -> Self {
        Self { last_seen_timestamp }
    }

    /// Load from disk; a missing file yields `now - 24h`
    pub fn load(path: &Path, now: i64) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            let cursor = Self::new(now - 86400);
            log::info!(
                "No digest cursor at {}, starting from {}",
                path.display(),
                cursor.last_seen_timestamp
            );
            return Ok(cursor);
        }

        let json = fs::read_to_string(path)?;
        let cursor: Cursor = serde_json::from_str(&json)?;
        Ok(cursor)
    }

    pub fn value(&self) -> i64 {
        self.last_seen_timestamp
    }

    /// Advance to `timestamp` if it is strictly larger; returns whether moved
    pub fn advance_to(&mut self, timestamp: i64) -> bool {
        if timestamp > self.last_seen_timestamp {
            self.last_seen_timestamp = timestamp;
            return true;
        }
        false
    }

    /// Atomic write (temp file + rename), mirroring the sent store
    pub fn persist(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string(self)?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &json)?;
        fs::rename(&tmp_path, path)?;

        log::debug!("Persisted digest cursor {} to {}", self.last_seen_timestamp, path.display());
        Ok(())
    }
}
