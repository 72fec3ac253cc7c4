//! Run configuration from environment variables plus the built-in source table

use crate::digest::ScrapeWindow;
use std::env;
use std::path::PathBuf;

/// One source channel polled each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceChannel {
    /// Channel identifier understood by the transport (e.g. `@if_market_news`)
    pub channel: &'static str,
    /// Human-readable label prepended to relayed posts
    pub label: &'static str,
    /// Whether posts from this channel can be multi-part albums
    pub albums: bool,
}

/// Channels polled each run, in polling order.
pub const SOURCE_CHANNELS: &[SourceChannel] = &[
    SourceChannel { channel: "@if_market_news", label: "IF News", albums: false },
    SourceChannel { channel: "@newkal", label: "Новый Калининград", albums: false },
    SourceChannel { channel: "@kontext_channel", label: "Контекст", albums: false },
    SourceChannel { channel: "@meduzalive", label: "Медуза", albums: false },
    SourceChannel { channel: "@echoonline_news", label: "Эхо", albums: false },
    SourceChannel { channel: "@rian_ru", label: "РИА Новости", albums: false },
    SourceChannel { channel: "@omyinvestments", label: "Мои Инвестиции", albums: false },
    SourceChannel { channel: "@interfaxonline", label: "Интерфакс", albums: false },
    SourceChannel { channel: "@kommersant", label: "Коммерсантъ", albums: false },
    SourceChannel { channel: "@divgen", label: "DIVGEN Карта СВО", albums: true },
];

/// Substrings a post must contain (any of them, case-sensitive) to be relayed.
pub const KEYWORDS: &[&str] = &[
    "Главные события",
    "Главные новости",
    "Главное к исходу",
    "выпуск новостей",
    "Итоги дня",
    "Что случилось этой ночью",
    "Что произошло за день",
    "Погода в Калининградской области",
    "Изменения на карте за прошедшие сутки",
];

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Immutable configuration for one batch run.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Base URL of the MTProto gateway the transport talks to
    pub gateway_url: String,

    /// Optional bearer token for the gateway
    pub gateway_token: Option<String>,

    /// Destination channel all matching posts are relayed to
    pub target_channel: String,

    /// Channels polled this run
    pub sources: &'static [SourceChannel],

    /// Keyword filter applied to post text
    pub keywords: &'static [&'static str],

    /// Directory holding the persisted state files
    pub state_dir: PathBuf,

    /// Recent messages fetched per source
    pub fetch_limit: usize,

    /// Posts older than this many days are ignored
    pub lookback_days: i64,

    /// Delay between consecutive sends, flood-limit safeguard
    pub pacing_ms: u64,

    /// Root URL of the sports site scraped for the digest
    pub digest_site_url: String,

    /// Local hours during which the digest scrape runs
    pub scrape_window: ScrapeWindow,
}

impl RelayConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `GATEWAY_URL` (required)
    /// - `GATEWAY_TOKEN` (optional)
    /// - `TARGET_CHANNEL` (required)
    /// - `RAILWAY_VOLUME_PATH` (default: current directory)
    /// - `FETCH_LIMIT` (default: 100)
    /// - `LOOKBACK_DAYS` (default: 2)
    /// - `PACING_MS` (default: 500)
    /// - `DIGEST_SITE_URL` (default: https://www.rusfootball.info)
    /// - `SCRAPE_HOURS` (default: ">=21"; also accepts "always" or "21,22,23")
    pub fn from_env() -> Result<Self, ConfigError> {
        let gateway_url = env::var("GATEWAY_URL")
            .map_err(|_| ConfigError::MissingVariable("GATEWAY_URL".to_string()))?;

        if !gateway_url.starts_with("http://") && !gateway_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_URL must start with http:// or https://".to_string(),
            ));
        }

        let gateway_token = env::var("GATEWAY_TOKEN").ok();

        let target_channel = env::var("TARGET_CHANNEL")
            .map_err(|_| ConfigError::MissingVariable("TARGET_CHANNEL".to_string()))?;

        let state_dir = env::var("RAILWAY_VOLUME_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let fetch_limit = env::var("FETCH_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        let lookback_days = env::var("LOOKBACK_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);

        let pacing_ms = env::var("PACING_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(500);

        let digest_site_url = env::var("DIGEST_SITE_URL")
            .unwrap_or_else(|_| "https://www.rusfootball.info".to_string());

        let scrape_window = match env::var("SCRAPE_HOURS") {
            Ok(spec) => ScrapeWindow::parse(&spec)
                .ok_or_else(|| ConfigError::InvalidValue(format!("SCRAPE_HOURS '{}'", spec)))?,
            Err(_) => ScrapeWindow::AfterHour(21),
        };

        Ok(Self {
            gateway_url,
            gateway_token,
            target_channel,
            sources: SOURCE_CHANNELS,
            keywords: KEYWORDS,
            state_dir,
            fetch_limit,
            lookback_days,
            pacing_ms,
            digest_site_url,
            scrape_window,
        })
    }

    /// Path of the persisted dedup store
    pub fn sent_path(&self) -> PathBuf {
        self.state_dir.join("sent.json")
    }

    /// Path of the persisted digest cursor
    pub fn cursor_path(&self) -> PathBuf {
        self.state_dir.join("digest_cursor.json")
    }

    /// Path of the run lock file
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("relay.lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_table_has_one_album_channel() {
        let album_sources: Vec<_> = SOURCE_CHANNELS.iter().filter(|s| s.albums).collect();
        assert_eq!(album_sources.len(), 1);
        assert_eq!(album_sources[0].channel, "@divgen");
    }

    #[test]
    fn test_state_paths_join_volume_root() {
        let config = RelayConfig {
            gateway_url: "http://localhost:8000".to_string(),
            gateway_token: None,
            target_channel: "@dest".to_string(),
            sources: SOURCE_CHANNELS,
            keywords: KEYWORDS,
            state_dir: PathBuf::from("/data"),
            fetch_limit: 100,
            lookback_days: 2,
            pacing_ms: 500,
            digest_site_url: "https://example.org".to_string(),
            scrape_window: ScrapeWindow::Always,
        };

        assert_eq!(config.sent_path(), PathBuf::from("/data/sent.json"));
        assert_eq!(config.cursor_path(), PathBuf::from("/data/digest_cursor.json"));
        assert_eq!(config.lock_path(), PathBuf::from("/data/relay.lock"));
    }
}
