//! Integration tests for the relay pipeline against an in-memory transport
//!
//! Covers the dedup/ordering/filter behavior of a full run, bounded
//! eviction, album forwarding with sibling suppression, per-item failure
//! isolation, idempotent re-runs and the digest gate.

use async_trait::async_trait;
use newsrelay::config::{RelayConfig, SourceChannel};
use newsrelay::digest::ScrapeWindow;
use newsrelay::pipeline::{run_relay, EmissionStatus, SentStore};
use newsrelay::transport::{RawPost, Transport, TransportError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

const TEST_SOURCES: &[SourceChannel] = &[
    SourceChannel { channel: "@alpha", label: "Alpha", albums: false },
    SourceChannel { channel: "@beta", label: "Beta", albums: false },
    SourceChannel { channel: "@maps", label: "Maps", albums: true },
];

const TEST_KEYWORDS: &[&str] = &["Итоги дня", "Карта"];

/// Base timestamp all tests offset from (recent enough for any lookback)
const T0: i64 = 1_700_000_000;

#[derive(Debug, Clone, PartialEq)]
enum Delivered {
    Message { text: String, html: bool },
    Forward { from: String, ids: Vec<i64> },
}

/// In-memory transport: preset posts per channel, recorded deliveries,
/// optional per-channel fetch failures and per-substring send failures.
#[derive(Default)]
struct MockTransport {
    posts: HashMap<String, Vec<RawPost>>,
    failing_fetches: Vec<String>,
    failing_send_substring: Option<String>,
    delivered: Mutex<Vec<Delivered>>,
}

impl MockTransport {
    fn new() -> Self {
        Self::default()
    }

    fn with_posts(mut self, channel: &str, posts: Vec<RawPost>) -> Self {
        self.posts.insert(channel.to_string(), posts);
        self
    }

    fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().unwrap().clone()
    }

    fn gateway_error() -> TransportError {
        TransportError::Gateway {
            status: 420,
            body: "FLOOD_WAIT".to_string(),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_recent(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<RawPost>, TransportError> {
        if self.failing_fetches.iter().any(|c| c == channel) {
            return Err(Self::gateway_error());
        }
        let posts = self.posts.get(channel).cloned().unwrap_or_default();
        Ok(posts.into_iter().take(limit).collect())
    }

    async fn send_message(
        &self,
        _channel: &str,
        text: &str,
        html: bool,
    ) -> Result<(), TransportError> {
        if let Some(ref needle) = self.failing_send_substring {
            if text.contains(needle) {
                return Err(Self::gateway_error());
            }
        }
        self.delivered.lock().unwrap().push(Delivered::Message {
            text: text.to_string(),
            html,
        });
        Ok(())
    }

    async fn forward_messages(
        &self,
        _channel: &str,
        from_channel: &str,
        ids: &[i64],
    ) -> Result<(), TransportError> {
        self.delivered.lock().unwrap().push(Delivered::Forward {
            from: from_channel.to_string(),
            ids: ids.to_vec(),
        });
        Ok(())
    }

    async fn delete_messages(&self, _channel: &str, _ids: &[i64]) -> Result<(), TransportError> {
        Ok(())
    }
}

fn post(id: i64, date: i64, text: &str) -> RawPost {
    RawPost {
        id,
        date,
        text: Some(text.to_string()),
        grouped_id: None,
    }
}

fn album_post(id: i64, date: i64, text: Option<&str>, group: i64) -> RawPost {
    RawPost {
        id,
        date,
        text: text.map(|t| t.to_string()),
        grouped_id: Some(group),
    }
}

fn test_config(state_dir: PathBuf) -> RelayConfig {
    RelayConfig {
        gateway_url: "http://localhost:8000".to_string(),
        gateway_token: None,
        target_channel: "@dest".to_string(),
        sources: TEST_SOURCES,
        keywords: TEST_KEYWORDS,
        state_dir,
        fetch_limit: 100,
        lookback_days: 2,
        pacing_ms: 0,
        // Unroutable on purpose; tests that open the gate expect the scrape
        // to fail fast and be isolated
        digest_site_url: "http://0.0.0.0:1".to_string(),
        scrape_window: ScrapeWindow::Hours(vec![]),
    }
}

fn seed_store(path: &std::path::Path, ids: &[i64]) {
    let mut store = SentStore::new();
    for id in ids {
        store.record(*id);
    }
    store.persist(path).unwrap();
}

#[tokio::test]
async fn test_scenario_a_dedup_and_final_store() {
    // Store {1,2,3}; incoming [2,4,5] all matching -> emit [4,5], store {1..5}
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());
    seed_store(&config.sent_path(), &[1, 2, 3]);

    let transport = MockTransport::new().with_posts(
        "@alpha",
        vec![
            post(2, T0 + 10, "Итоги дня: два"),
            post(4, T0 + 20, "Итоги дня: четыре"),
            post(5, T0 + 30, "Итоги дня: пять"),
        ],
    );

    let report = run_relay(&config, &transport, T0 + 100, 12).await.unwrap();

    assert_eq!(report.sent_count(), 2);
    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 2);
    assert!(matches!(&delivered[0], Delivered::Message { text, .. } if text.contains("четыре")));
    assert!(matches!(&delivered[1], Delivered::Message { text, .. } if text.contains("пять")));

    let store = SentStore::load(&config.sent_path()).unwrap();
    assert_eq!(store.len(), 5);
    for id in 1..=5 {
        assert!(store.contains(id));
    }
}

#[tokio::test]
async fn test_scenario_b_trim_after_run() {
    // 151 persisted ids -> post-run size 101, the 50 earliest gone
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());
    let ids: Vec<i64> = (1..=151).collect();
    seed_store(&config.sent_path(), &ids);

    let transport = MockTransport::new();
    run_relay(&config, &transport, T0, 12).await.unwrap();

    let store = SentStore::load(&config.sent_path()).unwrap();
    assert_eq!(store.len(), 101);
    for id in 1..=50 {
        assert!(!store.contains(id));
    }
    for id in 51..=151 {
        assert!(store.contains(id));
    }
}

#[tokio::test]
async fn test_scenario_c_closed_gate_writes_no_cursor() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());

    let transport = MockTransport::new();
    let report = run_relay(&config, &transport, T0, 12).await.unwrap();

    assert!(!report.digest_sent);
    assert!(!config.cursor_path().exists());
    assert!(transport.delivered().is_empty());
}

#[tokio::test]
async fn test_emission_is_chronological_across_sources() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());

    let transport = MockTransport::new()
        .with_posts("@alpha", vec![post(10, T0 + 300, "Итоги дня: поздний")])
        .with_posts("@beta", vec![post(20, T0 + 100, "Итоги дня: ранний")]);

    run_relay(&config, &transport, T0 + 400, 12).await.unwrap();

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 2);
    assert!(matches!(&delivered[0], Delivered::Message { text, .. } if text.contains("ранний")));
    assert!(matches!(&delivered[1], Delivered::Message { text, .. } if text.contains("поздний")));
}

#[tokio::test]
async fn test_keyword_and_lookback_filters() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());

    let old = T0 - 3 * 86400;
    let transport = MockTransport::new().with_posts(
        "@alpha",
        vec![
            post(1, T0 + 10, "просто пост без ключевых слов"),
            post(2, old, "Итоги дня: слишком старый"),
            post(3, T0 + 20, "Итоги дня: проходит"),
        ],
    );

    run_relay(&config, &transport, T0 + 100, 12).await.unwrap();

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 1);
    assert!(matches!(&delivered[0], Delivered::Message { text, .. } if text.contains("проходит")));

    // Only the emitted id is recorded
    let store = SentStore::load(&config.sent_path()).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.contains(3));
}

#[tokio::test]
async fn test_album_forwarded_once_with_all_parts() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());

    // Both textful parts of group 7 pass the filters; only the first-seen
    // representative is forwarded, carrying every part
    let transport = MockTransport::new().with_posts(
        "@maps",
        vec![
            album_post(100, T0 + 10, Some("Карта: лист 1"), 7),
            album_post(101, T0 + 10, None, 7),
            album_post(102, T0 + 10, Some("Карта: лист 2"), 7),
        ],
    );

    run_relay(&config, &transport, T0 + 100, 12).await.unwrap();

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(
        delivered[0],
        Delivered::Forward {
            from: "@maps".to_string(),
            ids: vec![100, 101, 102],
        }
    );

    // All parts are recorded, so the textful sibling cannot re-trigger
    // the album next run
    let store = SentStore::load(&config.sent_path()).unwrap();
    for id in [100, 101, 102] {
        assert!(store.contains(id));
    }
}

#[tokio::test]
async fn test_failed_send_is_isolated_and_stays_eligible() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());

    let transport = MockTransport {
        failing_send_substring: Some("второй".to_string()),
        ..MockTransport::new()
    }
    .with_posts(
        "@alpha",
        vec![
            post(1, T0 + 10, "Итоги дня: первый"),
            post(2, T0 + 20, "Итоги дня: второй"),
            post(3, T0 + 30, "Итоги дня: третий"),
        ],
    );

    let report = run_relay(&config, &transport, T0 + 100, 12).await.unwrap();

    assert_eq!(report.sent_count(), 2);
    assert_eq!(report.failed_count(), 1);
    let failed = report
        .outcomes
        .iter()
        .find(|o| matches!(o.status, EmissionStatus::Failed(_)))
        .unwrap();
    assert_eq!(failed.external_id, 2);

    // The failed id is not recorded, so the next run retries it
    let store = SentStore::load(&config.sent_path()).unwrap();
    assert!(store.contains(1));
    assert!(!store.contains(2));
    assert!(store.contains(3));
}

#[tokio::test]
async fn test_failing_source_does_not_abort_others() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());

    let transport = MockTransport {
        failing_fetches: vec!["@alpha".to_string()],
        ..MockTransport::new()
    }
    .with_posts("@beta", vec![post(9, T0 + 10, "Итоги дня: выжил")]);

    let report = run_relay(&config, &transport, T0 + 100, 12).await.unwrap();

    assert_eq!(report.sent_count(), 1);
    assert_eq!(transport.delivered().len(), 1);
}

#[tokio::test]
async fn test_rerun_with_same_content_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());

    let make_transport = || {
        MockTransport::new().with_posts(
            "@alpha",
            vec![
                post(1, T0 + 10, "Итоги дня: раз"),
                post(2, T0 + 20, "Итоги дня: два"),
            ],
        )
    };

    let first = make_transport();
    let report = run_relay(&config, &first, T0 + 100, 12).await.unwrap();
    assert_eq!(report.sent_count(), 2);

    let second = make_transport();
    let report = run_relay(&config, &second, T0 + 100, 12).await.unwrap();
    assert_eq!(report.outcomes.len(), 0);
    assert!(second.delivered().is_empty());
}

#[tokio::test]
async fn test_digest_scrape_failure_is_isolated() {
    // Gate open, unreachable site: run still succeeds, no cursor written
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path().to_path_buf());
    config.scrape_window = ScrapeWindow::Always;

    let transport = MockTransport::new()
        .with_posts("@alpha", vec![post(1, T0 + 10, "Итоги дня: новость")]);

    let report = run_relay(&config, &transport, T0 + 100, 22).await.unwrap();

    assert_eq!(report.sent_count(), 1);
    assert!(!report.digest_sent);
    assert!(!config.cursor_path().exists());
}

/// Minimal one-page HTTP server for the digest scrape tests.
///
/// ASCII-only bodies on purpose: windows-1251 decoding is the identity on
/// ASCII, so no re-encoding is needed here.
async fn spawn_page_server(body: String) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let body = body.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=windows-1251\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    format!("http://{}", addr)
}

fn page_with_entries(timestamps: &[i64]) -> String {
    let mut body = String::from(r#"<div id="dle-content"><h2>Today</h2>"#);
    for ts in timestamps {
        let datetime = chrono::DateTime::from_timestamp(*ts, 0).unwrap().to_rfc3339();
        body.push_str(&format!(
            r#"<article><span itemprop="name headline">News {ts}</span><a itemprop="url" href="/news/{ts}.html">x</a><time datetime="{datetime}">t</time></article>"#
        ));
    }
    body.push_str("</div>");
    body
}

#[tokio::test]
async fn test_scenario_d_digest_filters_and_advances_cursor() {
    // Cursor T0; entries at T0-10, T0+5, T0+20 -> digest has the newer two
    // ascending and the cursor lands on T0+20
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path().to_path_buf());
    config.scrape_window = ScrapeWindow::Always;
    config.digest_site_url = spawn_page_server(page_with_entries(&[T0 + 20, T0 + 5, T0 - 10])).await;

    newsrelay::digest::Cursor::new(T0).persist(&config.cursor_path()).unwrap();

    let transport = MockTransport::new();
    let report = run_relay(&config, &transport, T0 + 100, 22).await.unwrap();

    assert!(report.digest_sent);
    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 1);
    let Delivered::Message { text, html } = &delivered[0] else {
        panic!("digest should be a message");
    };
    assert!(*html);
    assert!(!text.contains(&format!("News {}", T0 - 10)));
    let pos_mid = text.find(&format!("News {}", T0 + 5)).unwrap();
    let pos_new = text.find(&format!("News {}", T0 + 20)).unwrap();
    assert!(pos_mid < pos_new);

    let cursor = newsrelay::digest::Cursor::load(&config.cursor_path(), 0).unwrap();
    assert_eq!(cursor.value(), T0 + 20);
}

#[tokio::test]
async fn test_cursor_untouched_when_digest_delivery_fails() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path().to_path_buf());
    config.scrape_window = ScrapeWindow::Always;
    config.digest_site_url = spawn_page_server(page_with_entries(&[T0 + 20])).await;

    newsrelay::digest::Cursor::new(T0).persist(&config.cursor_path()).unwrap();

    let transport = MockTransport {
        failing_send_substring: Some("rusfootball".to_string()),
        ..MockTransport::new()
    };

    let report = run_relay(&config, &transport, T0 + 100, 22).await.unwrap();

    assert!(!report.digest_sent);
    let cursor = newsrelay::digest::Cursor::load(&config.cursor_path(), 0).unwrap();
    assert_eq!(cursor.value(), T0);
}

#[tokio::test]
async fn test_digest_sent_even_with_no_candidates() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path().to_path_buf());
    config.scrape_window = ScrapeWindow::Always;
    config.digest_site_url = spawn_page_server(page_with_entries(&[T0 + 20])).await;

    newsrelay::digest::Cursor::new(T0).persist(&config.cursor_path()).unwrap();

    let transport = MockTransport::new();
    let report = run_relay(&config, &transport, T0 + 100, 22).await.unwrap();

    assert_eq!(report.outcomes.len(), 0);
    assert!(report.digest_sent);
    assert_eq!(transport.delivered().len(), 1);
}

#[tokio::test]
async fn test_empty_batch_still_persists_store() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path().to_path_buf());

    let transport = MockTransport::new();
    let report = run_relay(&config, &transport, T0, 12).await.unwrap();

    assert_eq!(report.outcomes.len(), 0);
    assert!(config.sent_path().exists());
    // And the lock is released for the next scheduled run
    assert!(!config.lock_path().exists());
}
