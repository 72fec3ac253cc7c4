//! Fetch and structural parse of the sports news page
//!
//! The page is windows-1251 encoded DLE markup. The main column interleaves
//! `h2` date-section headers with `article` blocks; only the newest section
//! (everything before the second `h2`) is parsed. Each article carries a
//! title span, a canonical link and a `<time datetime=...>` attribute.

use encoding_rs::WINDOWS_1251;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

/// One parsed article of the newest date section. Built fresh each run.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestEntry {
    /// Text of the date-section header the article appeared under
    pub section_label: String,

    /// Unix timestamp from the article's `datetime` attribute
    pub published_at: i64,

    pub title: String,
    pub url: String,
}

#[derive(Debug)]
pub enum DigestError {
    Http(reqwest::Error),
    Status(u16),
    Parse(String),
}

impl From<reqwest::Error> for DigestError {
    fn from(err: reqwest::Error) -> Self {
        DigestError::Http(err)
    }
}

impl std::fmt::Display for DigestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DigestError::Http(e) => write!(f, "HTTP error: {}", e),
            DigestError::Status(code) => write!(f, "Unexpected page status: {}", code),
            DigestError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for DigestError {}

/// GET the main page and decode it from windows-1251
pub async fn fetch_page(site_url: &str) -> Result<String, DigestError> {
    let url = format!("{}/main", site_url.trim_end_matches('/'));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;

    let response = client.get(&url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(DigestError::Status(status.as_u16()));
    }

    let bytes = response.bytes().await?;
    let (html, _, _) = WINDOWS_1251.decode(&bytes);
    Ok(html.into_owned())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn parse_article(
    article: ElementRef<'_>,
    section_label: &str,
    site_url: &str,
) -> Option<DigestEntry> {
    // Selectors over literal strings; parse cannot fail
    let title_sel = Selector::parse(r#"span[itemprop="name headline"]"#).ok()?;
    let url_sel = Selector::parse(r#"a[itemprop="url"]"#).ok()?;
    let time_sel = Selector::parse("time").ok()?;

    let title = article.select(&title_sel).next().map(element_text)?;
    let href = article
        .select(&url_sel)
        .next()
        .and_then(|a| a.value().attr("href"))?;
    let datetime = article
        .select(&time_sel)
        .next()
        .and_then(|t| t.value().attr("datetime"))?;

    if title.is_empty() {
        return None;
    }

    let published_at = chrono::DateTime::parse_from_rfc3339(datetime)
        .map(|dt| dt.timestamp())
        .ok()?;

    let url = if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}{}", site_url.trim_end_matches('/'), href)
    };

    Some(DigestEntry {
        section_label: section_label.to_string(),
        published_at,
        title,
        url,
    })
}

/// Extract the articles of the newest date section, in document order.
///
/// Walks `#dle-content > h2, #dle-content > article`: the first `h2` opens
/// the section and provides the label, the second `h2` stops the walk.
/// Articles missing a title, link or parsable timestamp are skipped.
pub fn parse_entries(html: &str, site_url: &str) -> Result<Vec<DigestEntry>, DigestError> {
    let document = Html::parse_document(html);
    let walk_sel = Selector::parse("#dle-content > h2, #dle-content > article")
        .map_err(|e| DigestError::Parse(e.to_string()))?;

    let mut entries = Vec::new();
    let mut section_label: Option<String> = None;

    for element in document.select(&walk_sel) {
        match element.value().name() {
            "h2" => {
                if section_label.is_some() {
                    // Second date header: older sections are not parsed
                    break;
                }
                section_label = Some(element_text(element));
            }
            "article" => {
                let Some(ref label) = section_label else {
                    continue;
                };
                if let Some(entry) = parse_article(element, label, site_url) {
                    entries.push(entry);
                } else {
                    log::debug!("Skipping article without title/link/datetime");
                }
            }
            _ => {}
        }
    }

    Ok(entries)
}
