//! Source polling - fetch recent posts and filter them down to candidates
//!
//! For each source: fetch up to the configured limit, then drop posts that
//! are text-less, older than the lookback cutoff, already relayed, or that
//! match none of the keywords. Album-aware sources additionally get a
//! one-pass `group_id -> member ids` index so a multi-part post is carried
//! by exactly one representative candidate.

use super::sent_store::SentStore;
use super::types::CandidateItem;
use crate::config::SourceChannel;
use crate::transport::{RawPost, Transport, TransportError};
use std::collections::{HashMap, HashSet};

/// True when `text` contains at least one of the configured substrings
pub fn matches_keywords(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

/// One pass over the raw fetch result: album id -> ordered member ids
fn build_album_index(posts: &[RawPost]) -> HashMap<i64, Vec<i64>> {
    let mut index: HashMap<i64, Vec<i64>> = HashMap::new();
    for post in posts {
        if let Some(group_id) = post.grouped_id {
            index.entry(group_id).or_default().push(post.id);
        }
    }
    index
}

/// Poll one source and return its surviving candidates, oldest filters first.
///
/// Within a group, only the first-seen post becomes a candidate; later
/// siblings are suppressed so an album is forwarded at most once.
pub async fn poll_source(
    transport: &dyn Transport,
    source: &SourceChannel,
    store: &SentStore,
    keywords: &[&str],
    cutoff: i64,
    limit: usize,
) -> Result<Vec<CandidateItem>, TransportError> {
    let posts = transport.fetch_recent(source.channel, limit).await?;

    let album_index = if source.albums {
        build_album_index(&posts)
    } else {
        HashMap::new()
    };

    let mut candidates = Vec::new();
    let mut seen_groups: HashSet<i64> = HashSet::new();

    for post in posts {
        let text = match post.text {
            Some(ref text) if !text.is_empty() => text.clone(),
            _ => continue,
        };

        if post.date < cutoff {
            continue;
        }
        if store.contains(post.id) {
            continue;
        }
        if !matches_keywords(&text, keywords) {
            continue;
        }

        let group_id = if source.albums { post.grouped_id } else { None };

        // Sibling suppression: one representative per album
        if let Some(gid) = group_id {
            if !seen_groups.insert(gid) {
                log::debug!(
                    "Suppressing album sibling {} (group {}) in {}",
                    post.id,
                    gid,
                    source.channel
                );
                continue;
            }
        }

        let group_members = group_id.and_then(|gid| album_index.get(&gid).cloned());

        candidates.push(CandidateItem {
            source: *source,
            external_id: post.id,
            timestamp: post.date,
            text,
            group_id,
            group_members,
        });
    }

    Ok(candidates)
}

/// Poll every source sequentially; a failing source is logged and skipped.
pub async fn poll_all_sources(
    transport: &dyn Transport,
    sources: &[SourceChannel],
    store: &SentStore,
    keywords: &[&str],
    cutoff: i64,
    limit: usize,
) -> Vec<CandidateItem> {
    let mut all = Vec::new();

    for source in sources {
        match poll_source(transport, source, store, keywords, cutoff, limit).await {
            Ok(candidates) => {
                if !candidates.is_empty() {
                    log::info!("🔍 {}: {} new candidates", source.channel, candidates.len());
                }
                all.extend(candidates);
            }
            Err(e) => {
                log::error!("❌ Failed to fetch {}: {}", source.channel, e);
            }
        }
    }

    all
}
