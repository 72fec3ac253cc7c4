//! Core data structures for one relay run

use crate::config::SourceChannel;

/// A post that survived the recency/dedup/keyword filters.
///
/// Created and discarded within a single run; nothing here is persisted.
#[derive(Debug, Clone)]
pub struct CandidateItem {
    /// Descriptor of the channel the post came from
    pub source: SourceChannel,

    /// Message id, unique within the source channel
    pub external_id: i64,

    /// Unix timestamp (seconds) of the original post
    pub timestamp: i64,

    /// Post text
    pub text: String,

    /// Album id, when the post is part of a multi-part group
    pub group_id: Option<i64>,

    /// Ordered ids of all album parts; forwarded as one atomic unit
    pub group_members: Option<Vec<i64>>,
}

/// What happened to one candidate during emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmissionStatus {
    /// Sent as a formatted text message
    Sent,
    /// Forwarded as an album of this many parts
    Forwarded(usize),
    /// Send or forward failed; the item stays eligible for the next run
    Failed(String),
}

/// Per-item emission result, collected instead of thrown.
#[derive(Debug, Clone)]
pub struct EmissionOutcome {
    pub external_id: i64,
    pub channel: &'static str,
    pub status: EmissionStatus,
}

/// Summary of one batch run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<EmissionOutcome>,
    pub digest_sent: bool,
}

impl RunReport {
    pub fn sent_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o.status, EmissionStatus::Failed(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.sent_count()
    }
}
