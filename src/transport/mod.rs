//! Transport seam for the channel platform
//!
//! The relay never talks to the platform directly; everything goes through
//! the [`Transport`] trait so the pipeline can be driven by a mock in tests.
//! The shipped implementation is [`GatewayTransport`], a thin HTTP client
//! against a locally running MTProto gateway that owns the authenticated
//! session (interactive login bootstrap included).

pub mod gateway;

pub use gateway::GatewayTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One raw message as returned by the transport, before any filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    /// Message id, unique within its channel
    pub id: i64,

    /// Unix timestamp (seconds) the message was posted
    pub date: i64,

    /// Message text; media-only posts have none
    pub text: Option<String>,

    /// Album id shared by the parts of a multi-part post
    #[serde(default)]
    pub grouped_id: Option<i64>,
}

#[derive(Debug)]
pub enum TransportError {
    Http(reqwest::Error),
    Gateway { status: u16, body: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err)
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Http(e) => write!(f, "HTTP error: {}", e),
            TransportError::Gateway { status, body } => {
                write!(f, "Gateway error {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// Operations the relay needs from the channel platform
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch up to `limit` most recent messages of a channel, newest first
    async fn fetch_recent(&self, channel: &str, limit: usize)
        -> Result<Vec<RawPost>, TransportError>;

    /// Send a text message to a channel; `html` enables HTML parse mode
    async fn send_message(&self, channel: &str, text: &str, html: bool)
        -> Result<(), TransportError>;

    /// Forward a batch of messages as one atomic operation
    async fn forward_messages(
        &self,
        channel: &str,
        from_channel: &str,
        ids: &[i64],
    ) -> Result<(), TransportError>;

    /// Delete messages from a channel (maintenance tooling)
    async fn delete_messages(&self, channel: &str, ids: &[i64])
        -> Result<(), TransportError>;
}
