//! HTTP client for the local MTProto gateway
//!
//! Endpoints:
//! - `GET  /messages?peer=<channel>&limit=<n>` → `{ "messages": [RawPost] }`
//! - `POST /sendMessage`    `{ "peer", "message", "parse_mode"? }`
//! - `POST /forwardMessages` `{ "peer", "from_peer", "ids" }`
//! - `POST /deleteMessages`  `{ "peer", "ids", "revoke": true }`

use super::{RawPost, Transport, TransportError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    messages: Vec<RawPost>,
}

pub struct GatewayTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GatewayTransport {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(ref token) = self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Gateway {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Transport for GatewayTransport {
    async fn fetch_recent(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<RawPost>, TransportError> {
        let response = self
            .request(reqwest::Method::GET, "/messages")
            .query(&[("peer", channel), ("limit", &limit.to_string())])
            .send()
            .await?;

        let parsed: MessagesResponse = Self::check(response).await?.json().await?;
        Ok(parsed.messages)
    }

    async fn send_message(
        &self,
        channel: &str,
        text: &str,
        html: bool,
    ) -> Result<(), TransportError> {
        let mut body = json!({ "peer": channel, "message": text });
        if html {
            body["parse_mode"] = json!("html");
        }

        let response = self
            .request(reqwest::Method::POST, "/sendMessage")
            .json(&body)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn forward_messages(
        &self,
        channel: &str,
        from_channel: &str,
        ids: &[i64],
    ) -> Result<(), TransportError> {
        let body = json!({ "peer": channel, "from_peer": from_channel, "ids": ids });

        let response = self
            .request(reqwest::Method::POST, "/forwardMessages")
            .json(&body)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn delete_messages(&self, channel: &str, ids: &[i64]) -> Result<(), TransportError> {
        let body = json!({ "peer": channel, "ids": ids, "revoke": true });

        let response = self
            .request(reqwest::Method::POST, "/deleteMessages")
            .json(&body)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}
