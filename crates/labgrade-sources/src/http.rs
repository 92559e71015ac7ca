//! Event log served by a remote HTTP endpoint.
//!
//! The endpoint answers a `GET` with the log in any of the formats handled
//! by [`crate::decode`]. The shared secret travels as the `secret` query
//! parameter.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use tracing::instrument;

use labgrade_core::error::SourceError;
use labgrade_core::model::EventLog;
use labgrade_core::traits::EventSource;

use crate::decode::decode_event_log;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Pulls the log from a URL.
pub struct HttpSource {
    url: Url,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut url = self.url.clone();
        url.set_query(None);
        f.debug_struct("HttpSource")
            .field("url", &url.as_str())
            .field("secret", &"***")
            .finish()
    }
}

impl HttpSource {
    pub fn new(url: &str, secret: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let mut url = Url::parse(url).with_context(|| format!("invalid source URL: {url}"))?;
        if !secret.is_empty() {
            url.query_pairs_mut().append_pair("secret", secret);
        }

        let timeout = if timeout_secs > 0 {
            timeout_secs
        } else {
            DEFAULT_TIMEOUT_SECS
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { url, client })
    }
}

#[async_trait]
impl EventSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(host = self.url.host_str().unwrap_or_default()))]
    async fn fetch(&self) -> anyhow::Result<EventLog> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Network("request timed out".into())
                } else if e.is_connect() {
                    SourceError::Network(format!(
                        "event source not reachable at {}",
                        self.url.host_str().unwrap_or_default()
                    ))
                } else {
                    SourceError::Network(e.without_url().to_string())
                }
            })?;

        let status = response.status().as_u16();
        match status {
            401 | 403 => {
                return Err(SourceError::AuthenticationFailed(format!(
                    "HTTP {status}, check the shared secret"
                ))
                .into())
            }
            404 => return Err(SourceError::NotFound(self.url.path().to_string()).into()),
            s if s >= 400 => {
                let message = response.text().await.unwrap_or_default();
                return Err(SourceError::Http { status, message }.into());
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Malformed(format!("failed to read body: {e}")))?;
        let log = decode_event_log(&body)?;
        tracing::debug!(events = log.events.len(), "event log pulled");
        Ok(log)
    }
}
