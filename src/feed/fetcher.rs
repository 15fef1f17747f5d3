//! Single-page fetch with identity rotation, pacing and bounded retries.

use super::identity;
use super::pacing::Pacer;
use super::proxy::ProxyPool;
use super::types::{Document, EgressPoint, FetchError};
use super::PageSource;
use crate::config::FetchConfig;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

pub struct Fetcher {
    client: Client,
    proxies: Option<Arc<ProxyPool>>,
    pacer: Arc<Pacer>,
    max_retries: u32,
    timeout: Duration,
    backoff: Duration,
}

impl Fetcher {
    pub fn new(
        config: &FetchConfig,
        pacer: Arc<Pacer>,
        proxies: Option<Arc<ProxyPool>>,
    ) -> anyhow::Result<Self> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            proxies,
            pacer,
            max_retries: config.max_retries,
            timeout,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Fetch and parse `url`. Makes at most `max_retries + 1` attempts and
    /// returns either a parsed document or `FetchError::RetriesExhausted`.
    pub async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let attempts = self.max_retries + 1;
        let mut last_err = None;

        for attempt in 0..attempts {
            if attempt > 0 && !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff * attempt).await;
            }

            match self.attempt(url).await {
                Ok(doc) => {
                    tracing::info!(url, attempt, "scraped page");
                    return Ok(doc);
                }
                Err(e) => {
                    tracing::warn!(url, attempt, error = %e, "fetch attempt failed");
                    last_err = Some(e);
                }
            }
        }

        tracing::error!(url, attempts, "failed to scrape page");
        let last = last_err.unwrap_or_else(|| FetchError::Transport {
            url: url.to_string(),
            message: "no attempt made".to_string(),
        });
        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts,
            last: Box::new(last),
        })
    }

    async fn attempt(&self, url: &str) -> Result<Document, FetchError> {
        let egress = match &self.proxies {
            Some(pool) => pool.next().await,
            None => None,
        };
        let identity = identity::random_identity();

        let client = match &egress {
            Some(point) => self.proxied_client(url, point)?,
            None => {
                self.pacer.pace(&origin_host(url)).await;
                self.client.clone()
            }
        };

        let resp = client
            .get(url)
            .header(USER_AGENT, identity)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: format!("body read failed: {}", e),
        })?;
        Document::parse(url, &body)
    }

    fn proxied_client(&self, url: &str, point: &EgressPoint) -> Result<Client, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: format!("proxy {} unusable: {}", point, e),
        };
        let proxy = point.to_proxy().map_err(transport)?;
        Client::builder()
            .proxy(proxy)
            .timeout(self.timeout)
            .build()
            .map_err(transport)
    }
}

#[async_trait]
impl PageSource for Fetcher {
    async fn fetch_page(&self, url: &str) -> Result<Document, FetchError> {
        self.fetch(url).await
    }
}

/// Host part of a URL, used as the pacing key.
fn origin_host(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}
