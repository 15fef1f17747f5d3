//! Rotating pool of proxy candidates.

use super::types::EgressPoint;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Decides whether a candidate can currently carry traffic.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_alive(&self, point: &EgressPoint) -> bool;
}

/// Probes a candidate with one short-timeout GET against a known endpoint.
/// A timeout or any transport error counts as dead for this round.
pub struct HttpProbe {
    probe_url: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(probe_url: &str, timeout_ms: u64) -> Self {
        Self {
            probe_url: probe_url.to_string(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn is_alive(&self, point: &EgressPoint) -> bool {
        let proxy = match point.to_proxy() {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(proxy = %point, error = %e, "invalid proxy address");
                return false;
            }
        };
        let client = match Client::builder().proxy(proxy).timeout(self.timeout).build() {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(proxy = %point, error = %e, "failed to build probe client");
                return false;
            }
        };
        match client.get(&self.probe_url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(proxy = %point, error = %e, "proxy probe failed");
                false
            }
        }
    }
}

/// Candidates plus a rotation cursor. The cursor is shared by every fetcher
/// using the pool, so selection is serialized.
pub struct ProxyPool {
    candidates: Vec<EgressPoint>,
    cursor: Mutex<usize>,
    probe: Arc<dyn LivenessProbe>,
}

impl ProxyPool {
    pub fn new(candidates: Vec<EgressPoint>, probe: Arc<dyn LivenessProbe>) -> Self {
        Self {
            candidates,
            cursor: Mutex::new(0),
            probe,
        }
    }

    /// Load candidates from a text file, one per line.
    pub fn from_file(path: &Path, probe: Arc<dyn LivenessProbe>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read proxy list: {}", path.display()))?;
        let candidates: Vec<EgressPoint> = content.lines().filter_map(EgressPoint::parse).collect();
        tracing::info!(count = candidates.len(), path = %path.display(), "loaded proxy candidates");
        Ok(Self::new(candidates, probe))
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Return the first live candidate at or after the cursor, leaving the
    /// cursor on the candidate after it. Each candidate is probed at most once
    /// per call; None after a full rotation with no live candidate.
    pub async fn next(&self) -> Option<EgressPoint> {
        if self.candidates.is_empty() {
            tracing::warn!("proxy pool is empty, continuing without proxy");
            return None;
        }

        let mut cursor = self.cursor.lock().await;
        let n = self.candidates.len();
        for _ in 0..n {
            let idx = *cursor;
            *cursor = (idx + 1) % n;
            let candidate = &self.candidates[idx];
            if self.probe.is_alive(candidate).await {
                tracing::info!(proxy = %candidate, "using proxy");
                return Some(candidate.clone());
            }
        }

        tracing::error!(candidates = n, "no working proxies found, continuing without proxy");
        None
    }
}
