use crate::utils::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A bearer token with its expiry as reported by the vendor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_usable(&self, margin: Duration) -> bool {
        Utc::now() + margin < self.expires_at
    }
}

/// Performs the vendor login that yields a fresh token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<AccessToken>;
}

/// Caches one access token per capability instance.
///
/// The lock is held across the refresh, so concurrent callers that find
/// the token stale wait for a single login instead of each starting one.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    current: Mutex<Option<AccessToken>>,
    refresh_margin: Duration,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            current: Mutex::new(None),
            refresh_margin: Duration::seconds(60),
        }
    }

    /// Refresh this long before the vendor-reported expiry
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub async fn token(&self) -> Result<String> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref() {
            if token.is_usable(self.refresh_margin) {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Access token missing or stale, refreshing");
        let fresh = self.source.fetch().await?;
        let value = fresh.value.clone();
        *current = Some(fresh);
        Ok(value)
    }

    /// Drop the cached token, e.g. after the vendor answered 401
    pub async fn invalidate(&self) {
        self.current.lock().await.take();
    }
}
