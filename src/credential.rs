use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::types::EphemeralKeyResponse;

/// A credential is not handed out once it has this many seconds or fewer left.
pub const REFRESH_MARGIN_SECS: u64 = 60;

/// A short-lived bearer token for one realtime session.
#[derive(Debug)]
pub struct Credential {
    ephemeral_key: SecretString,
    /// Seconds since the epoch.
    expires_at: u64,
}

impl Credential {
    pub fn new(ephemeral_key: &str, expires_at: u64) -> Self {
        Self {
            ephemeral_key: SecretString::from(ephemeral_key.to_string()),
            expires_at,
        }
    }

    pub fn ephemeral_key(&self) -> &SecretString {
        &self.ephemeral_key
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// True while more than [`REFRESH_MARGIN_SECS`] remain before expiry.
    pub fn is_usable_at(&self, now: u64) -> bool {
        self.expires_at > now.saturating_add(REFRESH_MARGIN_SECS)
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self::new(self.ephemeral_key.expose_secret(), self.expires_at)
    }
}

/// Source of wall-clock time in seconds since the epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// Fetches one fresh credential from wherever credentials are issued.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<Credential>;
}

/// Requests credentials from the backend's `POST /api/ephemeral-key` endpoint.
pub struct HttpTokenSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTokenSource {
    pub fn new(endpoint: &str) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn fetch(&self) -> Result<Credential> {
        let response = self
            .client
            .post(&self.endpoint)
            .send()
            .await
            .map_err(|e| Error::CredentialFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::CredentialFetch(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::CredentialFetch(e.to_string()))?;
        parse_credential(&body)
    }
}

fn parse_credential(body: &str) -> Result<Credential> {
    let parsed: EphemeralKeyResponse =
        serde_json::from_str(body).map_err(|e| Error::CredentialFormat(e.to_string()))?;

    if !parsed.success {
        return Err(Error::CredentialFetch(
            parsed
                .error
                .unwrap_or_else(|| "unknown error getting ephemeral key".to_string()),
        ));
    }

    let key = parsed
        .ephemeral_key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::CredentialFormat("response lacks ephemeralKey".to_string()))?;
    let expires_at = parsed
        .expires_at
        .ok_or_else(|| Error::CredentialFormat("response lacks expiresAt".to_string()))?;

    Ok(Credential::new(&key, expires_at))
}

/// Caches the last credential and only goes back to the [`TokenSource`] once it
/// is about to expire.
///
/// The cache lock is held across the fetch, so concurrent callers on the same
/// provider share one request.
pub struct CredentialProvider<S: TokenSource> {
    source: S,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<Credential>>,
}

impl<S: TokenSource> CredentialProvider<S> {
    pub fn new(source: S) -> Self {
        Self::with_clock(source, Arc::new(SystemClock))
    }

    pub fn with_clock(source: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            cached: Mutex::new(None),
        }
    }

    /// Seeds the cache, e.g. with a key handed out alongside the page.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.cached = Mutex::new(Some(credential));
        self
    }

    pub async fn get_credential(&self) -> Result<Credential> {
        let mut cached = self.cached.lock().await;
        let now = self.clock.now();

        if let Some(credential) = cached.as_ref() {
            if credential.is_usable_at(now) {
                tracing::debug!(
                    "reusing cached ephemeral key, expires_at={}",
                    credential.expires_at()
                );
                return Ok(credential.clone());
            }
            tracing::debug!("cached ephemeral key expires too soon, refreshing");
        }

        let credential = self.source.fetch().await?;
        tracing::info!("got ephemeral key, expires_at={}", credential.expires_at());
        *cached = Some(credential.clone());
        Ok(credential)
    }
}
