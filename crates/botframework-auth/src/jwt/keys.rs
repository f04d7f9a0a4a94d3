//! Signing key discovery and caching
//!
//! Keys are resolved in two hops: the OpenID discovery document at a
//! metadata URL names a `jwks_uri`, and that key set holds the RSA keys
//! tokens are signed with.
//!
//! - **Refresh interval**: 5 days by default, per metadata URL
//! - **Single flight**: concurrent misses on one URL trigger one fetch
//! - **Stale keys**: on refresh failure the previous key set may still be searched
//! - **Rate limit**: after a failed refresh, no new attempt for 5 seconds
//!
//! Keys the service publishes may carry `endorsements`, the channel ids
//! the key is allowed to sign for.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::constants::{METADATA_MIN_REFRESH_INTERVAL, METADATA_REFRESH_INTERVAL};
use crate::error::{AuthError, Result};

/// What to do when a key set refresh fails but an older key set is cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleKeyPolicy {
    /// Search the previously fetched keys before reporting the failure
    #[default]
    ServeStale,
    /// Report the failure immediately
    FailHard,
}

/// OpenID discovery document; only `jwks_uri` is read
#[derive(Debug, Clone, Deserialize)]
struct OpenIdConfiguration {
    jwks_uri: String,
}

/// One entry of a JSON Web Key Set
#[derive(Debug, Clone, Deserialize)]
pub struct JsonWebKey {
    /// Key id
    #[serde(default)]
    pub kid: Option<String>,
    /// Key type (`RSA` for usable keys)
    #[serde(default)]
    pub kty: Option<String>,
    /// RSA modulus (base64url)
    #[serde(default)]
    pub n: Option<String>,
    /// RSA exponent (base64url)
    #[serde(default)]
    pub e: Option<String>,
    /// Channel ids this key may sign for
    #[serde(default)]
    pub endorsements: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonWebKeySet {
    #[serde(default)]
    keys: Vec<JsonWebKey>,
}

/// RSA public key resolved by key id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKeyRecord {
    /// Key id
    pub key_id: String,
    /// RSA modulus (base64url)
    pub modulus: String,
    /// RSA exponent (base64url)
    pub exponent: String,
    /// Channel ids this key may sign for; empty means unrestricted
    pub endorsements: Vec<String>,
}

impl SigningKeyRecord {
    /// Verification key for `jsonwebtoken`
    pub fn decoding_key(&self) -> Result<DecodingKey> {
        DecodingKey::from_rsa_components(&self.modulus, &self.exponent).map_err(|e| {
            AuthError::InvalidSigningKey {
                key_id: self.key_id.clone(),
                reason: e.to_string(),
            }
        })
    }

    fn from_jwk(jwk: &JsonWebKey) -> Option<Self> {
        // Only RSA keys with both components are usable
        if jwk.kty.as_deref().is_some_and(|kty| kty != "RSA") {
            return None;
        }
        Some(Self {
            key_id: jwk.kid.clone()?,
            modulus: jwk.n.clone()?,
            exponent: jwk.e.clone()?,
            endorsements: jwk.endorsements.clone().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone)]
struct CachedKeySet {
    keys: Vec<JsonWebKey>,
    refreshed_at: SystemTime,
}

impl CachedKeySet {
    fn is_fresh(&self, refresh_interval: Duration) -> bool {
        match SystemTime::now().duration_since(self.refreshed_at) {
            Ok(age) => age < refresh_interval,
            Err(_) => false,
        }
    }

    fn find(&self, key_id: &str) -> Option<SigningKeyRecord> {
        self.keys
            .iter()
            .find(|k| k.kid.as_deref() == Some(key_id))
            .and_then(SigningKeyRecord::from_jwk)
    }
}

#[derive(Debug, Clone)]
struct RefreshFailure {
    reason: String,
    failed_at: SystemTime,
}

/// Key set published behind one OpenID metadata URL
#[derive(Debug)]
pub struct OpenIdMetadata {
    url: String,
    cache: RwLock<Option<CachedKeySet>>,
    refresh_lock: Mutex<()>,
    /// Last failed refresh attempt, cleared on success
    last_failure: RwLock<Option<RefreshFailure>>,
    http_client: reqwest::Client,
    refresh_interval: Duration,
    min_refresh_interval: Duration,
    stale_policy: StaleKeyPolicy,
}

impl OpenIdMetadata {
    /// Create an empty entry for `url`
    pub fn new(
        url: impl Into<String>,
        http_client: reqwest::Client,
        refresh_interval: Duration,
        stale_policy: StaleKeyPolicy,
    ) -> Self {
        Self {
            url: url.into(),
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            last_failure: RwLock::new(None),
            http_client,
            refresh_interval,
            min_refresh_interval: METADATA_MIN_REFRESH_INTERVAL,
            stale_policy,
        }
    }

    /// Set how long a failed refresh suppresses further attempts
    pub fn with_min_refresh_interval(mut self, min_refresh_interval: Duration) -> Self {
        self.min_refresh_interval = min_refresh_interval;
        self
    }

    /// Metadata URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether a key set is cached and younger than the refresh interval
    pub async fn is_fresh(&self) -> bool {
        self.cache
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.is_fresh(self.refresh_interval))
    }

    /// Resolve `key_id`, refreshing the key set first if it is stale
    ///
    /// Returns `Ok(None)` when the key is not published or is not an RSA key.
    ///
    /// A refresh that failed less than the minimum refresh interval ago is
    /// not retried; its error is reused instead.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MetadataFetch`] when a refresh fails and no
    /// usable stale key is available.
    pub async fn get_key(&self, key_id: &str) -> Result<Option<SigningKeyRecord>> {
        if let Some(found) = self.lookup_fresh(key_id).await {
            return Ok(found);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(found) = self.lookup_fresh(key_id).await {
            debug!(url = %self.url, "Key set refreshed by concurrent caller");
            return Ok(found);
        }

        let refreshed = match self.recent_failure().await {
            Some(failure) => {
                debug!(url = %self.url, "Key set refresh failed recently, not retrying yet");
                Err(AuthError::MetadataFetch {
                    url: self.url.clone(),
                    reason: failure.reason,
                })
            }
            None => self.refresh().await,
        };

        match refreshed {
            Ok(()) => Ok(self.lookup_cached(key_id).await),
            Err(err) => {
                if self.stale_policy == StaleKeyPolicy::ServeStale
                    && let Some(record) = self.lookup_cached(key_id).await
                {
                    warn!(
                        url = %self.url,
                        key_id = %key_id,
                        error = %err,
                        "Key set refresh failed, using stale signing key"
                    );
                    return Ok(Some(record));
                }
                Err(err)
            }
        }
    }

    /// Drop the cached key set so the next lookup refetches
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        *self.last_failure.write().await = None;
        debug!(url = %self.url, "Signing key cache cleared");
    }

    /// `Some(result)` when a fresh key set is cached
    async fn lookup_fresh(&self, key_id: &str) -> Option<Option<SigningKeyRecord>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|c| c.is_fresh(self.refresh_interval))
            .map(|c| c.find(key_id))
    }

    async fn lookup_cached(&self, key_id: &str) -> Option<SigningKeyRecord> {
        self.cache.read().await.as_ref().and_then(|c| c.find(key_id))
    }

    async fn recent_failure(&self) -> Option<RefreshFailure> {
        self.last_failure
            .read()
            .await
            .as_ref()
            .filter(|f| {
                SystemTime::now()
                    .duration_since(f.failed_at)
                    .is_ok_and(|since| since < self.min_refresh_interval)
            })
            .cloned()
    }

    async fn refresh(&self) -> Result<()> {
        let result = self.fetch_key_set().await;

        *self.last_failure.write().await = result.as_ref().err().map(|err| RefreshFailure {
            reason: match err {
                AuthError::MetadataFetch { reason, .. } => reason.clone(),
                other => other.to_string(),
            },
            failed_at: SystemTime::now(),
        });
        result
    }

    async fn fetch_key_set(&self) -> Result<()> {
        info!(url = %self.url, "Fetching OpenID metadata");

        let configuration: OpenIdConfiguration = self.fetch_json(&self.url).await?;
        let key_set: JsonWebKeySet = self.fetch_json(&configuration.jwks_uri).await?;

        info!(
            url = %self.url,
            jwks_uri = %configuration.jwks_uri,
            key_count = key_set.keys.len(),
            "Fetched signing keys"
        );

        *self.cache.write().await = Some(CachedKeySet {
            keys: key_set.keys,
            refreshed_at: SystemTime::now(),
        });
        Ok(())
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let fetch_error = |reason: String| AuthError::MetadataFetch {
            url: url.to_string(),
            reason,
        };

        let response = self.http_client.get(url).send().await.map_err(|e| {
            error!(url = %url, error = %e, "Failed to fetch OpenID metadata");
            fetch_error(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(url = %url, status = %status, "OpenID metadata endpoint returned error status");
            return Err(fetch_error(format!("HTTP {status}")));
        }

        response.json().await.map_err(|e| {
            error!(url = %url, error = %e, "Failed to parse OpenID metadata");
            fetch_error(format!("invalid document: {e}"))
        })
    }
}

/// Process-wide signing key cache keyed by metadata URL
///
/// Share one instance (behind an `Arc`) between every authenticator so a
/// metadata URL is fetched at most once per refresh interval.
///
/// # Example
///
/// ```rust,no_run
/// # use botframework_auth::jwt::SigningKeyCache;
/// # tokio_test::block_on(async {
/// let cache = SigningKeyCache::new();
/// let key = cache
///     .get_key("https://login.botframework.com/v1/.well-known/openidconfiguration", "kid-1")
///     .await?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug)]
pub struct SigningKeyCache {
    endpoints: RwLock<HashMap<String, Arc<OpenIdMetadata>>>,
    http_client: reqwest::Client,
    refresh_interval: Duration,
    min_refresh_interval: Duration,
    stale_policy: StaleKeyPolicy,
}

impl Default for SigningKeyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningKeyCache {
    /// Cache with a 5 day refresh interval and stale key fallback
    pub fn new() -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoints: RwLock::new(HashMap::new()),
            http_client,
            refresh_interval: METADATA_REFRESH_INTERVAL,
            min_refresh_interval: METADATA_MIN_REFRESH_INTERVAL,
            stale_policy: StaleKeyPolicy::default(),
        }
    }

    /// Set the key set refresh interval for entries created afterwards
    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    /// Set how long a failed refresh suppresses further attempts, for
    /// entries created afterwards
    pub fn with_min_refresh_interval(mut self, min_refresh_interval: Duration) -> Self {
        self.min_refresh_interval = min_refresh_interval;
        self
    }

    /// Set the stale key policy for entries created afterwards
    pub fn with_stale_policy(mut self, stale_policy: StaleKeyPolicy) -> Self {
        self.stale_policy = stale_policy;
        self
    }

    /// Use a custom HTTP client
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Configured refresh interval
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Entry for `metadata_url`, created on first use
    pub async fn metadata(&self, metadata_url: &str) -> Arc<OpenIdMetadata> {
        if let Some(entry) = self.endpoints.read().await.get(metadata_url) {
            return Arc::clone(entry);
        }

        let mut endpoints = self.endpoints.write().await;
        let entry = endpoints.entry(metadata_url.to_string()).or_insert_with(|| {
            Arc::new(OpenIdMetadata::new(
                metadata_url,
                self.http_client.clone(),
                self.refresh_interval,
                self.stale_policy,
            )
            .with_min_refresh_interval(self.min_refresh_interval))
        });
        Arc::clone(entry)
    }

    /// Resolve `key_id` from the key set published behind `metadata_url`
    pub async fn get_key(
        &self,
        metadata_url: &str,
        key_id: &str,
    ) -> Result<Option<SigningKeyRecord>> {
        self.metadata(metadata_url).await.get_key(key_id).await
    }

    /// Force the next lookup on `metadata_url` to refetch
    pub async fn invalidate(&self, metadata_url: &str) {
        if let Some(entry) = self.endpoints.read().await.get(metadata_url) {
            entry.invalidate().await;
        }
    }
}
