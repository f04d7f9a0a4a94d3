//! Process-wide cache of outbound access tokens with per-key refresh locks

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

/// Access token plus the instant (epoch millis) it stops being used
#[derive(Clone)]
pub struct CachedToken {
    access_token: SecretString,
    expiration_time: i64,
}

impl CachedToken {
    /// Create a cache entry
    pub fn new(access_token: impl Into<String>, expiration_time: i64) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            expiration_time,
        }
    }

    /// The bearer token
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Epoch millis after which the token is no longer handed out
    pub fn expiration_time(&self) -> i64 {
        self.expiration_time
    }

    /// Whether the token may still be used at `now_millis`
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        self.expiration_time > now_millis
    }

    /// Whether the token may still be used now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now().timestamp_millis())
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"[REDACTED]")
            .field("expiration_time", &self.expiration_time)
            .finish()
    }
}

/// Tokens keyed by app credential, shared by every credential manager
///
/// Reads are lock-free. Refreshes for one key are serialized through
/// [`TokenCache::refresh_lock`].
#[derive(Debug, Default)]
pub struct TokenCache {
    tokens: DashMap<String, CachedToken>,
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TokenCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entry for `key`, usable or not
    pub fn get(&self, key: &str) -> Option<CachedToken> {
        self.tokens.get(key).map(|t| t.clone())
    }

    /// Cached entry for `key` if it has not expired
    pub fn get_valid(&self, key: &str) -> Option<CachedToken> {
        self.get(key).filter(CachedToken::is_valid)
    }

    /// Store `token` under `key`
    pub fn insert(&self, key: impl Into<String>, token: CachedToken) {
        self.tokens.insert(key.into(), token);
    }

    /// Drop the entry for `key`
    pub fn remove(&self, key: &str) -> Option<CachedToken> {
        self.tokens.remove(key).map(|(_, t)| t)
    }

    /// Lock held while a token for `key` is being requested
    pub fn refresh_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiration_is_exclusive() {
        let token = CachedToken::new("abc", 1_000);
        assert!(token.is_valid_at(999));
        assert!(!token.is_valid_at(1_000));
    }

    #[test]
    fn test_get_valid_skips_expired() {
        let cache = TokenCache::new();
        let now = Utc::now().timestamp_millis();

        cache.insert("fresh-cache", CachedToken::new("fresh", now + 60_000));
        cache.insert("expired-cache", CachedToken::new("expired", now - 1));

        assert_eq!(cache.get_valid("fresh-cache").unwrap().access_token(), "fresh");
        assert!(cache.get_valid("expired-cache").is_none());
        assert!(cache.get("expired-cache").is_some());
    }

    #[test]
    fn test_refresh_lock_is_shared_per_key() {
        let cache = TokenCache::new();
        let a = cache.refresh_lock("app-cache");
        let b = cache.refresh_lock("app-cache");
        let c = cache.refresh_lock("other-cache");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = CachedToken::new("super-secret", 0);
        assert!(!format!("{token:?}").contains("super-secret"));
    }
}
