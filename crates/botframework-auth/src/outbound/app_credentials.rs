//! OAuth client-credentials tokens for this service's own app identity
//!
//! ```text
//! sign_request(url) ── trusted host? ──no──> sent without credentials
//!                           │yes
//!                      get_token() ── cached & unexpired ──> token
//!                           │miss
//!                   refresh lock (one request per app id)
//!                           │
//!                 POST {oauth_endpoint} grant_type=client_credentials
//! ```

use std::sync::Arc;

use chrono::Utc;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, error, info};

use super::token_cache::{CachedToken, TokenCache};
use super::trusted_hosts::TrustedHosts;
use crate::config::AuthConfig;
use crate::constants::TOKEN_REFRESH_MARGIN;
use crate::error::{AuthError, Result};

/// Token endpoint response body
#[derive(Debug, Deserialize)]
struct OAuthResponse {
    #[serde(default)]
    token_type: Option<String>,
    expires_in: i64,
    access_token: String,
}

/// Acquires, caches and attaches bearer tokens for outbound calls
#[derive(Debug, Clone)]
pub struct AppCredentials {
    app_id: String,
    app_password: SecretString,
    oauth_endpoint: String,
    oauth_scope: String,
    token_cache_key: String,
    token_cache: Arc<TokenCache>,
    trusted_hosts: Arc<TrustedHosts>,
    http_client: reqwest::Client,
}

impl AppCredentials {
    /// Credentials for the app identity in `config`
    ///
    /// `token_cache` and `trusted_hosts` are process-wide state shared with
    /// every other credential manager and the inbound authenticator.
    pub fn new(
        config: &AuthConfig,
        token_cache: Arc<TokenCache>,
        trusted_hosts: Arc<TrustedHosts>,
    ) -> Self {
        Self {
            app_id: config.app_id.clone(),
            app_password: config.app_password.clone(),
            oauth_endpoint: config.oauth_endpoint(),
            oauth_scope: config.oauth_scope.clone(),
            token_cache_key: format!("{}-cache", config.app_id),
            token_cache,
            trusted_hosts,
            http_client: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client for token requests
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// App id tokens are requested for
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Token endpoint
    pub fn oauth_endpoint(&self) -> &str {
        &self.oauth_endpoint
    }

    /// Requested scope
    pub fn oauth_scope(&self) -> &str {
        &self.oauth_scope
    }

    /// Key of this identity in the shared token cache
    pub fn token_cache_key(&self) -> &str {
        &self.token_cache_key
    }

    /// Shared trusted host list
    pub fn trusted_hosts(&self) -> &Arc<TrustedHosts> {
        &self.trusted_hosts
    }

    /// Trust the host of `service_url`; see [`TrustedHosts::trust_service_url`]
    pub fn trust_service_url(&self, service_url: &str, expiration: Option<chrono::DateTime<Utc>>) {
        self.trusted_hosts.trust_service_url(service_url, expiration);
    }

    /// Whether credentials may be sent to `service_url`
    pub fn is_trusted_service_url(&self, service_url: &str) -> bool {
        self.trusted_hosts.is_trusted_service_url(service_url)
    }

    /// Current access token, requesting a new one if needed
    ///
    /// Concurrent callers that miss the cache wait for a single token
    /// request. With `force_refresh` the cache is bypassed unless a concurrent
    /// caller stored a new token while this one waited.
    ///
    /// # Errors
    ///
    /// - [`AuthError::TokenEndpoint`] if the endpoint answers with a status other than 200
    /// - [`AuthError::InvalidResponse`] if a 200 body is not a token response
    ///   or `expires_in` is out of range
    /// - [`AuthError::Http`] on transport failure
    pub async fn get_token(&self, force_refresh: bool) -> Result<String> {
        let observed = self.token_cache.get(&self.token_cache_key);
        if !force_refresh
            && let Some(token) = observed.as_ref().filter(|t| t.is_valid())
        {
            return Ok(token.access_token().to_string());
        }

        let lock = self.token_cache.refresh_lock(&self.token_cache_key);
        let _guard = lock.lock().await;

        // Another caller may have stored a token while we waited
        if let Some(current) = self.token_cache.get_valid(&self.token_cache_key) {
            let replaced = observed
                .as_ref()
                .is_none_or(|seen| seen.expiration_time() != current.expiration_time());
            if !force_refresh || replaced {
                debug!(app_id = %self.app_id, "Token refreshed by concurrent caller");
                return Ok(current.access_token().to_string());
            }
        }

        let token = self.request_token().await?;
        let access_token = token.access_token().to_string();
        self.token_cache.insert(self.token_cache_key.clone(), token);
        Ok(access_token)
    }

    /// Attach `Authorization: Bearer <token>` to `request` if `url` is trusted
    ///
    /// Requests to untrusted hosts are left untouched.
    ///
    /// # Errors
    ///
    /// Errors of [`AppCredentials::get_token`].
    pub async fn sign_request(&self, url: &str, request: &mut reqwest::Request) -> Result<()> {
        self.sign_headers(url, request.headers_mut()).await
    }

    /// Header-map form of [`AppCredentials::sign_request`]
    ///
    /// # Errors
    ///
    /// Errors of [`AppCredentials::get_token`].
    pub async fn sign_headers(&self, url: &str, headers: &mut HeaderMap) -> Result<()> {
        if !self.is_trusted_service_url(url) {
            debug!(url = %url, "Untrusted destination, sending without credentials");
            return Ok(());
        }

        let token = self.get_token(false).await?;
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            AuthError::InvalidResponse("access token is not a valid header value".to_string())
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    async fn request_token(&self) -> Result<CachedToken> {
        info!(app_id = %self.app_id, endpoint = %self.oauth_endpoint, "Requesting access token");

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.app_id.as_str()),
            ("client_secret", self.app_password.expose_secret().as_str()),
            ("scope", self.oauth_scope.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.oauth_endpoint)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            error!(app_id = %self.app_id, status = %status, "Token endpoint rejected request");
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let bytes = response.bytes().await?;
        let body: OAuthResponse = serde_json::from_slice(&bytes).map_err(|e| {
            error!(app_id = %self.app_id, error = %e, "Token endpoint returned unreadable body");
            AuthError::InvalidResponse(e.to_string())
        })?;
        let expiration_time = token_expiration(Utc::now().timestamp_millis(), body.expires_in)
            .ok_or_else(|| {
                AuthError::InvalidResponse(format!("expires_in out of range: {}", body.expires_in))
            })?;

        debug!(
            app_id = %self.app_id,
            token_type = body.token_type.as_deref().unwrap_or("Bearer"),
            expires_in = body.expires_in,
            "Access token acquired"
        );

        Ok(CachedToken::new(body.access_token, expiration_time))
    }
}

/// Expiry in epoch milliseconds, pulled in by the refresh margin
fn token_expiration(now_ms: i64, expires_in: i64) -> Option<i64> {
    expires_in
        .checked_mul(1000)?
        .checked_add(now_ms)?
        .checked_sub(TOKEN_REFRESH_MARGIN.as_millis() as i64)
}
