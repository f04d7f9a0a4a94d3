//! Process-wide authentication state
//!
//! Build one [`AuthState`] at service start and hand clones to request
//! handlers. Clones share the signing key cache, the token cache and the
//! trusted host list; separate instances (e.g. per test) share nothing.

use std::sync::Arc;

use crate::authenticator::RequestAuthenticator;
use crate::config::AuthConfig;
use crate::credentials::SimpleCredentialProvider;
use crate::jwt::SigningKeyCache;
use crate::outbound::{AppCredentials, ConnectorClient, TokenCache, TrustedHosts};

/// Shared caches plus the inbound and outbound entry points built on them
#[derive(Debug, Clone)]
pub struct AuthState {
    /// Configuration the state was built from
    pub config: Arc<AuthConfig>,
    /// Signing keys by metadata URL
    pub key_cache: Arc<SigningKeyCache>,
    /// Outbound access tokens by app id
    pub token_cache: Arc<TokenCache>,
    /// Hosts outbound credentials may be sent to
    pub trusted_hosts: Arc<TrustedHosts>,
    /// Credential provider for the configured app id
    pub credentials: Arc<SimpleCredentialProvider>,
    /// Inbound request authenticator
    pub authenticator: RequestAuthenticator,
    /// Outbound credentials for the configured app id
    pub app_credentials: Arc<AppCredentials>,
}

impl AuthState {
    /// State with default caches for `config`
    pub fn new(config: AuthConfig) -> Self {
        Self::with_key_cache(config, SigningKeyCache::new())
    }

    /// State using a preconfigured signing key cache
    pub fn with_key_cache(config: AuthConfig, key_cache: SigningKeyCache) -> Self {
        let key_cache = Arc::new(key_cache);
        let token_cache = Arc::new(TokenCache::new());
        let trusted_hosts = Arc::new(TrustedHosts::with_defaults());

        let authenticator =
            RequestAuthenticator::new(&config, Arc::clone(&key_cache), Arc::clone(&trusted_hosts));
        let app_credentials = Arc::new(AppCredentials::new(
            &config,
            Arc::clone(&token_cache),
            Arc::clone(&trusted_hosts),
        ));
        let credentials = Arc::new(SimpleCredentialProvider::from(&config));

        Self {
            config: Arc::new(config),
            key_cache,
            token_cache,
            trusted_hosts,
            credentials,
            authenticator,
            app_credentials,
        }
    }

    /// Connector client for replies to `service_url`
    pub fn connector(&self, service_url: impl Into<String>) -> ConnectorClient {
        ConnectorClient::new(service_url, Arc::clone(&self.app_credentials))
    }
}
