//! Inbound request authentication entry point
//!
//! Per request: header present → classified (emulator or channel) →
//! verified → service URL host trusted. Every failure is returned as an
//! [`AuthError`]; callers map any `Err` to HTTP 401.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::channel::{self, ChannelAuthenticator};
use crate::claims::ClaimsIdentity;
use crate::config::AuthConfig;
use crate::credentials::CredentialProvider;
use crate::emulator::{self, EmulatorAuthenticator, is_token_from_emulator};
use crate::error::{AuthError, Result};
use crate::jwt::SigningKeyCache;
use crate::outbound::TrustedHosts;

/// Fields of an inbound activity used for authentication
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Channel the activity arrived on
    #[serde(default)]
    pub channel_id: String,
    /// Connector URL replies should be sent to
    #[serde(default)]
    pub service_url: String,
}

impl Activity {
    /// Create an activity
    pub fn new(channel_id: impl Into<String>, service_url: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            service_url: service_url.into(),
        }
    }
}

/// Which authenticator a token is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Issued by an emulator tenant
    Emulator,
    /// Anything else; verified as a connector token
    Channel,
}

impl TokenSource {
    /// Route a raw `Authorization` header by its unverified issuer
    pub fn classify(auth_header: &str) -> Self {
        if is_token_from_emulator(auth_header) {
            Self::Emulator
        } else {
            Self::Channel
        }
    }
}

/// Authenticates inbound webhook calls
#[derive(Debug, Clone)]
pub struct RequestAuthenticator {
    channel: ChannelAuthenticator,
    emulator: EmulatorAuthenticator,
    trusted_hosts: Arc<TrustedHosts>,
}

impl RequestAuthenticator {
    /// Authenticator using the discovery URLs derived from `config`
    pub fn new(
        config: &AuthConfig,
        key_cache: Arc<SigningKeyCache>,
        trusted_hosts: Arc<TrustedHosts>,
    ) -> Self {
        Self::from_parts(
            ChannelAuthenticator::new(config.channel_metadata_url(), Arc::clone(&key_cache)),
            EmulatorAuthenticator::new(config.emulator_metadata_url(), key_cache),
            trusted_hosts,
        )
    }

    /// Assemble from explicit authenticators
    pub fn from_parts(
        channel: ChannelAuthenticator,
        emulator: EmulatorAuthenticator,
        trusted_hosts: Arc<TrustedHosts>,
    ) -> Self {
        Self {
            channel,
            emulator,
            trusted_hosts,
        }
    }

    /// Trusted host list updated on success
    pub fn trusted_hosts(&self) -> &Arc<TrustedHosts> {
        &self.trusted_hosts
    }

    /// Authenticate one inbound request
    ///
    /// An empty header is accepted only when the credential provider reports
    /// authentication as disabled, yielding an authenticated identity with no
    /// claims. On success the host of `activity.service_url` is trusted for
    /// one day.
    ///
    /// # Errors
    ///
    /// [`AuthError::MissingAuthHeader`] for an empty header with
    /// authentication enabled, otherwise any error of
    /// [`RequestAuthenticator::validate_auth_header`]. Failures are logged.
    pub async fn authenticate_request(
        &self,
        activity: &Activity,
        auth_header: &str,
        credentials: &dyn CredentialProvider,
    ) -> Result<ClaimsIdentity> {
        if auth_header.trim().is_empty() {
            if credentials.is_authentication_disabled().await {
                debug!(channel_id = %activity.channel_id, "Authentication disabled, accepting anonymous request");
                return Ok(ClaimsIdentity::new(Vec::new(), true));
            }
            warn!(channel_id = %activity.channel_id, "Request without authorization header rejected");
            return Err(AuthError::MissingAuthHeader);
        }

        let identity = self
            .validate_auth_header(
                auth_header,
                credentials,
                &activity.channel_id,
                &activity.service_url,
            )
            .await
            .inspect_err(|err| {
                warn!(
                    channel_id = %activity.channel_id,
                    service_url = %activity.service_url,
                    category = ?err.category(),
                    error = %err,
                    "Request authentication failed"
                );
            })?;

        self.trusted_hosts
            .trust_service_url(&activity.service_url, None);
        Ok(identity)
    }

    /// Route and verify a non-empty `Authorization` header
    ///
    /// Emulator tokens go to the emulator authenticator. Everything else is
    /// verified as a connector token, checking the `serviceurl` claim when
    /// `service_url` is non-empty. The resulting identity is checked again
    /// with the route's identity rules before it is returned.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingAuthHeader`] for an empty header
    /// - any error of the selected authenticator
    /// - [`AuthError::NotAuthenticated`] if the token was not addressed to
    ///   the selected authenticator (wrong scheme, unknown issuer)
    pub async fn validate_auth_header(
        &self,
        auth_header: &str,
        credentials: &dyn CredentialProvider,
        channel_id: &str,
        service_url: &str,
    ) -> Result<ClaimsIdentity> {
        if auth_header.trim().is_empty() {
            return Err(AuthError::MissingAuthHeader);
        }

        let source = TokenSource::classify(auth_header);
        debug!(source = ?source, channel_id = %channel_id, "Authorization header classified");

        let identity = match source {
            TokenSource::Emulator => {
                self.emulator
                    .authenticate_emulator_token(auth_header, credentials, channel_id)
                    .await?
            }
            TokenSource::Channel if !service_url.trim().is_empty() => {
                self.channel
                    .authenticate_channel_token_with_service_url(
                        auth_header,
                        credentials,
                        service_url,
                        channel_id,
                    )
                    .await?
            }
            TokenSource::Channel => {
                self.channel
                    .authenticate_channel_token(auth_header, credentials, channel_id)
                    .await?
            }
        };

        match source {
            TokenSource::Emulator => emulator::validate_identity(&identity, credentials).await?,
            TokenSource::Channel => channel::validate_identity(&identity, credentials).await?,
        }

        Ok(identity)
    }
}
