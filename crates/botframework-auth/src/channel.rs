//! Authentication of tokens minted by the production connector service

use std::sync::Arc;

use tracing::debug;

use crate::claims::ClaimsIdentity;
use crate::constants::{CHANNEL_TOKEN_ISSUER, claims};
use crate::credentials::CredentialProvider;
use crate::error::{AuthError, Result};
use crate::jwt::{SigningKeyCache, TokenExtractor, ValidationParameters};

/// Validates connector service tokens
#[derive(Debug, Clone)]
pub struct ChannelAuthenticator {
    extractor: TokenExtractor,
}

impl ChannelAuthenticator {
    /// Create an authenticator resolving keys from `metadata_url`
    pub fn new(metadata_url: impl Into<String>, key_cache: Arc<SigningKeyCache>) -> Self {
        Self {
            extractor: TokenExtractor::new(Self::validation_parameters(), metadata_url, key_cache),
        }
    }

    /// Connector issuer only; audience is checked against the credential provider
    pub fn validation_parameters() -> ValidationParameters {
        ValidationParameters::new([CHANNEL_TOKEN_ISSUER])
    }

    /// Underlying token extractor
    pub fn extractor(&self) -> &TokenExtractor {
        &self.extractor
    }

    /// Verify a connector token and the app id it is addressed to
    ///
    /// # Errors
    ///
    /// Any [`TokenExtractor::get_identity`] error, plus
    /// [`AuthError::NotAuthenticated`], [`AuthError::InvalidIssuer`] or
    /// [`AuthError::InvalidAppId`] from [`validate_identity`].
    pub async fn authenticate_channel_token(
        &self,
        auth_header: &str,
        credentials: &dyn CredentialProvider,
        channel_id: &str,
    ) -> Result<ClaimsIdentity> {
        let identity = self
            .extractor
            .get_identity_from_auth_header(auth_header, channel_id)
            .await?;

        validate_identity(&identity, credentials).await?;
        Ok(identity)
    }

    /// Like [`authenticate_channel_token`](Self::authenticate_channel_token),
    /// additionally requiring the `serviceurl` claim to equal `service_url`
    ///
    /// # Errors
    ///
    /// [`AuthError::ServiceUrlMismatch`] when the claim is absent or differs.
    pub async fn authenticate_channel_token_with_service_url(
        &self,
        auth_header: &str,
        credentials: &dyn CredentialProvider,
        service_url: &str,
        channel_id: &str,
    ) -> Result<ClaimsIdentity> {
        let identity = self
            .authenticate_channel_token(auth_header, credentials, channel_id)
            .await?;

        if identity.get_claim(claims::SERVICE_URL) != Some(service_url) {
            debug!(service_url = %service_url, "serviceurl claim does not match request");
            return Err(AuthError::ServiceUrlMismatch);
        }

        Ok(identity)
    }
}

/// Check a connector identity: authenticated, connector issuer, known audience
///
/// # Errors
///
/// - [`AuthError::NotAuthenticated`] if the identity was not verified
/// - [`AuthError::InvalidIssuer`] if `iss` is not the connector issuer
/// - [`AuthError::InvalidAppId`] if `aud` is not an app id of this service
pub async fn validate_identity(
    identity: &ClaimsIdentity,
    credentials: &dyn CredentialProvider,
) -> Result<()> {
    if !identity.is_authenticated() {
        return Err(AuthError::NotAuthenticated);
    }

    if identity.get_claim(claims::ISSUER) != Some(CHANNEL_TOKEN_ISSUER) {
        return Err(AuthError::InvalidIssuer);
    }

    let audience = identity.get_claim(claims::AUDIENCE).unwrap_or_default();
    if !credentials.is_valid_app_id(audience).await {
        return Err(AuthError::InvalidAppId(audience.to_string()));
    }

    Ok(())
}
