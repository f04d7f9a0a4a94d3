//! Bearer token verification
//!
//! A [`TokenExtractor`] is bound to one set of [`ValidationParameters`] and
//! one OpenID metadata URL. It verifies a token end to end:
//!
//! 1. Scheme must be `Bearer` and the token non-empty
//! 2. Unverified `iss` must be an accepted issuer (no network call otherwise)
//! 3. Header `alg` must be permitted and `kid` must resolve to a published key
//! 4. Signature, issuer, audience, `exp`/`nbf` within the clock skew
//! 5. Key endorsements, when present, must include the request's channel id
//!
//! Steps 1 and 2 disqualify silently with an unauthenticated identity so the
//! caller can try another authenticator. Later steps fail hard.

use std::sync::Arc;

use jsonwebtoken::{decode, decode_header};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::keys::SigningKeyCache;
use super::{ValidationParameters, peek_issuer, split_auth_header};
use crate::claims::ClaimsIdentity;
use crate::error::{AuthError, Result};

/// Verifies bearer tokens against one issuer configuration
#[derive(Debug, Clone)]
pub struct TokenExtractor {
    parameters: ValidationParameters,
    metadata_url: String,
    key_cache: Arc<SigningKeyCache>,
}

impl TokenExtractor {
    /// Create an extractor resolving keys from `metadata_url`
    pub fn new(
        parameters: ValidationParameters,
        metadata_url: impl Into<String>,
        key_cache: Arc<SigningKeyCache>,
    ) -> Self {
        Self {
            parameters,
            metadata_url: metadata_url.into(),
            key_cache,
        }
    }

    /// Validation rules in effect
    pub fn parameters(&self) -> &ValidationParameters {
        &self.parameters
    }

    /// OpenID metadata URL keys are resolved from
    pub fn metadata_url(&self) -> &str {
        &self.metadata_url
    }

    /// Verify the token carried by a raw `Authorization` header
    ///
    /// A header that is not exactly `<scheme> <token>` yields an
    /// unauthenticated identity.
    ///
    /// # Errors
    ///
    /// See [`TokenExtractor::get_identity`].
    pub async fn get_identity_from_auth_header(
        &self,
        auth_header: &str,
        channel_id: &str,
    ) -> Result<ClaimsIdentity> {
        match split_auth_header(auth_header) {
            Some((scheme, token)) => self.get_identity(scheme, token, channel_id).await,
            None => Ok(ClaimsIdentity::unauthenticated()),
        }
    }

    /// Verify `token` presented with `scheme`
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedToken`] if the token cannot be decoded
    /// - [`AuthError::DisallowedAlgorithm`] if the header `alg` is not permitted
    /// - [`AuthError::SigningKeyNotFound`] if `kid` is not published
    /// - [`AuthError::TokenExpired`], [`AuthError::InvalidSignature`] and the
    ///   other verification variants when a claim or the signature is rejected
    /// - [`AuthError::EndorsementMismatch`] if the key is not endorsed for `channel_id`
    /// - [`AuthError::MetadataFetch`] if the key set cannot be loaded
    pub async fn get_identity(
        &self,
        scheme: &str,
        token: &str,
        channel_id: &str,
    ) -> Result<ClaimsIdentity> {
        if scheme != "Bearer" || token.is_empty() {
            return Ok(ClaimsIdentity::unauthenticated());
        }

        if !self.has_allowed_issuer(token)? {
            debug!(metadata_url = %self.metadata_url, "Token issuer not accepted by this extractor");
            return Ok(ClaimsIdentity::unauthenticated());
        }

        self.validate_token(token, channel_id).await
    }

    fn has_allowed_issuer(&self, token: &str) -> Result<bool> {
        let issuer = peek_issuer(token)?;
        Ok(issuer.is_some_and(|iss| self.parameters.accepts_issuer(&iss)))
    }

    async fn validate_token(&self, token: &str, channel_id: &str) -> Result<ClaimsIdentity> {
        let header = decode_header(token)
            .map_err(|e| AuthError::MalformedToken(format!("Invalid JWT header: {e}")))?;

        if !self.parameters.allows_algorithm(header.alg) {
            warn!(algorithm = ?header.alg, "Token signed with disallowed algorithm");
            return Err(AuthError::DisallowedAlgorithm(format!("{:?}", header.alg)));
        }

        let key_id = header.kid.unwrap_or_default();
        let key = self
            .key_cache
            .get_key(&self.metadata_url, &key_id)
            .await?
            .ok_or_else(|| AuthError::SigningKeyNotFound {
                key_id: key_id.clone(),
            })?;

        let decoding_key = key.decoding_key()?;
        let validation = self.parameters.to_validation();

        let token_data =
            decode::<Map<String, Value>>(token, &decoding_key, &validation).map_err(|e| {
                debug!(key_id = %key_id, error = %e, "Token verification failed");
                AuthError::from(e)
            })?;

        if !key.endorsements.is_empty() && !key.endorsements.iter().any(|e| e == channel_id) {
            warn!(
                key_id = %key_id,
                channel_id = %channel_id,
                "Signing key is not endorsed for channel"
            );
            return Err(AuthError::EndorsementMismatch {
                key_id,
                endorsements: key.endorsements.join(","),
            });
        }

        debug!(key_id = %key_id, "Token verified");
        Ok(ClaimsIdentity::from_payload(token_data.claims))
    }
}
