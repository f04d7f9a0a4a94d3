//! Authentication of tokens minted for the bot emulator
//!
//! Emulator tokens come from a fixed set of tenants and name the calling
//! app id in a claim that depends on the token version:
//!
//! | `ver`          | app id claim |
//! |----------------|--------------|
//! | absent, `1.0`  | `appid`      |
//! | `2.0`          | `azp`        |
//! | anything else  | rejected     |

use std::sync::Arc;

use tracing::debug;

use crate::claims::ClaimsIdentity;
use crate::constants::{EMULATOR_TOKEN_ISSUERS, claims};
use crate::credentials::CredentialProvider;
use crate::error::{AuthError, Result};
use crate::jwt::{SigningKeyCache, TokenExtractor, ValidationParameters, peek_issuer, split_auth_header};

/// Emulator token version, decided by the `ver` claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmulatorTokenVersion {
    /// `ver` absent, empty or `1.0`; app id in `appid`
    Version1,
    /// `ver` is `2.0`; app id in `azp`
    Version2,
    /// Any other `ver`
    Unknown(String),
}

impl EmulatorTokenVersion {
    /// Classify a `ver` claim value
    ///
    /// An absent `ver` is accepted as version 1 rather than rejected, so
    /// tokens without the claim are checked against `appid`.
    pub fn from_claim(version: Option<&str>) -> Self {
        match version {
            None | Some("") | Some("1.0") => Self::Version1,
            Some("2.0") => Self::Version2,
            Some(other) => Self::Unknown(other.to_string()),
        }
    }

    /// Claim holding the calling app id for this version
    ///
    /// # Errors
    ///
    /// [`AuthError::UnknownTokenVersion`] for [`EmulatorTokenVersion::Unknown`].
    pub fn app_id_claim(&self) -> Result<&'static str> {
        match self {
            Self::Version1 => Ok(claims::APP_ID),
            Self::Version2 => Ok(claims::AUTHORIZED_PARTY),
            Self::Unknown(version) => Err(AuthError::UnknownTokenVersion(version.clone())),
        }
    }
}

/// Whether an `Authorization` header carries an emulator-issued bearer token
///
/// Only the unverified issuer is inspected; this routes tokens, it does not
/// authenticate them.
pub fn is_token_from_emulator(auth_header: &str) -> bool {
    let Some((scheme, token)) = split_auth_header(auth_header) else {
        return false;
    };
    if scheme != "Bearer" {
        return false;
    }

    match peek_issuer(token) {
        Ok(Some(issuer)) => EMULATOR_TOKEN_ISSUERS.contains(&issuer.as_str()),
        _ => false,
    }
}

/// Validates emulator tokens
#[derive(Debug, Clone)]
pub struct EmulatorAuthenticator {
    extractor: TokenExtractor,
}

impl EmulatorAuthenticator {
    /// Create an authenticator resolving keys from `metadata_url`
    pub fn new(metadata_url: impl Into<String>, key_cache: Arc<SigningKeyCache>) -> Self {
        Self {
            extractor: TokenExtractor::new(Self::validation_parameters(), metadata_url, key_cache),
        }
    }

    /// Emulator tenants; audience is checked against the credential provider
    pub fn validation_parameters() -> ValidationParameters {
        ValidationParameters::new(EMULATOR_TOKEN_ISSUERS.iter().copied())
    }

    /// Underlying token extractor
    pub fn extractor(&self) -> &TokenExtractor {
        &self.extractor
    }

    /// Verify an emulator token and the app id it was issued to
    ///
    /// # Errors
    ///
    /// Any [`TokenExtractor::get_identity`] error, plus the errors of
    /// [`validate_identity`].
    pub async fn authenticate_emulator_token(
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
}

/// App id an emulator identity was issued to
///
/// # Errors
///
/// - [`AuthError::UnknownTokenVersion`] for an unsupported `ver`
/// - [`AuthError::MissingClaim`] if the version's app id claim is absent
pub fn resolve_app_id(identity: &ClaimsIdentity) -> Result<&str> {
    let version = EmulatorTokenVersion::from_claim(identity.get_claim(claims::VERSION));
    let claim = version.app_id_claim()?;

    identity
        .get_claim(claim)
        .ok_or_else(|| AuthError::MissingClaim(claim.to_string()))
}

/// Check an emulator identity: authenticated, emulator issuer, known app id
///
/// # Errors
///
/// - [`AuthError::NotAuthenticated`] if the identity was not verified
/// - [`AuthError::InvalidIssuer`] if `iss` is not an emulator tenant
/// - errors of [`resolve_app_id`]
/// - [`AuthError::InvalidAppId`] if the app id is not one of this service
pub async fn validate_identity(
    identity: &ClaimsIdentity,
    credentials: &dyn CredentialProvider,
) -> Result<()> {
    if !identity.is_authenticated() {
        return Err(AuthError::NotAuthenticated);
    }

    let issuer = identity.get_claim(claims::ISSUER).unwrap_or_default();
    if !EMULATOR_TOKEN_ISSUERS.contains(&issuer) {
        return Err(AuthError::InvalidIssuer);
    }

    let app_id = resolve_app_id(identity)?;
    if !credentials.is_valid_app_id(app_id).await {
        debug!(app_id = %app_id, "Emulator token issued to unknown app id");
        return Err(AuthError::InvalidAppId(app_id.to_string()));
    }

    Ok(())
}
