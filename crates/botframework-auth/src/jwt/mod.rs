//! JWT Infrastructure - token verification against rotating OpenID keys
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  TokenExtractor              │  scheme / issuer pre-check / verify
//! └──────────────┬───────────────┘
//!                │ kid
//! ┌──────────────▼───────────────┐
//! │  SigningKeyCache             │  metadata URL -> JWKS, 5 day refresh
//! └──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `keys` - discovery document + JWKS fetching and caching
//! - `extractor` - bearer token verification producing a [`ClaimsIdentity`]
//!
//! [`ClaimsIdentity`]: crate::claims::ClaimsIdentity

pub mod extractor;
pub mod keys;

pub use extractor::TokenExtractor;
pub use keys::{OpenIdMetadata, SigningKeyCache, SigningKeyRecord, StaleKeyPolicy};

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, Validation};
use serde_json::{Map, Value};

use crate::constants::{ALLOWED_SIGNING_ALGORITHMS, CLOCK_SKEW};
use crate::error::{AuthError, Result};

/// Rules a token must satisfy to be accepted by a [`TokenExtractor`]
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationParameters {
    /// Accepted `iss` values
    pub issuers: Vec<String>,
    /// Expected `aud`; `None` defers the audience check to the caller
    pub audience: Option<String>,
    /// Tolerated clock skew on `exp`/`nbf`
    pub clock_skew: Duration,
    /// Whether `exp` must be present and in the future
    pub require_expiration: bool,
    /// Permitted header `alg` values
    pub algorithms: Vec<Algorithm>,
}

impl ValidationParameters {
    /// Parameters accepting the given issuers with the standard skew and algorithms
    pub fn new<I, S>(issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            issuers: issuers.into_iter().map(Into::into).collect(),
            audience: None,
            clock_skew: CLOCK_SKEW,
            require_expiration: true,
            algorithms: ALLOWED_SIGNING_ALGORITHMS.to_vec(),
        }
    }

    /// Require a specific audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Whether `issuer` is one of the accepted issuers
    pub fn accepts_issuer(&self, issuer: &str) -> bool {
        self.issuers.iter().any(|i| i == issuer)
    }

    /// Whether `alg` is permitted
    pub fn allows_algorithm(&self, alg: Algorithm) -> bool {
        self.algorithms.contains(&alg)
    }

    /// Translate into `jsonwebtoken` validation rules
    pub(crate) fn to_validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = self.algorithms.clone();
        validation.leeway = self.clock_skew.as_secs();
        validation.validate_exp = self.require_expiration;
        if !self.require_expiration {
            validation.required_spec_claims.remove("exp");
        }
        validation.validate_nbf = true;
        validation.set_issuer(&self.issuers);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

/// Split an authorization header into `(scheme, token)`
///
/// Returns `None` unless the header has exactly two space-separated parts.
pub(crate) fn split_auth_header(auth_header: &str) -> Option<(&str, &str)> {
    let mut parts = auth_header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) => Some((scheme, token)),
        _ => None,
    }
}

/// Decode a token payload without verifying its signature
///
/// Only used to route tokens before verification; never trust the result.
pub(crate) fn peek_claims(token: &str) -> Result<Map<String, Value>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::MalformedToken("Invalid JWT format".to_string()));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken(format!("Invalid JWT payload encoding: {e}")))?;

    serde_json::from_slice(&payload)
        .map_err(|e| AuthError::MalformedToken(format!("Invalid JWT claims: {e}")))
}

/// Unverified `iss` claim of a token
pub(crate) fn peek_issuer(token: &str) -> Result<Option<String>> {
    let claims = peek_claims(token)?;
    Ok(claims
        .get(crate::constants::claims::ISSUER)
        .and_then(Value::as_str)
        .map(str::to_string))
}
