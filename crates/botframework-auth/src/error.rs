//! Authentication error taxonomy
//!
//! Every failure this crate produces falls into one of four categories:
//!
//! - **Classification** - the token was not addressed to the validator that
//!   looked at it. Callers try the next authenticator or fail closed.
//! - **Verification** - bad signature, expired token, disallowed algorithm,
//!   missing or invalid claims. Always surfaced as "unauthorized".
//! - **Infrastructure** - discovery/JWKS fetch errors, OAuth endpoint
//!   failures, connector transport errors. Possibly transient.
//! - **Configuration** - unknown emulator token version, invalid settings.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AuthError>;

/// Coarse classification of an [`AuthError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Token issuer does not belong to the authenticator that inspected it
    Classification,
    /// Token or identity failed a verification step
    Verification,
    /// A network dependency failed
    Infrastructure,
    /// Settings or token shape are outside what this crate supports
    Configuration,
}

/// Errors produced by request authentication and outbound credentials
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token issuer is not accepted by this authenticator
    #[error("Token issuer '{0}' is not accepted by this authenticator")]
    IssuerNotAccepted(String),

    /// No authorization header and authentication is enabled
    #[error("Unauthorized Access. Request is not authorized")]
    MissingAuthHeader,

    /// Token could not be parsed
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// The key id in the token header is not in the signing key set
    #[error("Signing Key could not be retrieved (kid: {key_id})")]
    SigningKeyNotFound {
        /// Key id taken from the token header
        key_id: String,
    },

    /// Header `alg` is outside the permitted set
    #[error("Token signing algorithm '{0}' not in allowed list")]
    DisallowedAlgorithm(String),

    /// `exp` is in the past (beyond clock skew)
    #[error("Token has expired")]
    TokenExpired,

    /// `nbf` is in the future (beyond clock skew)
    #[error("Token is not yet valid")]
    TokenNotYetValid,

    /// Signature did not verify against the resolved key
    #[error("Token signature is invalid")]
    InvalidSignature,

    /// `iss` claim does not match the expected issuer
    #[error("Unauthorized. Issuer claim is invalid")]
    InvalidIssuer,

    /// `aud` claim does not match the expected audience
    #[error("Unauthorized. Audience claim is invalid")]
    InvalidAudience,

    /// The signing key is endorsed for other channels only
    #[error("Could not validate endorsement for key: {key_id} with endorsements: {endorsements}")]
    EndorsementMismatch {
        /// Key id of the signing key
        key_id: String,
        /// Comma-separated endorsements carried by the key
        endorsements: String,
    },

    /// Identity was produced but is not authenticated
    #[error("Unauthorized. Is not authenticated")]
    NotAuthenticated,

    /// A claim required on this kind of token is absent
    #[error("Unauthorized. \"{0}\" claim is required")]
    MissingClaim(String),

    /// The app id carried by the token is rejected by the credential provider
    #[error("Unauthorized. Invalid AppId passed on token: {0}")]
    InvalidAppId(String),

    /// `serviceurl` claim does not match the request service URL
    #[error("Unauthorized. ServiceUrl claim do not match")]
    ServiceUrlMismatch,

    /// Emulator token carries a `ver` claim this crate does not understand
    #[error("Unauthorized. Unknown Emulator Token version \"{0}\"")]
    UnknownTokenVersion(String),

    /// OpenID discovery document or JWKS could not be fetched
    #[error("Failed to load OpenID metadata from {url}: {reason}")]
    MetadataFetch {
        /// URL that failed
        url: String,
        /// Failure description
        reason: String,
    },

    /// A key in the fetched key set cannot be turned into a verification key
    #[error("Signing key {key_id} is unusable: {reason}")]
    InvalidSigningKey {
        /// Key id of the offending entry
        key_id: String,
        /// Failure description
        reason: String,
    },

    /// A remote endpoint answered with a body that could not be parsed
    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    /// OAuth token endpoint answered with a non-200 status
    #[error("{reason}")]
    TokenEndpoint {
        /// HTTP status code
        status: u16,
        /// HTTP status text
        reason: String,
    },

    /// Connector rejected the call with HTTP 403
    #[error("Unauthorized")]
    Forbidden,

    /// Connector answered with a non-retryable error status
    #[error("Connector returned HTTP {status} {reason}")]
    ConnectorStatus {
        /// HTTP status code
        status: u16,
        /// HTTP status text
        reason: String,
    },

    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IssuerNotAccepted(_) => ErrorCategory::Classification,
            Self::MissingAuthHeader
            | Self::MalformedToken(_)
            | Self::SigningKeyNotFound { .. }
            | Self::DisallowedAlgorithm(_)
            | Self::TokenExpired
            | Self::TokenNotYetValid
            | Self::InvalidSignature
            | Self::InvalidIssuer
            | Self::InvalidAudience
            | Self::EndorsementMismatch { .. }
            | Self::NotAuthenticated
            | Self::MissingClaim(_)
            | Self::InvalidAppId(_)
            | Self::ServiceUrlMismatch
            | Self::Forbidden => ErrorCategory::Verification,
            Self::MetadataFetch { .. }
            | Self::InvalidSigningKey { .. }
            | Self::InvalidResponse(_)
            | Self::TokenEndpoint { .. }
            | Self::ConnectorStatus { .. }
            | Self::Http(_) => ErrorCategory::Infrastructure,
            Self::UnknownTokenVersion(_) | Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }

    /// Whether retrying the same operation later may succeed
    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Infrastructure
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            ErrorKind::ImmatureSignature => Self::TokenNotYetValid,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidAudience => Self::InvalidAudience,
            ErrorKind::InvalidAlgorithm => Self::DisallowedAlgorithm(err.to_string()),
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            _ => Self::MalformedToken(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            AuthError::IssuerNotAccepted("x".into()).category(),
            ErrorCategory::Classification
        );
        assert_eq!(AuthError::TokenExpired.category(), ErrorCategory::Verification);
        assert_eq!(
            AuthError::UnknownTokenVersion("3.0".into()).category(),
            ErrorCategory::Configuration
        );
        assert!(
            AuthError::MetadataFetch {
                url: "https://example.com".into(),
                reason: "HTTP 503".into(),
            }
            .is_transient()
        );
        assert!(!AuthError::InvalidSignature.is_transient());
    }

    #[test]
    fn test_token_endpoint_displays_status_text() {
        let err = AuthError::TokenEndpoint {
            status: 401,
            reason: "Unauthorized".into(),
        };
        assert_eq!(err.to_string(), "Unauthorized");
    }

    #[test]
    fn test_jsonwebtoken_expiry_maps_to_token_expired() {
        let err: AuthError =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::ExpiredSignature)
                .into();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn test_missing_claim_message() {
        let err = AuthError::MissingClaim("appid".into());
        assert!(err.to_string().contains("\"appid\" claim is required"));
    }
}
