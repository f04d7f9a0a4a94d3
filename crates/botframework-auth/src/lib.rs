//! # Bot Framework Auth - Connector Webhook Authentication
//!
//! Authenticates inbound webhook calls from the connector service (or its
//! emulator) and manages the OAuth client-credentials token this service
//! uses to call back into the connector.
//!
//! ## Architecture
//!
//! - [`jwt`] - signing key discovery/caching and bearer token verification
//! - [`channel`] - connector-issued tokens (`iss`, `aud`, `serviceurl` checks)
//! - [`emulator`] - emulator-issued tokens (versioned app id claims)
//! - [`authenticator`] - [`RequestAuthenticator`], the per-request entry point
//! - [`outbound`] - trusted hosts, token cache, request signing, connector client
//! - [`state`] - [`AuthState`], the process-wide shared state
//! - [`config`] / [`credentials`] - app identity and the credential provider contract
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use botframework_auth::{Activity, AuthConfig, AuthState};
//!
//! # tokio_test::block_on(async {
//! let state = AuthState::new(AuthConfig::from_env()?);
//!
//! let activity = Activity::new("msteams", "https://smba.trafficmanager.net/amer/");
//! let identity = state
//!     .authenticator
//!     .authenticate_request(&activity, "Bearer eyJ...", state.credentials.as_ref())
//!     .await?;
//!
//! // The service URL is now trusted; replies carry a bearer token
//! let reply = state
//!     .connector(&activity.service_url)
//!     .post("/v3/conversations/abc/activities", &serde_json::json!({"type": "message"}))
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`Result`]. [`AuthError::category`] separates
//! verification failures (always 401) from infrastructure failures that may
//! be transient.

pub mod authenticator;
pub mod channel;
pub mod claims;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod emulator;
pub mod error;
pub mod jwt;
pub mod outbound;
pub mod state;

#[doc(inline)]
pub use authenticator::{Activity, RequestAuthenticator, TokenSource};
#[doc(inline)]
pub use channel::ChannelAuthenticator;
#[doc(inline)]
pub use claims::{Claim, ClaimsIdentity};
#[doc(inline)]
pub use config::{AuthConfig, DeploymentEnvironment};
#[doc(inline)]
pub use credentials::{CredentialProvider, SimpleCredentialProvider};
#[doc(inline)]
pub use emulator::{EmulatorAuthenticator, EmulatorTokenVersion, is_token_from_emulator};
#[doc(inline)]
pub use error::{AuthError, ErrorCategory, Result};
#[doc(inline)]
pub use jwt::{SigningKeyCache, StaleKeyPolicy, TokenExtractor, ValidationParameters};
#[doc(inline)]
pub use outbound::{AppCredentials, ConnectorClient, RetryPolicy, TokenCache, TrustedHosts};
#[doc(inline)]
pub use state::AuthState;
