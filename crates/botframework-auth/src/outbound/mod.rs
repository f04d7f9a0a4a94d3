//! Outbound credentials
//!
//! - `trusted_hosts` - hosts this service's bearer token may be sent to
//! - `token_cache` - process-wide access token cache with refresh locks
//! - `app_credentials` - client-credentials token acquisition and request signing
//! - `connector` - signed connector calls with retry

pub mod app_credentials;
pub mod connector;
pub mod token_cache;
pub mod trusted_hosts;

pub use app_credentials::AppCredentials;
pub use connector::{ConnectorClient, RetryPolicy};
pub use token_cache::{CachedToken, TokenCache};
pub use trusted_hosts::{TrustedHosts, host_key};
