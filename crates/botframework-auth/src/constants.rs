//! Wire constants shared by the inbound and outbound paths

use std::time::Duration;

use jsonwebtoken::Algorithm;

/// Issuer of tokens minted by the production connector service
pub const CHANNEL_TOKEN_ISSUER: &str = "https://api.botframework.com";

/// Discovery document for tokens coming from the connector service
pub const CHANNEL_OPEN_ID_METADATA_URL: &str =
    "https://login.botframework.com/v1/.well-known/openidconfiguration";

/// Discovery document for enterprise channels; `{channelService}` is substituted
pub const ENTERPRISE_CHANNEL_OPEN_ID_METADATA_URL_FORMAT: &str =
    "https://{channelService}.enterprisechannel.botframework.com/v1/.well-known/openidconfiguration";

/// Discovery document for tokens coming from the emulator
pub const EMULATOR_OPEN_ID_METADATA_URL: &str =
    "https://login.microsoftonline.com/common/v2.0/.well-known/openid-configuration";

/// Tenants that issue emulator tokens
pub const EMULATOR_TOKEN_ISSUERS: &[&str] = &[
    "https://sts.windows.net/d6d49420-f39b-4df7-a1dc-d59a935871db/",
    "https://login.microsoftonline.com/d6d49420-f39b-4df7-a1dc-d59a935871db/v2.0",
    "https://sts.windows.net/f8cdef31-a31e-4b4a-93e4-5f571e91255a/",
    "https://login.microsoftonline.com/f8cdef31-a31e-4b4a-93e4-5f571e91255a/v2.0",
    "https://sts.windows.net/72f988bf-86f1-41af-91ab-2d7cd011db47/",
    "https://sts.windows.net/cab8a31a-1906-4287-a0d8-4eef66b95f6e/",
    "https://login.microsoftonline.us/cab8a31a-1906-4287-a0d8-4eef66b95f6e/v2.0",
];

/// Token signing algorithms accepted from either issuer family
pub const ALLOWED_SIGNING_ALGORITHMS: &[Algorithm] =
    &[Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// Clock skew tolerated on `exp`/`nbf`
pub const CLOCK_SKEW: Duration = Duration::from_secs(5 * 60);

/// How long a fetched key set is trusted before it is refreshed
pub const METADATA_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 24 * 60 * 60);

/// Minimum time between key set refresh attempts after one fails
pub const METADATA_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Prefix of the OAuth token endpoint used for the client-credentials flow
pub const OAUTH_LOGIN_URL_PREFIX: &str = "https://login.microsoftonline.com/";

/// Path of the OAuth token endpoint below the tenant
pub const OAUTH_TOKEN_ENDPOINT_PATH: &str = "/oauth2/v2.0/token";

/// Tenant used when none is configured
pub const DEFAULT_CHANNEL_AUTH_TENANT: &str = "botframework.com";

/// Scope requested for outbound connector calls
pub const CHANNEL_OAUTH_SCOPE: &str = "https://api.botframework.com/.default";

/// A fresh access token is considered expired this long before its real expiry
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Trust granted to a service URL when no expiration is given
pub const DEFAULT_TRUST_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Grace period past a trusted host's expiration
pub const TRUST_GRACE_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Hosts trusted for the life of the process
pub const SEEDED_TRUSTED_HOSTS: &[&str] = &[
    "state.botframework.com",
    "api.botframework.com",
    "token.botframework.com",
    "state.botframework.azure.us",
    "api.botframework.azure.us",
    "token.botframework.azure.us",
    "smba.trafficmanager.net",
];

/// Claim and header names
pub mod claims {
    /// Authorized party (emulator v2.0 app id)
    pub const AUTHORIZED_PARTY: &str = "azp";
    /// Audience
    pub const AUDIENCE: &str = "aud";
    /// Issuer
    pub const ISSUER: &str = "iss";
    /// Token version
    pub const VERSION: &str = "ver";
    /// App id (emulator v1.0)
    pub const APP_ID: &str = "appid";
    /// Service URL the connector bound the token to
    pub const SERVICE_URL: &str = "serviceurl";
}
