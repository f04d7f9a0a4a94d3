//! Authentication Configuration Types
//!
//! The service's own app id and secret are supplied once at process start
//! and never change for the lifetime of the process.

use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CHANNEL_OAUTH_SCOPE, CHANNEL_OPEN_ID_METADATA_URL, DEFAULT_CHANNEL_AUTH_TENANT,
    EMULATOR_OPEN_ID_METADATA_URL, ENTERPRISE_CHANNEL_OPEN_ID_METADATA_URL_FORMAT,
    OAUTH_LOGIN_URL_PREFIX, OAUTH_TOKEN_ENDPOINT_PATH,
};
use crate::error::{AuthError, Result};

/// Deployment environment of the hosting service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnvironment {
    /// Real traffic; authentication always enforced
    #[default]
    Production,
    /// Developer machine
    Development,
    /// Automated test runs
    Test,
    /// Local tunnel / emulator-only setups
    Localhost,
}

impl DeploymentEnvironment {
    /// Whether inbound authentication may be skipped when no header is sent
    pub fn allows_anonymous(&self) -> bool {
        !matches!(self, Self::Production)
    }
}

impl FromStr for DeploymentEnvironment {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "localhost" => Ok(Self::Localhost),
            other => Err(AuthError::Configuration(format!(
                "Unknown deployment environment '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DeploymentEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Production => "production",
            Self::Development => "development",
            Self::Test => "test",
            Self::Localhost => "localhost",
        };
        f.write_str(name)
    }
}

/// Authentication configuration for one bot identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Microsoft app id of this service
    pub app_id: String,
    /// App secret used for the client-credentials flow
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub app_password: SecretString,
    /// Tenant that issues outbound tokens
    #[serde(default)]
    pub channel_auth_tenant: Option<String>,
    /// Explicit discovery URL for channel tokens
    #[serde(default)]
    pub open_id_metadata_url: Option<String>,
    /// Enterprise channel service name
    #[serde(default)]
    pub channel_service: Option<String>,
    /// Explicit discovery URL for emulator tokens
    #[serde(default)]
    pub emulator_open_id_metadata_url: Option<String>,
    /// Explicit OAuth token endpoint
    #[serde(default)]
    pub oauth_endpoint: Option<String>,
    /// OAuth scope requested for outbound calls
    #[serde(default = "default_oauth_scope")]
    pub oauth_scope: String,
    /// Deployment environment
    #[serde(default)]
    pub environment: DeploymentEnvironment,
}

fn default_oauth_scope() -> String {
    CHANNEL_OAUTH_SCOPE.to_string()
}

fn serialize_secret<S>(secret: &SecretString, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(SecretString::new(s))
}

impl AuthConfig {
    /// Create a config with production defaults
    pub fn new(app_id: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_password: SecretString::new(app_password.into()),
            channel_auth_tenant: None,
            open_id_metadata_url: None,
            channel_service: None,
            emulator_open_id_metadata_url: None,
            oauth_endpoint: None,
            oauth_scope: default_oauth_scope(),
            environment: DeploymentEnvironment::Production,
        }
    }

    /// Load configuration from environment variables
    ///
    /// Required:
    /// - `MSAPP_ID`: app id of this service
    ///
    /// Optional:
    /// - `MSAPP_SECRET`: app secret (default: empty)
    /// - `MSAPP_CHANNEL_AUTH_TENANT`: tenant for outbound tokens
    /// - `MSAPP_OAUTH_SCOPE`: scope for outbound tokens
    /// - `BOT_OPEN_ID_METADATA`: channel discovery URL override
    /// - `CHANNEL_SERVICE`: enterprise channel service name
    /// - `BOT_ENVIRONMENT`: `production` (default), `development`, `test`, `localhost`
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if `MSAPP_ID` is missing or
    /// `BOT_ENVIRONMENT` is not recognized.
    pub fn from_env() -> Result<Self> {
        let app_id = std::env::var("MSAPP_ID")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                AuthError::Configuration("MSAPP_ID environment variable not set".to_string())
            })?;
        let app_password = std::env::var("MSAPP_SECRET").unwrap_or_default();

        let mut config = Self::new(app_id, app_password);
        config.channel_auth_tenant = non_empty_var("MSAPP_CHANNEL_AUTH_TENANT");
        config.open_id_metadata_url = non_empty_var("BOT_OPEN_ID_METADATA");
        config.channel_service = non_empty_var("CHANNEL_SERVICE");
        if let Some(scope) = non_empty_var("MSAPP_OAUTH_SCOPE") {
            config.oauth_scope = scope;
        }
        if let Some(env) = non_empty_var("BOT_ENVIRONMENT") {
            config.environment = env.parse()?;
        }

        Ok(config)
    }

    /// Set the tenant used for outbound tokens
    pub fn with_channel_auth_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.channel_auth_tenant = Some(tenant.into());
        self
    }

    /// Override the channel discovery URL
    pub fn with_open_id_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.open_id_metadata_url = Some(url.into());
        self
    }

    /// Use an enterprise channel service
    pub fn with_channel_service(mut self, service: impl Into<String>) -> Self {
        self.channel_service = Some(service.into());
        self
    }

    /// Override the emulator discovery URL
    pub fn with_emulator_open_id_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.emulator_open_id_metadata_url = Some(url.into());
        self
    }

    /// Override the OAuth token endpoint
    pub fn with_oauth_endpoint(mut self, url: impl Into<String>) -> Self {
        self.oauth_endpoint = Some(url.into());
        self
    }

    /// Set the deployment environment
    pub fn with_environment(mut self, environment: DeploymentEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Discovery URL used to validate channel tokens
    pub fn channel_metadata_url(&self) -> String {
        if let Some(url) = &self.open_id_metadata_url {
            return url.clone();
        }
        match &self.channel_service {
            Some(service) => ENTERPRISE_CHANNEL_OPEN_ID_METADATA_URL_FORMAT
                .replace("{channelService}", service),
            None => CHANNEL_OPEN_ID_METADATA_URL.to_string(),
        }
    }

    /// Discovery URL used to validate emulator tokens
    pub fn emulator_metadata_url(&self) -> String {
        self.emulator_open_id_metadata_url
            .clone()
            .unwrap_or_else(|| EMULATOR_OPEN_ID_METADATA_URL.to_string())
    }

    /// OAuth token endpoint for the client-credentials flow
    pub fn oauth_endpoint(&self) -> String {
        if let Some(url) = &self.oauth_endpoint {
            return url.clone();
        }
        let tenant = self
            .channel_auth_tenant
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CHANNEL_AUTH_TENANT);
        format!("{OAUTH_LOGIN_URL_PREFIX}{tenant}{OAUTH_TOKEN_ENDPOINT_PATH}")
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
