//! Credential provider contract
//!
//! Implemented by the hosting application and consumed by the
//! authenticators to decide which app ids a token may be addressed to.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::config::{AuthConfig, DeploymentEnvironment};

/// Source of truth for the app ids this service answers for
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Whether `app_id` belongs to this service
    async fn is_valid_app_id(&self, app_id: &str) -> bool;

    /// Secret for `app_id`, or `None` if the id is unknown
    async fn get_app_password(&self, app_id: &str) -> Option<SecretString>;

    /// Whether requests without an authorization header are accepted
    ///
    /// Only ever true in explicitly flagged non-production environments.
    async fn is_authentication_disabled(&self) -> bool;
}

/// Credential provider for a single app id/secret pair
#[derive(Debug, Clone)]
pub struct SimpleCredentialProvider {
    app_id: String,
    app_password: SecretString,
    environment: DeploymentEnvironment,
}

impl SimpleCredentialProvider {
    /// Create a provider for a production deployment
    pub fn new(app_id: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_password: SecretString::new(app_password.into()),
            environment: DeploymentEnvironment::Production,
        }
    }

    /// Set the deployment environment
    pub fn with_environment(mut self, environment: DeploymentEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// App id this provider answers for
    pub fn app_id(&self) -> &str {
        &self.app_id
    }
}

impl From<&AuthConfig> for SimpleCredentialProvider {
    fn from(config: &AuthConfig) -> Self {
        Self {
            app_id: config.app_id.clone(),
            app_password: config.app_password.clone(),
            environment: config.environment,
        }
    }
}

#[async_trait]
impl CredentialProvider for SimpleCredentialProvider {
    async fn is_valid_app_id(&self, app_id: &str) -> bool {
        self.app_id == app_id
    }

    async fn get_app_password(&self, app_id: &str) -> Option<SecretString> {
        (self.app_id == app_id).then(|| self.app_password.clone())
    }

    async fn is_authentication_disabled(&self) -> bool {
        self.environment.allows_anonymous()
    }
}
