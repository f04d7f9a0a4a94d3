//! Signed, retrying calls to a connector service URL
//!
//! Every attempt is signed through [`AppCredentials`], so the bearer token
//! is only attached when the service URL is on the trusted host list.
//!
//! Response handling:
//!
//! - `403` fails immediately with [`AuthError::Forbidden`]
//! - `202` with an empty body succeeds as `{}`
//! - `429`, `5xx` and transport errors are retried with exponential backoff
//! - any other error status fails with [`AuthError::ConnectorStatus`]

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::app_credentials::AppCredentials;
use crate::error::{AuthError, Result};

/// Backoff policy for connector calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub min_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 - 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (0-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.min_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);

        let jitter = 1.0 + (fastrand::f64() - 0.5) * 2.0 * self.jitter_factor;
        let jittered_delay_ms = (delay_ms * jitter).max(self.min_delay.as_millis() as f64);

        let capped_delay_ms = jittered_delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_delay_ms as u64)
    }
}

/// Client for one connector service URL
#[derive(Debug, Clone)]
pub struct ConnectorClient {
    service_url: String,
    credentials: Arc<AppCredentials>,
    http_client: reqwest::Client,
    retry_policy: RetryPolicy,
}

impl ConnectorClient {
    /// Client for `service_url` (trailing slashes are dropped)
    pub fn new(service_url: impl Into<String>, credentials: Arc<AppCredentials>) -> Self {
        let service_url = service_url.into().trim_end_matches('/').to_string();
        Self {
            service_url,
            credentials,
            http_client: reqwest::Client::new(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Use a custom retry policy
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Use a custom HTTP client
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Base service URL
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// `GET {service_url}{path}`
    ///
    /// # Errors
    ///
    /// See [`ConnectorClient::send`].
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, path, None).await
    }

    /// `POST {service_url}{path}` with a JSON body
    ///
    /// # Errors
    ///
    /// See [`ConnectorClient::send`].
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// `PUT {service_url}{path}` with a JSON body
    ///
    /// # Errors
    ///
    /// See [`ConnectorClient::send`].
    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(Method::PUT, path, Some(body)).await
    }

    /// `DELETE {service_url}{path}`
    ///
    /// # Errors
    ///
    /// See [`ConnectorClient::send`].
    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.send(Method::DELETE, path, None).await
    }

    /// Send a signed request, retrying transient failures
    ///
    /// An empty success body yields `Value::Null`, except `202` which yields `{}`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Forbidden`] on `403`, without retrying
    /// - [`AuthError::ConnectorStatus`] on a non-retryable error status, or
    ///   the last retryable one once attempts are exhausted
    /// - [`AuthError::Http`] on transport failure after the last attempt
    /// - [`AuthError::InvalidResponse`] if a success body is not JSON
    /// - token acquisition errors from [`AppCredentials::get_token`]
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.service_url, path);
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let error = match self.attempt(&method, &url, body).await {
                Ok(value) => return Ok(value),
                Err(err) if !is_retryable(&err) => return Err(err),
                Err(err) => err,
            };

            attempt += 1;
            if attempt >= max_attempts {
                warn!(url = %url, attempts = attempt, error = %error, "Connector call failed");
                return Err(error);
            }

            let delay = self.retry_policy.calculate_delay(attempt - 1);
            warn!(
                url = %url,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Connector call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, method: &Method, url: &str, body: Option<&Value>) -> Result<Value> {
        let mut builder = self.http_client.request(method.clone(), url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let mut request = builder.build()?;
        self.credentials.sign_request(url, &mut request).await?;

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        debug!(url = %url, status = %status, "Connector responded");

        if status == StatusCode::FORBIDDEN {
            return Err(AuthError::Forbidden);
        }
        if !status.is_success() {
            return Err(AuthError::ConnectorStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(if status == StatusCode::ACCEPTED {
                Value::Object(serde_json::Map::new())
            } else {
                Value::Null
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }
}

fn is_retryable(error: &AuthError) -> bool {
    match error {
        AuthError::Http(_) => true,
        AuthError::ConnectorStatus { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
        }
        _ => false,
    }
}
