//! Allow-list of hosts outbound credentials may be sent to

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use tracing::debug;
use url::Url;

use crate::constants::{DEFAULT_TRUST_DURATION, SEEDED_TRUSTED_HOSTS, TRUST_GRACE_PERIOD};

/// Hosts trusted to receive this service's bearer token
///
/// Seeded with the platform's own service hosts (never expiring) and grown
/// from successfully authenticated inbound requests. Entries are only
/// checked lazily; nothing is ever removed.
#[derive(Debug)]
pub struct TrustedHosts {
    hosts: DashMap<String, DateTime<Utc>>,
}

impl Default for TrustedHosts {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TrustedHosts {
    /// Allow-list containing the platform's own service hosts
    pub fn with_defaults() -> Self {
        let hosts = Self::empty();
        for host in SEEDED_TRUSTED_HOSTS {
            hosts.hosts.insert((*host).to_string(), DateTime::<Utc>::MAX_UTC);
        }
        hosts
    }

    /// Allow-list with no entries
    pub fn empty() -> Self {
        Self {
            hosts: DashMap::new(),
        }
    }

    /// Trust the host of `service_url` until `expiration` (default: one day)
    ///
    /// Re-trusting a host replaces its expiration. URLs that do not parse
    /// or have no host are ignored.
    pub fn trust_service_url(&self, service_url: &str, expiration: Option<DateTime<Utc>>) {
        let Some(host) = host_key(service_url) else {
            debug!(service_url = %service_url, "Ignoring service URL without host");
            return;
        };

        let expiration = expiration.unwrap_or_else(|| Utc::now() + chrono_duration(DEFAULT_TRUST_DURATION));
        debug!(host = %host, expiration = %expiration, "Trusting service host");
        self.hosts.insert(host, expiration);
    }

    /// Whether the host of `service_url` is currently trusted
    pub fn is_trusted_service_url(&self, service_url: &str) -> bool {
        host_key(service_url).is_some_and(|host| self.is_trusted_host(&host))
    }

    /// Whether `host` (with `:port` when non-default) is currently trusted
    pub fn is_trusted_host(&self, host: &str) -> bool {
        let cutoff = Utc::now() - chrono_duration(TRUST_GRACE_PERIOD);
        self.hosts
            .get(host)
            .is_some_and(|expiration| *expiration > cutoff)
    }

    /// Expiration recorded for `host`
    pub fn expiration(&self, host: &str) -> Option<DateTime<Utc>> {
        self.hosts.get(host).map(|e| *e)
    }

    /// Number of hosts on the list, expired or not
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether the list has no entries
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Allow-list key for a URL: host, plus `:port` when the port is not the scheme default
pub fn host_key(service_url: &str) -> Option<String> {
    let url = Url::parse(service_url).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn chrono_duration(duration: std::time::Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX)
}
