//! Configuration types for the federation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Login credentials for one virtualization center.
///
/// Resolution of secret references is owned by the embedding application;
/// this crate only consumes the resolved values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Create credentials from username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Static configuration for one tenant (one VC registration).
///
/// Immutable after load; credential rotation goes through
/// [`TenantConnection::update_credentials`](crate::connection::TenantConnection::update_credentials),
/// not through this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Stable identifier for this tenant within the federation.
    pub tenant_ref: String,

    /// Address of the VC endpoint this tenant connects to.
    pub endpoint: String,

    /// Optional comma-separated datacenter allow-list.
    ///
    /// Empty means "search every datacenter the endpoint exposes".
    pub datacenters: String,

    /// Login credentials for the endpoint.
    pub credentials: Credentials,
}

impl TenantConfig {
    /// Create a tenant config with no datacenter allow-list.
    pub fn new(
        tenant_ref: impl Into<String>,
        endpoint: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            tenant_ref: tenant_ref.into(),
            endpoint: endpoint.into(),
            datacenters: String::new(),
            credentials,
        }
    }

    /// Restrict this tenant to a comma-separated list of datacenter names.
    pub fn with_datacenters(mut self, list: impl Into<String>) -> Self {
        self.datacenters = list.into();
        self
    }

    /// True if this tenant has a datacenter allow-list.
    pub fn has_allow_list(&self) -> bool {
        !self.datacenters.trim().is_empty()
    }

    /// Parsed allow-list entries: split on commas, trimmed, empties skipped.
    pub fn datacenter_names(&self) -> Vec<&str> {
        self.datacenters
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// Connection-establishment policy: bounded attempts with a fixed delay.
///
/// No backoff, no jitter. The delay sleeps only the producer side of a
/// search, never the lookup workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// Maximum login attempts per establishment.
    pub attempts: usize,

    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Search fan-out policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of concurrent lookup workers.
    pub pool_size: usize,

    /// Capacity of the pending (tenant, datacenter) work queue.
    pub queue_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        // 8 workers, queue holds 10 units per worker.
        Self {
            pool_size: 8,
            queue_capacity: 80,
        }
    }
}

/// Top-level configuration for a [`Federation`](crate::federation::Federation).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Every configured tenant, in search order.
    pub tenants: Vec<TenantConfig>,

    /// Connection-establishment policy.
    pub connect: ConnectConfig,

    /// Search fan-out policy.
    pub search: SearchConfig,
}

impl FederationConfig {
    /// Create an empty federation config with default policies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tenant to the federation.
    pub fn with_tenant(mut self, tenant: TenantConfig) -> Self {
        self.tenants.push(tenant);
        self
    }

    /// Set the connection-establishment policy.
    pub fn with_connect(mut self, connect: ConnectConfig) -> Self {
        self.connect = connect;
        self
    }

    /// Set the search fan-out policy.
    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Validate the policy knobs.
    pub fn validate(&self) -> Result<()> {
        if self.connect.attempts == 0 {
            return Err(Error::Config("connect.attempts must be at least 1".into()));
        }
        if self.search.pool_size == 0 {
            return Err(Error::Config("search.pool_size must be at least 1".into()));
        }
        if self.search.queue_capacity == 0 {
            return Err(Error::Config(
                "search.queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(name: &str) -> TenantConfig {
        TenantConfig::new(name, format!("{name}.example.com"), Credentials::new("admin", "secret"))
    }

    #[test]
    fn allow_list_parsing() {
        let cfg = tenant("t1").with_datacenters(" dc-east , ,dc-west,");
        assert!(cfg.has_allow_list());
        assert_eq!(cfg.datacenter_names(), vec!["dc-east", "dc-west"]);
    }

    #[test]
    fn empty_allow_list_means_all() {
        let cfg = tenant("t1");
        assert!(!cfg.has_allow_list());
        assert!(cfg.datacenter_names().is_empty());

        let blank = tenant("t2").with_datacenters("   ");
        assert!(!blank.has_allow_list());
    }

    #[test]
    fn defaults() {
        let cfg = FederationConfig::new();
        assert_eq!(cfg.connect.attempts, 3);
        assert_eq!(cfg.connect.retry_delay, Duration::from_secs(1));
        assert_eq!(cfg.search.pool_size, 8);
        assert_eq!(cfg.search.queue_capacity, 80);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_knobs() {
        let mut cfg = FederationConfig::new();
        cfg.search.pool_size = 0;
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let mut cfg = FederationConfig::new();
        cfg.connect.attempts = 0;
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let mut cfg = FederationConfig::new();
        cfg.search.queue_capacity = 0;
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn builder_chains() {
        let cfg = FederationConfig::new()
            .with_tenant(tenant("t1"))
            .with_tenant(tenant("t2").with_datacenters("dc-1"))
            .with_connect(ConnectConfig {
                attempts: 5,
                retry_delay: Duration::from_millis(10),
            })
            .with_search(SearchConfig {
                pool_size: 4,
                queue_capacity: 40,
            });

        assert_eq!(cfg.tenants.len(), 2);
        assert_eq!(cfg.connect.attempts, 5);
        assert_eq!(cfg.search.pool_size, 4);
    }
}
