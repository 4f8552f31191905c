//! Testing utilities for the federation locator.
//!
//! [`SimFederation`] bundles a [`SimBackend`](crate::backend::sim::SimBackend)
//! with a [`Federation`](crate::federation::Federation) built on top of it,
//! with fast retry timings suitable for tests. The integration test modules
//! in this directory exercise the search and listing paths end-to-end against
//! the simulated backend.


use crate::backend::sim::SimBackend;
use crate::config::{ConnectConfig, Credentials, FederationConfig, SearchConfig, TenantConfig};
use crate::federation::Federation;
use crate::types::{PowerState, VirtualMachine};
use std::sync::Arc;
use std::time::Duration;

/// A simulated federation plus the locator built over it.
pub struct SimFederation {
    /// The in-memory backend, kept for fault injection and call counting.
    pub backend: Arc<SimBackend>,
    /// The federation under test.
    pub federation: Federation,
}

impl SimFederation {
    /// Build a federation of `tenant_count` tenants named `t1..tn` against
    /// endpoints `vc-1..vc-n`, each endpoint registered but empty.
    pub fn new(tenant_count: usize) -> Self {
        Self::with_config(tenant_count, fast_search_config())
    }

    /// Same as [`SimFederation::new`] with a custom search config.
    pub fn with_config(tenant_count: usize, search: SearchConfig) -> Self {
        let backend = Arc::new(SimBackend::new());

        let mut config = FederationConfig::new()
            .with_connect(fast_connect_config())
            .with_search(search);
        for i in 1..=tenant_count {
            let endpoint = format!("vc-{i}");
            backend.add_center(&endpoint);
            config = config.with_tenant(tenant(&format!("t{i}"), &endpoint));
        }

        let federation =
            Federation::new(config, backend.clone()).expect("sim federation config is valid");
        Self {
            backend,
            federation,
        }
    }
}

/// Connection policy with test-friendly timings.
pub fn fast_connect_config() -> ConnectConfig {
    ConnectConfig {
        attempts: 3,
        retry_delay: Duration::from_millis(10),
    }
}

/// Search policy small enough to exercise queue contention.
pub fn fast_search_config() -> SearchConfig {
    SearchConfig {
        pool_size: 4,
        queue_capacity: 8,
    }
}

/// A tenant config with fixed test credentials.
pub fn tenant(tenant_ref: &str, endpoint: &str) -> TenantConfig {
    TenantConfig::new(tenant_ref, endpoint, Credentials::new("admin", "secret"))
}

/// A powered-on VM snapshot.
pub fn vm(uuid: &str, hostname: &str, ip: &str) -> VirtualMachine {
    VirtualMachine {
        uuid: uuid.into(),
        hostname: hostname.into(),
        ip_addresses: vec![ip.into()],
        power_state: PowerState::Started,
    }
}
