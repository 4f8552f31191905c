//! The federation root object: tenants, listing, search entry points.

use crate::backend::{BackendResult, Session, VirtBackend};
use crate::config::{ConnectConfig, FederationConfig, SearchConfig, TenantConfig};
use crate::connection::TenantConnection;
use crate::error::{Error, Result};
use crate::locator::{self, SearchContext};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::types::{Datacenter, DiscoveryInfo, FindBy, ListInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A searchable federation of virtualization centers.
///
/// Owns exactly one [`TenantConnection`] per configured tenant; every
/// concurrent operation shares those connections. The virtualization SDK is
/// abstracted behind [`VirtBackend`].
pub struct Federation {
    backend: Arc<dyn VirtBackend>,
    tenants: Vec<Arc<TenantConnection>>,
    connect: ConnectConfig,
    search: SearchConfig,
    metrics: Arc<Metrics>,
}

impl Federation {
    /// Build a federation from validated configuration and a backend.
    pub fn new(config: FederationConfig, backend: Arc<dyn VirtBackend>) -> Result<Self> {
        config.validate()?;

        let tenants = config
            .tenants
            .into_iter()
            .map(|cfg| Arc::new(TenantConnection::new(cfg)))
            .collect::<Vec<_>>();

        info!(tenants = tenants.len(), "Federation created");

        Ok(Self {
            backend,
            tenants,
            connect: config.connect,
            search: config.search,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// All tenant connections, in configuration order.
    pub fn tenants(&self) -> &[Arc<TenantConnection>] {
        &self.tenants
    }

    /// Look up one tenant connection by its identifier.
    ///
    /// Used by embedding applications for credential rotation.
    pub fn tenant(&self, tenant_ref: &str) -> Option<&Arc<TenantConnection>> {
        self.tenants
            .iter()
            .find(|conn| conn.tenant_ref() == tenant_ref)
    }

    /// Locate the tenant, VC, and datacenter that own a VM.
    ///
    /// Races lookups across every (tenant, datacenter) pair and resolves to
    /// the first positive match. Unreachable tenants are skipped; their
    /// errors surface only when nothing is found anywhere. `deadline` bounds
    /// the whole call.
    pub async fn find(
        &self,
        key: &str,
        by: FindBy,
        deadline: Option<Duration>,
    ) -> Result<DiscoveryInfo> {
        let ctx = SearchContext {
            backend: self.backend.clone(),
            tenants: self.tenants.clone(),
            connect: self.connect.clone(),
            search: self.search.clone(),
            metrics: self.metrics.clone(),
        };
        locator::find(ctx, key, by, deadline).await
    }

    /// Enumerate every (tenant, VC, datacenter) tuple in the federation.
    ///
    /// A tenant that cannot be reached is logged and skipped; the healthy
    /// rest is still listed, so a fully-down federation yields an empty list
    /// rather than an error. Results are ordered by VC endpoint, then by
    /// datacenter name.
    pub async fn list_all(&self, deadline: Option<Duration>) -> Result<Vec<ListInfo>> {
        debug!("Listing all VC and datacenter pairs");
        match deadline {
            Some(limit) => tokio::time::timeout(limit, self.collect_pairs())
                .await
                .map_err(|_| Error::Timeout)?,
            None => self.collect_pairs().await,
        }
    }

    async fn collect_pairs(&self) -> Result<Vec<ListInfo>> {
        let mut pairs = Vec::new();
        let token = CancellationToken::new();

        for conn in &self.tenants {
            let session = match conn
                .ensure_session(self.backend.as_ref(), &self.connect, &token)
                .await
            {
                Ok(session) => session,
                Err(err) => {
                    error!(
                        tenant = %conn.tenant_ref(),
                        endpoint = %conn.endpoint(),
                        error = %err,
                        "Skipping tenant in listing, connect failed"
                    );
                    self.metrics.connect_failures.inc();
                    continue;
                }
            };

            let datacenters =
                match enumerate_datacenters(self.backend.as_ref(), conn.config(), &session).await {
                    Ok(datacenters) => datacenters,
                    Err(err) => {
                        error!(
                            tenant = %conn.tenant_ref(),
                            endpoint = %conn.endpoint(),
                            error = %err,
                            "Skipping tenant in listing, datacenter enumeration failed"
                        );
                        continue;
                    }
                };

            for datacenter in datacenters {
                pairs.push(ListInfo {
                    tenant_ref: conn.tenant_ref().to_string(),
                    vc_server: conn.endpoint().to_string(),
                    datacenter,
                });
            }
        }

        pairs.sort_by(|a, b| {
            a.vc_server
                .cmp(&b.vc_server)
                .then_with(|| a.datacenter.name().cmp(b.datacenter.name()))
        });

        self.metrics.listings.inc();
        Ok(pairs)
    }

    /// Log out every established tenant session.
    pub async fn shutdown(&self) {
        info!("Federation shutting down, logging out tenant sessions");
        for conn in &self.tenants {
            conn.logout(self.backend.as_ref()).await;
        }
    }

    /// Snapshot of the federation's counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl std::fmt::Debug for Federation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Federation")
            .field("tenants", &self.tenants.len())
            .field("pool_size", &self.search.pool_size)
            .finish()
    }
}

/// Enumerate the datacenters one tenant exposes to the search.
///
/// With no allow-list the endpoint is asked for the full set, and a query
/// failure is the tenant's error. With an allow-list each named datacenter
/// is resolved individually, and a failed resolution skips that entry only:
/// one bad name must not abort enumeration of the rest.
pub(crate) async fn enumerate_datacenters(
    backend: &dyn VirtBackend,
    cfg: &TenantConfig,
    session: &Session,
) -> BackendResult<Vec<Datacenter>> {
    if !cfg.has_allow_list() {
        return backend.list_datacenters(session).await;
    }

    let mut datacenters = Vec::new();
    for name in cfg.datacenter_names() {
        match backend.get_datacenter(session, name).await {
            Ok(datacenter) => datacenters.push(datacenter),
            Err(err) => {
                warn!(
                    tenant = %cfg.tenant_ref,
                    endpoint = %cfg.endpoint,
                    datacenter = %name,
                    error = %err,
                    "Skipping datacenter that failed to resolve"
                );
            }
        }
    }
    Ok(datacenters)
}
