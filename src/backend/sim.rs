//! In-memory federation backend for tests and demos.
//!
//! `SimBackend` models a set of VC endpoints with datacenters and VMs, plus
//! the failure modes the locator has to tolerate: unreachable endpoints,
//! endpoints that reject the first N logins, datacenter names that fail to
//! resolve, and datacenters whose lookups error. Atomic call counters let
//! tests assert exact backend traffic (e.g. zero calls for an empty key).

use super::{BackendResult, Session, VirtBackend};
use crate::config::TenantConfig;
use crate::error::BackendError;
use crate::types::{Datacenter, VirtualMachine};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Call counters, one per trait method group.
#[derive(Debug, Default)]
pub struct SimCounters {
    pub connect_calls: AtomicU64,
    pub logout_calls: AtomicU64,
    pub list_calls: AtomicU64,
    pub get_datacenter_calls: AtomicU64,
    pub lookup_calls: AtomicU64,
}

impl SimCounters {
    /// Total backend calls of any kind.
    pub fn total(&self) -> u64 {
        self.connect_calls.load(Ordering::Relaxed)
            + self.logout_calls.load(Ordering::Relaxed)
            + self.list_calls.load(Ordering::Relaxed)
            + self.get_datacenter_calls.load(Ordering::Relaxed)
            + self.lookup_calls.load(Ordering::Relaxed)
    }
}

/// One simulated VC endpoint.
#[derive(Debug, Default)]
struct SimCenter {
    unreachable: bool,
    /// Reject this many logins before accepting one.
    connect_failures_remaining: usize,
    /// Datacenter name → VM inventory. BTreeMap keeps listings stable.
    datacenters: BTreeMap<String, Vec<VirtualMachine>>,
    /// Names whose `get_datacenter` resolution fails.
    failing_datacenters: HashSet<String>,
    /// Datacenters whose VM lookups error instead of answering.
    failing_lookups: HashSet<String>,
}

/// In-memory [`VirtBackend`] implementation.
#[derive(Debug, Default)]
pub struct SimBackend {
    centers: Mutex<HashMap<String, SimCenter>>,
    /// Injected per-call latency, applied to every remote operation.
    latency: Mutex<Option<Duration>>,
    counters: SimCounters,
}

impl SimBackend {
    /// Create an empty simulated federation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint (idempotent).
    pub fn add_center(&self, endpoint: impl Into<String>) {
        self.centers.lock().entry(endpoint.into()).or_default();
    }

    /// Add an empty datacenter to an endpoint.
    pub fn add_datacenter(&self, endpoint: &str, name: impl Into<String>) {
        let mut centers = self.centers.lock();
        centers
            .entry(endpoint.to_string())
            .or_default()
            .datacenters
            .entry(name.into())
            .or_default();
    }

    /// Add a VM to a datacenter, creating both as needed.
    pub fn add_vm(&self, endpoint: &str, datacenter: &str, vm: VirtualMachine) {
        let mut centers = self.centers.lock();
        centers
            .entry(endpoint.to_string())
            .or_default()
            .datacenters
            .entry(datacenter.to_string())
            .or_default()
            .push(vm);
    }

    /// Mark an endpoint unreachable (every call fails) or reachable again.
    pub fn set_unreachable(&self, endpoint: &str, unreachable: bool) {
        if let Some(center) = self.centers.lock().get_mut(endpoint) {
            center.unreachable = unreachable;
        }
    }

    /// Reject the next `n` logins to this endpoint, then accept.
    pub fn fail_next_connects(&self, endpoint: &str, n: usize) {
        if let Some(center) = self.centers.lock().get_mut(endpoint) {
            center.connect_failures_remaining = n;
        }
    }

    /// Make `get_datacenter` fail for this name on this endpoint.
    pub fn fail_datacenter(&self, endpoint: &str, name: impl Into<String>) {
        if let Some(center) = self.centers.lock().get_mut(endpoint) {
            center.failing_datacenters.insert(name.into());
        }
    }

    /// Make VM lookups error inside this datacenter.
    pub fn fail_lookups_in(&self, endpoint: &str, datacenter: impl Into<String>) {
        if let Some(center) = self.centers.lock().get_mut(endpoint) {
            center.failing_lookups.insert(datacenter.into());
        }
    }

    /// Apply a fixed latency to every simulated remote call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Backend call counters.
    pub fn counters(&self) -> &SimCounters {
        &self.counters
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn unreachable_err(endpoint: &str) -> BackendError {
        BackendError::ConnectFailed {
            endpoint: endpoint.to_string(),
            reason: "endpoint unreachable".into(),
        }
    }
}

#[async_trait]
impl VirtBackend for SimBackend {
    async fn connect(&self, cfg: &TenantConfig) -> BackendResult<Session> {
        self.counters.connect_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;

        let mut centers = self.centers.lock();
        let center = centers
            .get_mut(&cfg.endpoint)
            .ok_or_else(|| Self::unreachable_err(&cfg.endpoint))?;

        if center.unreachable {
            return Err(Self::unreachable_err(&cfg.endpoint));
        }
        if center.connect_failures_remaining > 0 {
            center.connect_failures_remaining -= 1;
            return Err(BackendError::ConnectFailed {
                endpoint: cfg.endpoint.clone(),
                reason: "login rejected".into(),
            });
        }

        Ok(Session::new(&cfg.endpoint))
    }

    async fn logout(&self, _session: &Session) -> BackendResult<()> {
        self.counters.logout_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn list_datacenters(&self, session: &Session) -> BackendResult<Vec<Datacenter>> {
        self.counters.list_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;

        let centers = self.centers.lock();
        let center = centers
            .get(session.endpoint())
            .ok_or_else(|| Self::unreachable_err(session.endpoint()))?;
        if center.unreachable {
            return Err(BackendError::QueryFailed("endpoint unreachable".into()));
        }

        Ok(center
            .datacenters
            .keys()
            .map(|name| Datacenter::new(name.as_str()))
            .collect())
    }

    async fn get_datacenter(&self, session: &Session, name: &str) -> BackendResult<Datacenter> {
        self.counters
            .get_datacenter_calls
            .fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;

        let centers = self.centers.lock();
        let center = centers
            .get(session.endpoint())
            .ok_or_else(|| Self::unreachable_err(session.endpoint()))?;

        if center.failing_datacenters.contains(name) {
            return Err(BackendError::QueryFailed(format!(
                "datacenter {name} resolution failed"
            )));
        }
        if center.datacenters.contains_key(name) {
            Ok(Datacenter::new(name))
        } else {
            Err(BackendError::NotFound)
        }
    }

    async fn find_vm_by_uuid(
        &self,
        session: &Session,
        datacenter: &Datacenter,
        uuid: &str,
    ) -> BackendResult<VirtualMachine> {
        self.lookup(session, datacenter, |vm| {
            vm.uuid.trim().to_lowercase() == uuid
        })
        .await
    }

    async fn find_vm_by_ip(
        &self,
        session: &Session,
        datacenter: &Datacenter,
        ip: &str,
    ) -> BackendResult<VirtualMachine> {
        self.lookup(session, datacenter, |vm| {
            vm.ip_addresses.iter().any(|addr| addr == ip)
        })
        .await
    }

    async fn find_vm_by_dns_name(
        &self,
        session: &Session,
        datacenter: &Datacenter,
        name: &str,
    ) -> BackendResult<VirtualMachine> {
        self.lookup(session, datacenter, |vm| vm.hostname == name).await
    }
}

impl SimBackend {
    async fn lookup(
        &self,
        session: &Session,
        datacenter: &Datacenter,
        matches: impl Fn(&VirtualMachine) -> bool,
    ) -> BackendResult<VirtualMachine> {
        self.counters.lookup_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;

        let centers = self.centers.lock();
        let center = centers
            .get(session.endpoint())
            .ok_or_else(|| Self::unreachable_err(session.endpoint()))?;

        if center.failing_lookups.contains(datacenter.name()) {
            return Err(BackendError::QueryFailed(format!(
                "lookup failed in {}",
                datacenter.name()
            )));
        }

        center
            .datacenters
            .get(datacenter.name())
            .ok_or(BackendError::NotFound)?
            .iter()
            .find(|vm| matches(vm))
            .cloned()
            .ok_or(BackendError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::types::PowerState;

    fn vm(uuid: &str, hostname: &str, ip: &str) -> VirtualMachine {
        VirtualMachine {
            uuid: uuid.into(),
            hostname: hostname.into(),
            ip_addresses: vec![ip.into()],
            power_state: PowerState::Started,
        }
    }

    fn tenant(endpoint: &str) -> TenantConfig {
        TenantConfig::new("t1", endpoint, Credentials::new("admin", "secret"))
    }

    #[tokio::test]
    async fn connect_then_lookup() {
        let backend = SimBackend::new();
        backend.add_vm("vc-1", "dc-1", vm("ABC-1", "host-1", "10.0.0.1"));

        let session = backend.connect(&tenant("vc-1")).await.unwrap();
        let dcs = backend.list_datacenters(&session).await.unwrap();
        assert_eq!(dcs, vec![Datacenter::new("dc-1")]);

        let found = backend
            .find_vm_by_uuid(&session, &dcs[0], "abc-1")
            .await
            .unwrap();
        assert_eq!(found.hostname, "host-1");

        let missing = backend
            .find_vm_by_ip(&session, &dcs[0], "10.9.9.9")
            .await
            .unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn unreachable_endpoint_rejects_connect() {
        let backend = SimBackend::new();
        backend.add_center("vc-1");
        backend.set_unreachable("vc-1", true);

        let err = backend.connect(&tenant("vc-1")).await.unwrap_err();
        assert!(matches!(err, BackendError::ConnectFailed { .. }));
        assert_eq!(backend.counters().connect_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn connect_failures_drain() {
        let backend = SimBackend::new();
        backend.add_center("vc-1");
        backend.fail_next_connects("vc-1", 2);

        assert!(backend.connect(&tenant("vc-1")).await.is_err());
        assert!(backend.connect(&tenant("vc-1")).await.is_err());
        assert!(backend.connect(&tenant("vc-1")).await.is_ok());
    }

    #[tokio::test]
    async fn failing_datacenter_resolution() {
        let backend = SimBackend::new();
        backend.add_datacenter("vc-1", "dc-good");
        backend.fail_datacenter("vc-1", "dc-bad");

        let session = backend.connect(&tenant("vc-1")).await.unwrap();
        assert!(backend.get_datacenter(&session, "dc-good").await.is_ok());
        assert!(matches!(
            backend.get_datacenter(&session, "dc-bad").await,
            Err(BackendError::QueryFailed(_))
        ));
        assert!(backend
            .get_datacenter(&session, "dc-absent")
            .await
            .unwrap_err()
            .is_not_found());
    }
}
