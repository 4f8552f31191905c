//! The federation search engine.
//!
//! A single producer walks every configured tenant, establishes its session,
//! enumerates its datacenters, and feeds (tenant, datacenter) units into a
//! bounded queue. A fixed pool of workers drains the queue, each unit costing
//! exactly one remote lookup. The first worker with a positive match fills a
//! write-once result cell and cancels the shared token; everyone else winds
//! down at their next suspension point. Per-datacenter absence is not a
//! failure; any other error is retained last-write-wins as the fallback
//! explanation when nothing is found.

use crate::backend::{BackendResult, Session, VirtBackend};
use crate::config::{ConnectConfig, SearchConfig};
use crate::connection::TenantConnection;
use crate::error::{Error, Result};
use crate::federation::enumerate_datacenters;
use crate::metrics::Metrics;
use crate::types::{Datacenter, DiscoveryInfo, FindBy, VirtualMachine};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Everything one `find` call needs, cloned out of the federation.
pub(crate) struct SearchContext {
    pub backend: Arc<dyn VirtBackend>,
    pub tenants: Vec<Arc<TenantConnection>>,
    pub connect: ConnectConfig,
    pub search: SearchConfig,
    pub metrics: Arc<Metrics>,
}

/// One pending unit of search work: a single datacenter within a tenant.
///
/// The queue hands each unit out exactly once, so no two workers ever query
/// the same (tenant, datacenter) pair.
struct SearchUnit {
    tenant_ref: String,
    vc_server: String,
    session: Session,
    datacenter: Datacenter,
}

/// Write-once slot for the winning discovery.
///
/// Multiple workers may race to a positive match; the first write wins and
/// later writes are no-ops, enforced under the same lock.
#[derive(Default)]
struct ResultCell {
    slot: Mutex<Option<DiscoveryInfo>>,
}

impl ResultCell {
    /// Install `info` if the cell is empty. Returns true for the winner.
    fn try_set(&self, info: DiscoveryInfo) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            *slot = Some(info);
            true
        } else {
            false
        }
    }

    fn take(&self) -> Option<DiscoveryInfo> {
        self.slot.lock().take()
    }
}

/// Last recorded non-fatal failure; overwrites, never aggregates.
#[derive(Default)]
struct FailureSlot {
    slot: Mutex<Option<Error>>,
}

impl FailureSlot {
    fn record(&self, err: Error) {
        *self.slot.lock() = Some(err);
    }

    fn take(&self) -> Option<Error> {
        self.slot.lock().take()
    }
}

/// Locate a VM across the federation.
///
/// Resolution precedence: found result, then the last recorded failure, then
/// [`Error::NotFound`]. A `deadline` bounds the whole call; on expiry the
/// in-flight search is cancelled and [`Error::Timeout`] is returned.
pub(crate) async fn find(
    ctx: SearchContext,
    key: &str,
    by: FindBy,
    deadline: Option<Duration>,
) -> Result<DiscoveryInfo> {
    if key.trim().is_empty() {
        debug!(strategy = %by, "Search called with empty key");
        return Err(Error::EmptyKey);
    }

    ctx.metrics.searches.inc();
    let needle = by.normalize(key);
    info!(key = %needle, strategy = %by, "Searching federation for node");

    let token = CancellationToken::new();
    let metrics = ctx.metrics.clone();

    let outcome = match deadline {
        Some(limit) => {
            match tokio::time::timeout(limit, run(ctx, needle, by, token.clone())).await {
                Ok(result) => result,
                Err(_) => {
                    token.cancel();
                    Err(Error::Timeout)
                }
            }
        }
        None => run(ctx, needle, by, token).await,
    };

    match &outcome {
        Ok(info) => {
            metrics.vms_found.inc();
            info!(
                tenant = %info.tenant_ref,
                vc = %info.vc_server,
                datacenter = %info.datacenter,
                node_name = %info.node_name,
                uuid = %info.uuid,
                "Node located"
            );
        }
        Err(Error::NotFound) => metrics.not_found.inc(),
        Err(_) => {}
    }

    outcome
}

async fn run(
    ctx: SearchContext,
    needle: String,
    by: FindBy,
    token: CancellationToken,
) -> Result<DiscoveryInfo> {
    let (tx, rx) = mpsc::channel::<SearchUnit>(ctx.search.queue_capacity);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let result = Arc::new(ResultCell::default());
    let failure = Arc::new(FailureSlot::default());

    let producer = tokio::spawn(produce(
        ctx.backend.clone(),
        ctx.tenants.clone(),
        ctx.connect.clone(),
        ctx.metrics.clone(),
        failure.clone(),
        token.clone(),
        tx,
    ));

    let mut workers = Vec::with_capacity(ctx.search.pool_size);
    for worker in 0..ctx.search.pool_size {
        workers.push(tokio::spawn(drain(
            worker,
            ctx.backend.clone(),
            rx.clone(),
            needle.clone(),
            by,
            ctx.metrics.clone(),
            result.clone(),
            failure.clone(),
            token.clone(),
        )));
    }

    // Worker panics must not hang the call; treat them like any other exit.
    let _ = producer.await;
    for worker in workers {
        let _ = worker.await;
    }

    if let Some(info) = result.take() {
        return Ok(info);
    }
    if let Some(err) = failure.take() {
        return Err(err);
    }
    Err(Error::NotFound)
}

/// Producer side: tenants in configuration order, one unit per datacenter.
///
/// A tenant that fails to connect or enumerate is skipped, its error
/// recorded; the rest of the federation is still searched. The queue closes
/// when this task returns and drops the sender.
async fn produce(
    backend: Arc<dyn VirtBackend>,
    tenants: Vec<Arc<TenantConnection>>,
    connect: ConnectConfig,
    metrics: Arc<Metrics>,
    failure: Arc<FailureSlot>,
    token: CancellationToken,
    tx: mpsc::Sender<SearchUnit>,
) {
    for conn in tenants {
        if token.is_cancelled() {
            break;
        }

        let session = match conn.ensure_session(backend.as_ref(), &connect, &token).await {
            Ok(session) => session,
            Err(err) => {
                if token.is_cancelled() {
                    break;
                }
                error!(
                    tenant = %conn.tenant_ref(),
                    endpoint = %conn.endpoint(),
                    error = %err,
                    "Skipping tenant, connect failed"
                );
                metrics.connect_failures.inc();
                failure.record(Error::Connection(err));
                continue;
            }
        };

        let datacenters =
            match enumerate_datacenters(backend.as_ref(), conn.config(), &session).await {
                Ok(datacenters) => datacenters,
                Err(err) => {
                    error!(
                        tenant = %conn.tenant_ref(),
                        endpoint = %conn.endpoint(),
                        error = %err,
                        "Skipping tenant, datacenter enumeration failed"
                    );
                    failure.record(Error::Lookup(err));
                    continue;
                }
            };

        for datacenter in datacenters {
            if token.is_cancelled() {
                return;
            }

            debug!(
                tenant = %conn.tenant_ref(),
                vc = %conn.endpoint(),
                datacenter = %datacenter,
                "Queueing datacenter for search"
            );
            let unit = SearchUnit {
                tenant_ref: conn.tenant_ref().to_string(),
                vc_server: conn.endpoint().to_string(),
                session: session.clone(),
                datacenter,
            };
            tokio::select! {
                _ = token.cancelled() => return,
                sent = tx.send(unit) => {
                    if sent.is_err() {
                        // Every worker is gone; nothing left to feed.
                        return;
                    }
                }
            }
        }
    }
}

/// Worker side: one remote lookup per unit, stop on first federation-wide hit.
#[allow(clippy::too_many_arguments)]
async fn drain(
    worker: usize,
    backend: Arc<dyn VirtBackend>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<SearchUnit>>>,
    needle: String,
    by: FindBy,
    metrics: Arc<Metrics>,
    result: Arc<ResultCell>,
    failure: Arc<FailureSlot>,
    token: CancellationToken,
) {
    loop {
        if token.is_cancelled() {
            break;
        }

        let unit = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = token.cancelled() => None,
                unit = rx.recv() => unit,
            }
        };
        let Some(unit) = unit else { break };

        metrics.datacenters_searched.inc();
        let lookup = lookup_vm(backend.as_ref(), &unit, by, &needle);
        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = lookup => outcome,
        };

        match outcome {
            Ok(vm) => {
                if result.try_set(discovered(&unit, vm, by, &needle)) {
                    debug!(
                        worker,
                        tenant = %unit.tenant_ref,
                        vc = %unit.vc_server,
                        datacenter = %unit.datacenter,
                        "Search hit, cancelling remaining work"
                    );
                    token.cancel();
                }
                break;
            }
            Err(err) if err.is_not_found() => {
                debug!(
                    worker,
                    key = %needle,
                    vc = %unit.vc_server,
                    datacenter = %unit.datacenter,
                    "No match in datacenter"
                );
            }
            Err(err) => {
                error!(
                    worker,
                    key = %needle,
                    strategy = %by,
                    vc = %unit.vc_server,
                    datacenter = %unit.datacenter,
                    error = %err,
                    "Lookup failed"
                );
                metrics.lookup_failures.inc();
                failure.record(Error::Lookup(err));
            }
        }
    }
}

/// The single dispatch point from strategy to backend call.
async fn lookup_vm(
    backend: &dyn VirtBackend,
    unit: &SearchUnit,
    by: FindBy,
    key: &str,
) -> BackendResult<VirtualMachine> {
    match by {
        FindBy::Uuid => {
            backend
                .find_vm_by_uuid(&unit.session, &unit.datacenter, key)
                .await
        }
        FindBy::Ip => {
            backend
                .find_vm_by_ip(&unit.session, &unit.datacenter, key)
                .await
        }
        FindBy::DnsName => {
            backend
                .find_vm_by_dns_name(&unit.session, &unit.datacenter, key)
                .await
        }
    }
}

fn discovered(unit: &SearchUnit, vm: VirtualMachine, by: FindBy, key: &str) -> DiscoveryInfo {
    // IP searches echo the searched address back as the canonical node name.
    let node_name = if by == FindBy::Ip {
        key.to_string()
    } else {
        vm.hostname.clone()
    };
    let uuid = vm.uuid.trim().to_lowercase();

    DiscoveryInfo {
        tenant_ref: unit.tenant_ref.clone(),
        vc_server: unit.vc_server.clone(),
        datacenter: unit.datacenter.clone(),
        vm,
        uuid,
        node_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PowerState;

    fn unit() -> SearchUnit {
        SearchUnit {
            tenant_ref: "t1".into(),
            vc_server: "vc-1".into(),
            session: Session::new("vc-1"),
            datacenter: Datacenter::new("dc-1"),
        }
    }

    fn vm() -> VirtualMachine {
        VirtualMachine {
            uuid: " 4207AABD-77 ".into(),
            hostname: "host-7".into(),
            ip_addresses: vec!["10.0.0.5".into()],
            power_state: PowerState::Started,
        }
    }

    #[test]
    fn result_cell_is_write_once() {
        let cell = ResultCell::default();
        let first = discovered(&unit(), vm(), FindBy::Uuid, "4207aabd-77");
        let second = {
            let mut other = unit();
            other.tenant_ref = "t2".into();
            discovered(&other, vm(), FindBy::Uuid, "4207aabd-77")
        };

        assert!(cell.try_set(first));
        assert!(!cell.try_set(second));
        assert_eq!(cell.take().unwrap().tenant_ref, "t1");
    }

    #[test]
    fn failure_slot_keeps_the_last_error() {
        let slot = FailureSlot::default();
        slot.record(Error::NotFound);
        slot.record(Error::EmptyKey);
        assert!(matches!(slot.take(), Some(Error::EmptyKey)));
        assert!(slot.take().is_none());
    }

    #[test]
    fn ip_search_overrides_node_name() {
        let info = discovered(&unit(), vm(), FindBy::Ip, "10.0.0.5");
        assert_eq!(info.node_name, "10.0.0.5");
        assert_eq!(info.vm.hostname, "host-7");
    }

    #[test]
    fn discovery_normalizes_the_reported_uuid() {
        let info = discovered(&unit(), vm(), FindBy::DnsName, "host-7");
        assert_eq!(info.node_name, "host-7");
        assert_eq!(info.uuid, "4207aabd-77");
    }
}
