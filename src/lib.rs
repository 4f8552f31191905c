//! Federated virtual machine locator.
//!
//! `muster` answers one question: given a VM key (instance UUID, IP
//! address, or DNS name), which tenant, virtualization center, and
//! datacenter own that VM? Callers do not know the owner in advance, so the
//! crate searches the whole federation concurrently:
//!
//! - **Bounded-retry connections** per tenant, with sessions reused across
//!   searches
//! - **Allow-list aware** datacenter enumeration with partial-failure
//!   tolerance
//! - **Racing worker pool** that resolves to the first positive match and
//!   cancels the rest
//! - **Failure aggregation** that keeps a down VC from masking a healthy one
//!
//! # Example
//!
//! ```rust,no_run
//! use muster::{
//!     Credentials, Federation, FederationConfig, FindBy, SimBackend, TenantConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FederationConfig::new()
//!         .with_tenant(TenantConfig::new(
//!             "tenant-a",
//!             "vc-east.example.com",
//!             Credentials::new("admin", "secret"),
//!         ))
//!         .with_tenant(
//!             TenantConfig::new(
//!                 "tenant-b",
//!                 "vc-west.example.com",
//!                 Credentials::new("admin", "secret"),
//!             )
//!             // Search only these datacenters for tenant-b.
//!             .with_datacenters("dc-3,dc-7"),
//!         );
//!
//!     // Any VirtBackend implementation works here; SimBackend is the
//!     // in-memory one used in tests.
//!     let backend = Arc::new(SimBackend::new());
//!     let federation = Federation::new(config, backend)?;
//!
//!     match federation.find("4207aabd-2f5d-4c6e", FindBy::Uuid, None).await {
//!         Ok(info) => println!(
//!             "found {} in {} / {}",
//!             info.node_name, info.vc_server, info.datacenter
//!         ),
//!         Err(err) if err.is_not_found() => println!("not in this federation"),
//!         Err(err) => return Err(err.into()),
//!     }
//!
//!     federation.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Federation API                 │
//! │  • find(key, by, deadline)                   │
//! │  • list_all(deadline)                        │
//! │  • shutdown()                                │
//! └─────────────────────────────────────────────┘
//!                       │
//!        ┌──────────────┼───────────────┐
//!        ▼              ▼               ▼
//! ┌────────────┐  ┌───────────┐  ┌────────────┐
//! │ Tenant     │  │ Search    │  │ VirtBackend│
//! │ Connections│  │ Engine    │  │ (SDK seam) │
//! └────────────┘  └───────────┘  └────────────┘
//! ```
//!
//! The search engine is a single producer feeding (tenant, datacenter) work
//! units through a bounded queue into a fixed worker pool. The first worker
//! with a positive match wins a write-once result cell and cancels the
//! shared token; per-datacenter absence is never an error, and the last
//! non-absence failure is kept as the explanation when nothing is found.
//!
//! # Failure semantics
//!
//! - An unreachable tenant is retried a bounded number of times, then
//!   skipped; the rest of the federation is still searched.
//! - `find` resolves with precedence: found > last recorded failure >
//!   [`Error::NotFound`].
//! - `list_all` never fails because a tenant is down; a fully-down
//!   federation lists empty.

pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod federation;
pub mod metrics;
pub mod testing;
pub mod types;

mod locator;

// Re-export main types for convenience
pub use backend::sim::SimBackend;
pub use backend::{BackendResult, Session, VirtBackend};
pub use config::{ConnectConfig, Credentials, FederationConfig, SearchConfig, TenantConfig};
pub use connection::TenantConnection;
pub use error::{BackendError, Error, Result};
pub use federation::Federation;
pub use metrics::{Counter, Metrics, MetricsSnapshot};
pub use types::{
    Datacenter, DiscoveryInfo, FindBy, ListInfo, PowerState, VirtualMachine,
};
