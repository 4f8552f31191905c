//! Virtualization-backend seam.
//!
//! The locator never talks to a virtualization SDK directly; everything goes
//! through the [`VirtBackend`] trait so different SDKs (or the in-memory
//! [`SimBackend`](sim::SimBackend)) can be plugged in.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 Federation                   │
//! │                                              │
//! │   backend: Arc<dyn VirtBackend>              │
//! └─────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────┐
//! │              VirtBackend trait               │
//! └─────────────────────────────────────────────┘
//!           │                       │
//!           ▼                       ▼
//! ┌──────────────────┐   ┌──────────────────────┐
//! │ SDK adapters     │   │ SimBackend           │
//! │ (out of tree)    │   │ (in-memory, tests)   │
//! └──────────────────┘   └──────────────────────┘
//! ```

pub mod sim;

use crate::config::TenantConfig;
use crate::error::BackendError;
use crate::types::{Datacenter, VirtualMachine};
use async_trait::async_trait;
use uuid::Uuid;

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A live login session with one VC endpoint.
///
/// Cheap to clone; the session id correlates log lines across the backend
/// and the locator. Validity is not tracked here: a session is
/// valid-enough-to-attempt-use until a remote call says otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: Uuid,
    endpoint: String,
}

impl Session {
    /// Create a session handle for an endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint: endpoint.into(),
        }
    }

    /// Unique id of this session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The endpoint this session was established against.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// The narrow contract a virtualization SDK must satisfy.
///
/// `find_vm_*` methods signal absence with [`BackendError::NotFound`], never
/// with a generic failure; the search engine relies on that distinction.
#[async_trait]
pub trait VirtBackend: Send + Sync {
    /// Log in to the tenant's endpoint and return a session handle.
    async fn connect(&self, cfg: &TenantConfig) -> BackendResult<Session>;

    /// Log the session out.
    async fn logout(&self, session: &Session) -> BackendResult<()>;

    /// Every datacenter visible to the session.
    async fn list_datacenters(&self, session: &Session) -> BackendResult<Vec<Datacenter>>;

    /// Resolve a single datacenter by name.
    async fn get_datacenter(&self, session: &Session, name: &str) -> BackendResult<Datacenter>;

    /// Find a VM in the datacenter by instance UUID (caller pre-normalizes).
    async fn find_vm_by_uuid(
        &self,
        session: &Session,
        datacenter: &Datacenter,
        uuid: &str,
    ) -> BackendResult<VirtualMachine>;

    /// Find a VM in the datacenter by IP address.
    async fn find_vm_by_ip(
        &self,
        session: &Session,
        datacenter: &Datacenter,
        ip: &str,
    ) -> BackendResult<VirtualMachine>;

    /// Find a VM in the datacenter by DNS hostname.
    async fn find_vm_by_dns_name(
        &self,
        session: &Session,
        datacenter: &Datacenter,
        name: &str,
    ) -> BackendResult<VirtualMachine>;
}
