//! Core value types used throughout the locator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Search strategy for locating a virtual machine.
///
/// The strategy branch lives in exactly two places: [`FindBy::normalize`]
/// here and the single lookup dispatch in the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindBy {
    /// Match on the VM's instance UUID.
    Uuid,
    /// Match on one of the VM's IP addresses.
    Ip,
    /// Match on the VM's DNS hostname.
    DnsName,
}

impl FindBy {
    /// Normalize a raw search key for this strategy.
    ///
    /// UUID keys are compared trimmed and lower-cased; IP and DNS keys are
    /// used verbatim.
    pub fn normalize(&self, key: &str) -> String {
        match self {
            FindBy::Uuid => key.trim().to_lowercase(),
            FindBy::Ip | FindBy::DnsName => key.to_string(),
        }
    }
}

impl fmt::Display for FindBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FindBy::Uuid => "byUUID",
            FindBy::Ip => "byIP",
            FindBy::DnsName => "byName",
        };
        f.write_str(s)
    }
}

/// A named datacenter within one VC.
///
/// Read-only once enumerated; never cached across searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datacenter {
    name: String,
}

impl Datacenter {
    /// Create a datacenter value.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The datacenter's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Datacenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Power state of a VM at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    Started,
    Stopped,
    Suspended,
    Unknown,
}

/// A virtual machine snapshot as reported by a datacenter query.
///
/// Not a live-tracked object; fields reflect the moment of the lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// Instance UUID as reported by the endpoint (not normalized).
    pub uuid: String,
    /// DNS hostname as reported by the endpoint.
    pub hostname: String,
    /// All IP addresses assigned to the VM.
    pub ip_addresses: Vec<String>,
    /// Power state at query time.
    pub power_state: PowerState,
}

impl VirtualMachine {
    /// True if the VM was powered on at query time.
    pub fn is_active(&self) -> bool {
        self.power_state == PowerState::Started
    }
}

/// Outcome of a successful federation search.
///
/// Produced exactly once per successful `find`; immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryInfo {
    /// The tenant that owns the VM.
    pub tenant_ref: String,
    /// The VC endpoint the tenant connects to.
    pub vc_server: String,
    /// The datacenter the VM was found in.
    pub datacenter: Datacenter,
    /// The matched VM snapshot.
    pub vm: VirtualMachine,
    /// The VM's UUID, trimmed and lower-cased.
    pub uuid: String,
    /// The resolved node name.
    ///
    /// For IP searches this is the searched IP itself, not the VM's native
    /// hostname: callers searching by IP want the IP echoed back as the
    /// canonical name.
    pub node_name: String,
}

/// One (tenant, VC, datacenter) tuple from a federation listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListInfo {
    /// The tenant the datacenter belongs to.
    pub tenant_ref: String,
    /// The VC endpoint the tenant connects to.
    pub vc_server: String,
    /// The enumerated datacenter.
    pub datacenter: Datacenter,
}
