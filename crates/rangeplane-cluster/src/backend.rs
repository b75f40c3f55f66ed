//! The cluster execution backend interface.
//!
//! Every call is blocking request/response. Launching is asynchronous on
//! the backend side: [`ClusterBackend::launch`] returns once VMs are queued
//! for creation, and callers poll [`ClusterBackend::queued_vms`] (or
//! [`ClusterBackend::launch_progress`]) to follow it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ClusterResult;
use crate::host::Hosts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VmState {
    Building,
    Running,
    Paused,
    Quit,
    Error,
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VmState::Building => "BUILDING",
            VmState::Running => "RUNNING",
            VmState::Paused => "PAUSED",
            VmState::Quit => "QUIT",
            VmState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// A packet capture running on one VM interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub vm: String,
    pub interface: usize,
    pub filepath: PathBuf,
}

/// One row of the backend's VM table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmInfo {
    pub name: String,
    pub host: String,
    pub state: VmState,
    /// VLAN alias per interface, in interface order. Empty when disconnected.
    pub vlans: Vec<String>,
    pub cpus: u32,
    pub memory: u64,
}

impl VmInfo {
    pub fn running(&self) -> bool {
        self.state == VmState::Running
    }
}

/// Commands the control plane issues against the cluster.
///
/// Namespaces are named after experiments.
pub trait ClusterBackend: Send + Sync {
    /// Load and execute a command script.
    fn load_script(&self, path: &Path) -> ClusterResult<()>;

    /// Launch every VM queued in the namespace and start those not marked
    /// do-not-boot.
    fn launch(&self, namespace: &str) -> ClusterResult<()>;

    /// Number of VMs in the namespace still queued or building.
    fn queued_vms(&self, namespace: &str) -> ClusterResult<usize>;

    fn vm_info(&self, namespace: &str) -> ClusterResult<Vec<VmInfo>>;

    fn start_vm(&self, namespace: &str, vm: &str) -> ClusterResult<()>;

    fn stop_vm(&self, namespace: &str, vm: &str) -> ClusterResult<()>;

    fn kill_vm(&self, namespace: &str, vm: &str) -> ClusterResult<()>;

    fn connect_interface(&self, namespace: &str, vm: &str, interface: usize, vlan: &str) -> ClusterResult<()>;

    fn disconnect_interface(&self, namespace: &str, vm: &str, interface: usize) -> ClusterResult<()>;

    fn start_capture(&self, namespace: &str, vm: &str, interface: usize, path: &Path) -> ClusterResult<()>;

    /// Stop every capture running on the VM.
    fn stop_capture(&self, namespace: &str, vm: &str) -> ClusterResult<()>;

    fn captures(&self, namespace: &str) -> ClusterResult<Vec<Capture>>;

    /// All cluster hosts with their current commitments.
    fn cluster_hosts(&self) -> ClusterResult<Hosts>;

    /// VLAN alias to allocated VLAN ID for the namespace.
    fn vlans(&self, namespace: &str) -> ClusterResult<BTreeMap<String, u32>>;

    /// Destroy every VM and VLAN in the namespace.
    fn clear_namespace(&self, namespace: &str) -> ClusterResult<()>;

    /// Fraction of `expected` VMs no longer queued, in `0.0..=1.0`.
    fn launch_progress(&self, namespace: &str, expected: usize) -> ClusterResult<f64> {
        if expected == 0 {
            return Ok(1.0);
        }
        let queued = self.queued_vms(namespace)?.min(expected);
        Ok(1.0 - queued as f64 / expected as f64)
    }
}
