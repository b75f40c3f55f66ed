//! In-process simulated cluster.
//!
//! `SimCluster` interprets the scripts produced by [`crate::script`]
//! against a fixed host list, places VMs, allocates VLANs and tracks VM
//! state. Launches can be made to take a number of progress polls to
//! complete, and any operation can be made to fail once, so callers can
//! exercise progress reporting and failure cleanup without a real cluster.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::backend::{Capture, ClusterBackend, VmInfo, VmState};
use crate::error::{ClusterError, ClusterResult};
use crate::host::{Host, Hosts};

/// First VLAN ID handed out when a namespace declares no range.
const DEFAULT_VLAN_BASE: u32 = 101;
const DEFAULT_VLAN_MAX: u32 = 4094;

#[derive(Debug, Clone, Default)]
struct VmConfig {
    schedule: Option<String>,
    vcpus: u32,
    memory: u64,
    nets: Vec<String>,
    do_not_boot: bool,
}

#[derive(Debug, Clone)]
struct SimVm {
    host: String,
    state: VmState,
    vlans: Vec<String>,
    cpus: u32,
    memory: u64,
    do_not_boot: bool,
    polls_left: u32,
}

impl SimVm {
    fn finish_build(&mut self) {
        self.state = if self.do_not_boot {
            VmState::Paused
        } else {
            VmState::Running
        };
    }
}

#[derive(Debug, Default)]
struct Namespace {
    range: Option<(u32, u32)>,
    vlans: BTreeMap<String, u32>,
    queued: Vec<(String, VmConfig)>,
    vms: BTreeMap<String, SimVm>,
    captures: Vec<Capture>,
}

#[derive(Debug, Default)]
struct SimState {
    hosts: Hosts,
    namespaces: BTreeMap<String, Namespace>,
    failures: BTreeSet<String>,
    calls: Vec<String>,
}

impl SimState {
    /// Record the call and fail it if a failure was injected for `op`.
    fn enter(&mut self, op: &str, target: &str) -> ClusterResult<()> {
        self.calls.push(format!("{op} {target}"));
        if self.failures.remove(op) {
            return Err(ClusterError::Command(format!("{op} {target}: injected failure")));
        }
        Ok(())
    }

    fn namespace(&mut self, name: &str) -> ClusterResult<&mut Namespace> {
        self.namespaces
            .get_mut(name)
            .ok_or_else(|| ClusterError::NamespaceNotFound(name.to_string()))
    }

    fn vm(&mut self, namespace: &str, vm: &str) -> ClusterResult<&mut SimVm> {
        self.namespace(namespace)?
            .vms
            .get_mut(vm)
            .ok_or_else(|| ClusterError::VmNotFound {
                namespace: namespace.to_string(),
                vm: vm.to_string(),
            })
    }

    fn allocate_vlan(&mut self, namespace: &str, alias: &str) -> ClusterResult<u32> {
        if let Some(id) = self.namespace(namespace)?.vlans.get(alias) {
            return Ok(*id);
        }
        let used: BTreeSet<u32> = self
            .namespaces
            .values()
            .flat_map(|ns| ns.vlans.values().copied())
            .collect();
        let ns = self.namespace(namespace)?;
        let (min, max) = ns.range.unwrap_or((DEFAULT_VLAN_BASE, DEFAULT_VLAN_MAX));
        let id = (min..=max)
            .find(|id| !used.contains(id))
            .ok_or_else(|| ClusterError::Command(format!("VLAN range {min}-{max} exhausted")))?;
        ns.vlans.insert(alias.to_string(), id);
        Ok(id)
    }

    fn release(&mut self, vm: &SimVm) {
        if vm.state == VmState::Quit {
            return;
        }
        let _ = self.hosts.incr_host_vms(&vm.host, -1);
        let _ = self.hosts.incr_host_cpu_commit(&vm.host, -(vm.cpus as i32));
        let _ = self.hosts.incr_host_mem_commit(&vm.host, -(vm.memory as i64));
    }

    fn place(&mut self, config: &VmConfig) -> ClusterResult<String> {
        let host = match &config.schedule {
            Some(host) => {
                if self.hosts.find(host).is_none() {
                    return Err(ClusterError::HostNotFound(host.clone()));
                }
                host.clone()
            }
            None => {
                let mut candidates = self.hosts.schedulable();
                candidates.sort_by_vms(true);
                candidates.first().map(|h| h.name.clone()).ok_or(ClusterError::NoHosts)?
            }
        };
        self.hosts.incr_host_vms(&host, 1)?;
        self.hosts.incr_host_cpu_commit(&host, config.vcpus as i32)?;
        self.hosts.incr_host_mem_commit(&host, config.memory as i64)?;
        Ok(host)
    }
}

pub struct SimCluster {
    state: Mutex<SimState>,
    launch_polls: u32,
}

impl SimCluster {
    pub fn new(hosts: Vec<Host>) -> Self {
        Self {
            state: Mutex::new(SimState {
                hosts: Hosts::new(hosts),
                ..Default::default()
            }),
            launch_polls: 0,
        }
    }

    /// `count` hosts named `compute0..` with identical capacity.
    pub fn with_hosts(count: usize, cpus: u32, mem_total: u64) -> Self {
        Self::new((0..count).map(|i| Host::new(format!("compute{i}"), cpus, mem_total)).collect())
    }

    /// Launched VMs stay building for this many `queued_vms` polls.
    pub fn with_launch_polls(mut self, polls: u32) -> Self {
        self.launch_polls = polls;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call of `op` (a trait method name) fail.
    pub fn fail_on(&self, op: &str) {
        self.lock().failures.insert(op.to_string());
    }

    /// Every call made so far, as `"<op> <target>"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.lock().namespaces.keys().cloned().collect()
    }

    /// Interpret a script. Commands apply in order; on error, earlier
    /// commands stay applied.
    pub fn run_script(&self, script: &str) -> ClusterResult<()> {
        let mut state = self.lock();
        let mut current: Option<String> = None;
        let mut config = VmConfig::default();

        for (idx, raw) in script.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let words: Vec<&str> = line.split_whitespace().collect();
            let err = |message: &str| ClusterError::Script {
                line: idx + 1,
                message: message.to_string(),
            };

            if let ["namespace", name] = words.as_slice() {
                state.namespaces.entry(name.to_string()).or_default();
                current = Some(name.to_string());
                continue;
            }

            let ns_name = current.clone().ok_or_else(|| err("command before namespace"))?;
            let ns = state.namespace(&ns_name)?;

            match words.as_slice() {
                ["ns", "queueing", _] => {}
                ["vlans", "range", min, max] => {
                    let min = min.parse().map_err(|_| err("invalid VLAN range"))?;
                    let max = max.parse().map_err(|_| err("invalid VLAN range"))?;
                    ns.range = Some((min, max));
                }
                ["vlans", "add", alias, id] => {
                    let id = id.parse().map_err(|_| err("invalid VLAN ID"))?;
                    ns.vlans.insert(alias.to_string(), id);
                }
                ["clear", "vm", "config"] => config = VmConfig::default(),
                ["vm", "config", "schedule", host] => config.schedule = Some(host.to_string()),
                ["vm", "config", "vcpus", n] => config.vcpus = n.parse().map_err(|_| err("invalid vcpus"))?,
                ["vm", "config", "memory", n] => config.memory = n.parse().map_err(|_| err("invalid memory"))?,
                ["vm", "config", "do-not-boot", flag] => config.do_not_boot = *flag == "true",
                ["vm", "config", "snapshot", _] | ["vm", "config", "disk", ..] => {}
                ["vm", "config", "net", nets @ ..] => {
                    config.nets = nets
                        .iter()
                        .map(|n| n.rsplit(',').next().unwrap_or(*n).to_string())
                        .collect();
                }
                ["vm", "launch", _kind, name] => {
                    let exists = ns.vms.contains_key(*name) || ns.queued.iter().any(|(n, _)| n == name);
                    if exists {
                        return Err(err(&format!("VM {name} already exists")));
                    }
                    ns.queued.push((name.to_string(), config.clone()));
                }
                _ => return Err(err(&format!("unknown command: {line}"))),
            }
        }
        Ok(())
    }
}

impl ClusterBackend for SimCluster {
    fn load_script(&self, path: &Path) -> ClusterResult<()> {
        self.lock().enter("load_script", &path.display().to_string())?;
        let script = fs::read_to_string(path)?;
        self.run_script(&script)?;
        debug!(path = %path.display(), "script loaded");
        Ok(())
    }

    fn launch(&self, namespace: &str) -> ClusterResult<()> {
        let mut state = self.lock();
        state.enter("launch", namespace)?;
        let queued = std::mem::take(&mut state.namespace(namespace)?.queued);
        let count = queued.len();

        for (name, config) in queued {
            let host = state.place(&config)?;
            let mut vm = SimVm {
                host,
                state: VmState::Building,
                vlans: config.nets.clone(),
                cpus: config.vcpus,
                memory: config.memory,
                do_not_boot: config.do_not_boot,
                polls_left: self.launch_polls,
            };
            for alias in &config.nets {
                state.allocate_vlan(namespace, alias)?;
            }
            if vm.polls_left == 0 {
                vm.finish_build();
            }
            state.namespace(namespace)?.vms.insert(name, vm);
        }

        info!(%namespace, vms = count, "VMs launched");
        Ok(())
    }

    fn queued_vms(&self, namespace: &str) -> ClusterResult<usize> {
        let mut state = self.lock();
        let ns = state.namespace(namespace)?;
        let building = ns.vms.values().filter(|vm| vm.state == VmState::Building).count();
        let queued = ns.queued.len() + building;

        for vm in ns.vms.values_mut().filter(|vm| vm.state == VmState::Building) {
            vm.polls_left = vm.polls_left.saturating_sub(1);
            if vm.polls_left == 0 {
                vm.finish_build();
            }
        }
        Ok(queued)
    }

    fn vm_info(&self, namespace: &str) -> ClusterResult<Vec<VmInfo>> {
        let mut state = self.lock();
        let ns = state.namespace(namespace)?;
        Ok(ns
            .vms
            .iter()
            .map(|(name, vm)| VmInfo {
                name: name.clone(),
                host: vm.host.clone(),
                state: vm.state,
                vlans: vm.vlans.clone(),
                cpus: vm.cpus,
                memory: vm.memory,
            })
            .collect())
    }

    fn start_vm(&self, namespace: &str, vm: &str) -> ClusterResult<()> {
        let mut state = self.lock();
        state.enter("start_vm", vm)?;
        let vm = state.vm(namespace, vm)?;
        match vm.state {
            VmState::Quit | VmState::Error => Err(ClusterError::Command(format!("VM is {}", vm.state))),
            _ => {
                vm.state = VmState::Running;
                Ok(())
            }
        }
    }

    fn stop_vm(&self, namespace: &str, vm: &str) -> ClusterResult<()> {
        let mut state = self.lock();
        state.enter("stop_vm", vm)?;
        let vm = state.vm(namespace, vm)?;
        if vm.state != VmState::Running {
            return Err(ClusterError::Command(format!("VM is {}", vm.state)));
        }
        vm.state = VmState::Paused;
        Ok(())
    }

    fn kill_vm(&self, namespace: &str, vm: &str) -> ClusterResult<()> {
        let mut state = self.lock();
        state.enter("kill_vm", vm)?;
        let snapshot = state.vm(namespace, vm)?.clone();
        state.release(&snapshot);
        state.vm(namespace, vm)?.state = VmState::Quit;
        state.namespace(namespace)?.captures.retain(|c| c.vm != vm);
        Ok(())
    }

    fn connect_interface(&self, namespace: &str, vm: &str, interface: usize, vlan: &str) -> ClusterResult<()> {
        let mut state = self.lock();
        state.enter("connect_interface", vm)?;
        state.allocate_vlan(namespace, vlan)?;
        let entry = state.vm(namespace, vm)?;
        let slot = entry
            .vlans
            .get_mut(interface)
            .ok_or_else(|| ClusterError::Command(format!("VM {vm} has no interface {interface}")))?;
        *slot = vlan.to_string();
        Ok(())
    }

    fn disconnect_interface(&self, namespace: &str, vm: &str, interface: usize) -> ClusterResult<()> {
        let mut state = self.lock();
        state.enter("disconnect_interface", vm)?;
        let entry = state.vm(namespace, vm)?;
        let slot = entry
            .vlans
            .get_mut(interface)
            .ok_or_else(|| ClusterError::Command(format!("VM {vm} has no interface {interface}")))?;
        slot.clear();
        Ok(())
    }

    fn start_capture(&self, namespace: &str, vm: &str, interface: usize, path: &Path) -> ClusterResult<()> {
        let mut state = self.lock();
        state.enter("start_capture", vm)?;
        let interfaces = state.vm(namespace, vm)?.vlans.len();
        if interface >= interfaces {
            return Err(ClusterError::Command(format!("VM {vm} has no interface {interface}")));
        }
        let ns = state.namespace(namespace)?;
        if ns.captures.iter().any(|c| c.vm == vm && c.interface == interface) {
            return Err(ClusterError::Command(format!(
                "capture already running on {vm} interface {interface}"
            )));
        }
        ns.captures.push(Capture {
            vm: vm.to_string(),
            interface,
            filepath: path.to_path_buf(),
        });
        Ok(())
    }

    fn stop_capture(&self, namespace: &str, vm: &str) -> ClusterResult<()> {
        let mut state = self.lock();
        state.enter("stop_capture", vm)?;
        state.vm(namespace, vm)?;
        let ns = state.namespace(namespace)?;
        let before = ns.captures.len();
        ns.captures.retain(|c| c.vm != vm);
        if ns.captures.len() == before {
            return Err(ClusterError::Command(format!("no captures running on {vm}")));
        }
        Ok(())
    }

    fn captures(&self, namespace: &str) -> ClusterResult<Vec<Capture>> {
        Ok(self.lock().namespace(namespace)?.captures.clone())
    }

    fn cluster_hosts(&self) -> ClusterResult<Hosts> {
        let mut state = self.lock();
        state.enter("cluster_hosts", "")?;
        Ok(state.hosts.clone())
    }

    fn vlans(&self, namespace: &str) -> ClusterResult<BTreeMap<String, u32>> {
        let mut state = self.lock();
        state.enter("vlans", namespace)?;
        Ok(state.namespace(namespace)?.vlans.clone())
    }

    fn clear_namespace(&self, namespace: &str) -> ClusterResult<()> {
        let mut state = self.lock();
        state.enter("clear_namespace", namespace)?;
        if let Some(ns) = state.namespaces.remove(namespace) {
            for vm in ns.vms.values() {
                state.release(vm);
            }
            info!(%namespace, vms = ns.vms.len(), "namespace cleared");
        }
        Ok(())
    }
}
