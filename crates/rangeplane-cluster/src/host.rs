//! Per-host resource bookkeeping.
//!
//! Schedulers read and adjust these counters while bin-packing nodes onto
//! hosts. A [`Hosts`] value is a snapshot handed out by the backend; it is
//! never persisted.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, ClusterResult};

/// A cluster host and its committed resources. Memory is in MB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub cpus: u32,
    #[serde(default)]
    pub cpu_commit: u32,
    pub mem_total: u64,
    #[serde(default)]
    pub mem_commit: u64,
    #[serde(default)]
    pub mem_used: u64,
    #[serde(default)]
    pub vms: u32,
    #[serde(default = "default_schedulable")]
    pub schedulable: bool,
    #[serde(default)]
    pub headnode: bool,
}

fn default_schedulable() -> bool {
    true
}

impl Host {
    pub fn new(name: impl Into<String>, cpus: u32, mem_total: u64) -> Self {
        Self {
            name: name.into(),
            cpus,
            mem_total,
            schedulable: true,
            ..Default::default()
        }
    }

    pub fn free_cpu(&self) -> u32 {
        self.cpus.saturating_sub(self.cpu_commit)
    }

    pub fn free_memory(&self) -> u64 {
        self.mem_total.saturating_sub(self.mem_commit)
    }
}

/// An ordered set of hosts.
///
/// All sorts are stable, so hosts that compare equal keep their relative
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hosts(Vec<Host>);

impl Hosts {
    pub fn new(hosts: Vec<Host>) -> Self {
        Self(hosts)
    }

    pub fn into_inner(self) -> Vec<Host> {
        self.0
    }

    /// Only the hosts marked schedulable, order preserved.
    pub fn schedulable(&self) -> Hosts {
        Hosts(self.0.iter().filter(|h| h.schedulable).cloned().collect())
    }

    pub fn find(&self, name: &str) -> Option<&Host> {
        self.0.iter().find(|h| h.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|h| h.name.as_str()).collect()
    }

    pub fn sort_by_unallocated_cpu(&mut self, asc: bool) {
        self.sort_with(asc, |h| u64::from(h.free_cpu()));
    }

    pub fn sort_by_committed_cpu(&mut self, asc: bool) {
        self.sort_with(asc, |h| u64::from(h.cpu_commit));
    }

    pub fn sort_by_unallocated_mem(&mut self, asc: bool) {
        self.sort_with(asc, Host::free_memory);
    }

    pub fn sort_by_committed_mem(&mut self, asc: bool) {
        self.sort_with(asc, |h| h.mem_commit);
    }

    pub fn sort_by_vms(&mut self, asc: bool) {
        self.sort_with(asc, |h| u64::from(h.vms));
    }

    fn sort_with(&mut self, asc: bool, key: impl Fn(&Host) -> u64) {
        if asc {
            self.0.sort_by_key(|h| key(h));
        } else {
            self.0.sort_by(|a, b| key(b).cmp(&key(a)));
        }
    }

    fn host_mut(&mut self, name: &str) -> ClusterResult<&mut Host> {
        self.0
            .iter_mut()
            .find(|h| h.name == name)
            .ok_or_else(|| ClusterError::HostNotFound(name.to_string()))
    }

    pub fn incr_host_vms(&mut self, name: &str, delta: i32) -> ClusterResult<()> {
        let host = self.host_mut(name)?;
        host.vms = host.vms.saturating_add_signed(delta);
        Ok(())
    }

    pub fn incr_host_cpu_commit(&mut self, name: &str, delta: i32) -> ClusterResult<()> {
        let host = self.host_mut(name)?;
        host.cpu_commit = host.cpu_commit.saturating_add_signed(delta);
        Ok(())
    }

    pub fn incr_host_mem_commit(&mut self, name: &str, delta: i64) -> ClusterResult<()> {
        let host = self.host_mut(name)?;
        host.mem_commit = host.mem_commit.saturating_add_signed(delta);
        Ok(())
    }
}

impl Deref for Hosts {
    type Target = [Host];

    fn deref(&self) -> &[Host] {
        &self.0
    }
}

impl DerefMut for Hosts {
    fn deref_mut(&mut self) -> &mut [Host] {
        &mut self.0
    }
}

impl From<Vec<Host>> for Hosts {
    fn from(hosts: Vec<Host>) -> Self {
        Self(hosts)
    }
}

impl FromIterator<Host> for Hosts {
    fn from_iter<I: IntoIterator<Item = Host>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Hosts {
    type Item = Host;
    type IntoIter = std::vec::IntoIter<Host>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Hosts {
    type Item = &'a Host;
    type IntoIter = std::slice::Iter<'a, Host>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
