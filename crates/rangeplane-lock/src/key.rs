//! Lock keys, statuses and default TTLs.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the lock holder is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    Creating,
    Deleting,
    Starting,
    Stopping,
    Scheduling,
    /// Editing a stopped experiment's VLAN aliases or range.
    Updating,
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LockStatus::Creating => "creating",
            LockStatus::Deleting => "deleting",
            LockStatus::Starting => "starting",
            LockStatus::Stopping => "stopping",
            LockStatus::Scheduling => "scheduling",
            LockStatus::Updating => "updating",
        };
        f.write_str(s)
    }
}

pub fn experiment_key(name: &str) -> String {
    format!("experiment|{name}")
}

pub fn vm_key(experiment: &str, vm: &str) -> String {
    format!("vm|{experiment}/{vm}")
}

/// TTLs per operation.
#[derive(Debug, Clone, PartialEq)]
pub struct LockTtls {
    pub create: Duration,
    pub delete: Duration,
    pub start: Duration,
    pub stop: Duration,
    pub schedule: Duration,
    pub update: Duration,
    /// Every VM-level lock.
    pub vm: Duration,
}

impl Default for LockTtls {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(5 * 60),
            delete: Duration::from_secs(60),
            start: Duration::from_secs(5 * 60),
            stop: Duration::from_secs(60),
            schedule: Duration::from_secs(60),
            update: Duration::from_secs(60),
            vm: Duration::from_secs(60),
        }
    }
}

impl LockTtls {
    /// TTL for an experiment-level status.
    pub fn experiment(&self, status: LockStatus) -> Duration {
        match status {
            LockStatus::Creating => self.create,
            LockStatus::Deleting => self.delete,
            LockStatus::Starting => self.start,
            LockStatus::Stopping => self.stop,
            LockStatus::Scheduling => self.schedule,
            LockStatus::Updating => self.update,
        }
    }
}
