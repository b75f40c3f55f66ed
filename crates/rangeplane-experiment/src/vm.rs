//! Operations on individual VMs of a running experiment.
//!
//! Each call requires the experiment to be running for real (not a dry
//! run) and the VM to be a node of its topology. Start, stop and kill hold
//! the `vm|<experiment>/<vm>` lock while the backend works.

use std::fs;
use std::path::PathBuf;

use rangeplane_cluster::{Capture, VmInfo};
use rangeplane_lock::{LockGuard, LockStatus, vm_key};
use rangeplane_types::Experiment;
use tracing::info;

use crate::controller::Controller;
use crate::error::{ExperimentError, ExperimentResult, Failure};

/// Where a capture of `vm`'s interface `iface` is written.
pub fn capture_path(exp: &Experiment, vm: &str, iface: usize) -> PathBuf {
    exp.spec.base_dir.join("captures").join(format!("{vm}-{iface}.pcap"))
}

impl Controller {
    fn running_experiment(&self, name: &str) -> ExperimentResult<Experiment> {
        let exp = self.load(name)?;
        if !exp.running() {
            return Err(ExperimentError::NotRunning(name.to_string()));
        }
        if exp.dry_run() {
            return Err(ExperimentError::InvalidRequest(format!(
                "experiment {name} was started as a dry run and has no VMs"
            )));
        }
        Ok(exp)
    }

    /// Load a running experiment and check `vm` is one of its nodes with at
    /// least `iface + 1` interfaces, if given.
    fn vm_target(&self, name: &str, vm: &str, iface: Option<usize>) -> ExperimentResult<Experiment> {
        let exp = self.running_experiment(name)?;
        let node = exp
            .spec
            .topology
            .find_node(vm)
            .ok_or_else(|| ExperimentError::VmNotFound {
                experiment: name.to_string(),
                vm: vm.to_string(),
            })?;
        if let Some(iface) = iface {
            let count = node.network.interfaces.len();
            if iface >= count {
                return Err(ExperimentError::InvalidRequest(format!(
                    "VM {vm} has {count} interfaces, no interface {iface}"
                )));
            }
        }
        Ok(exp)
    }

    fn lock_vm(&self, exp: &str, vm: &str, status: LockStatus) -> ExperimentResult<LockGuard<'_>> {
        let ttl = self.config().ttls.vm;
        Ok(self.locks().acquire(&vm_key(exp, vm), status, ttl)?)
    }

    /// The backend's view of every VM in a running experiment.
    pub fn vms(&self, name: &str) -> Result<Vec<VmInfo>, Failure> {
        let run = || -> ExperimentResult<Vec<VmInfo>> {
            self.running_experiment(name)?;
            Ok(self.backend().vm_info(name)?)
        };
        run().map_err(Failure::new)
    }

    pub fn start_vm(&self, name: &str, vm: &str) -> Result<(), Failure> {
        let run = || -> ExperimentResult<()> {
            self.vm_target(name, vm, None)?;
            let _guard = self.lock_vm(name, vm, LockStatus::Starting)?;
            self.backend().start_vm(name, vm)?;
            info!(experiment = %name, %vm, "VM started");
            Ok(())
        };
        run().map_err(Failure::new)
    }

    pub fn stop_vm(&self, name: &str, vm: &str) -> Result<(), Failure> {
        let run = || -> ExperimentResult<()> {
            self.vm_target(name, vm, None)?;
            let _guard = self.lock_vm(name, vm, LockStatus::Stopping)?;
            self.backend().stop_vm(name, vm)?;
            info!(experiment = %name, %vm, "VM stopped");
            Ok(())
        };
        run().map_err(Failure::new)
    }

    pub fn kill_vm(&self, name: &str, vm: &str) -> Result<(), Failure> {
        let run = || -> ExperimentResult<()> {
            self.vm_target(name, vm, None)?;
            let _guard = self.lock_vm(name, vm, LockStatus::Stopping)?;
            self.backend().kill_vm(name, vm)?;
            info!(experiment = %name, %vm, "VM killed");
            Ok(())
        };
        run().map_err(Failure::new)
    }

    /// Attach interface `iface` of `vm` to the VLAN alias `vlan`.
    pub fn connect_interface(&self, name: &str, vm: &str, iface: usize, vlan: &str) -> Result<(), Failure> {
        let run = || -> ExperimentResult<()> {
            if vlan.is_empty() {
                return Err(ExperimentError::InvalidRequest("VLAN alias is required".into()));
            }
            self.vm_target(name, vm, Some(iface))?;
            self.backend().connect_interface(name, vm, iface, vlan)?;
            info!(experiment = %name, %vm, iface, %vlan, "interface connected");
            Ok(())
        };
        run().map_err(Failure::new)
    }

    pub fn disconnect_interface(&self, name: &str, vm: &str, iface: usize) -> Result<(), Failure> {
        let run = || -> ExperimentResult<()> {
            self.vm_target(name, vm, Some(iface))?;
            self.backend().disconnect_interface(name, vm, iface)?;
            info!(experiment = %name, %vm, iface, "interface disconnected");
            Ok(())
        };
        run().map_err(Failure::new)
    }

    /// Start capturing `iface` of `vm`; returns the capture file path.
    pub fn start_capture(&self, name: &str, vm: &str, iface: usize) -> Result<PathBuf, Failure> {
        let run = || -> ExperimentResult<PathBuf> {
            let exp = self.vm_target(name, vm, Some(iface))?;
            let path = capture_path(&exp, vm, iface);
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).map_err(|e| ExperimentError::Backend(e.into()))?;
            }
            self.backend().start_capture(name, vm, iface, &path)?;
            info!(experiment = %name, %vm, iface, path = %path.display(), "capture started");
            Ok(path)
        };
        run().map_err(Failure::new)
    }

    /// Stop every capture on `vm`.
    pub fn stop_capture(&self, name: &str, vm: &str) -> Result<(), Failure> {
        let run = || -> ExperimentResult<()> {
            self.vm_target(name, vm, None)?;
            self.backend().stop_capture(name, vm)?;
            info!(experiment = %name, %vm, "captures stopped");
            Ok(())
        };
        run().map_err(Failure::new)
    }

    pub fn captures(&self, name: &str) -> Result<Vec<Capture>, Failure> {
        let run = || -> ExperimentResult<Vec<Capture>> {
            self.running_experiment(name)?;
            Ok(self.backend().captures(name)?)
        };
        run().map_err(Failure::new)
    }
}
