//! Run a whole experiment on a single otherwise-empty host.

use rangeplane_cluster::{Host, Hosts};
use rangeplane_types::ExperimentSpec;
use tracing::{info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::registry::Scheduler;

/// Places every node on one host with no VMs.
///
/// Host choice, in order:
/// 1. the host the first node is manually scheduled on, if it is empty
///    (even if the experiment overloads it);
/// 2. the empty host with the most free memory that fits the experiment's
///    total CPU and memory;
/// 3. the empty host with the most free memory.
pub struct IsolateExperiment;

fn fits(host: &Host, cpus: u64, memory: u64) -> bool {
    cpus + u64::from(host.cpu_commit) < u64::from(host.cpus) && memory + host.mem_commit < host.mem_total
}

impl Scheduler for IsolateExperiment {
    fn name(&self) -> &str {
        "isolate-experiment"
    }

    fn schedule(&self, spec: &mut ExperimentSpec, mut hosts: Hosts) -> SchedulerResult<()> {
        let nodes = &spec.topology.nodes;
        let total_cpu: u64 = nodes.iter().map(|n| u64::from(n.hardware.vcpus)).sum();
        let total_mem: u64 = nodes.iter().map(|n| u64::from(n.hardware.memory)).sum();

        let manual = nodes
            .first()
            .and_then(|n| spec.scheduled_host(n.hostname()))
            .and_then(|name| hosts.find(name))
            .and_then(|host| {
                if host.vms == 0 {
                    if !fits(host, total_cpu, total_mem) {
                        warn!(host = %host.name, "isolated experiment may overload host");
                    }
                    Some(host.name.clone())
                } else {
                    info!(host = %host.name, "manually scheduled host is in use; choosing another");
                    None
                }
            });

        let chosen = match manual {
            Some(host) => host,
            None => {
                hosts.sort_by_unallocated_mem(false);
                let empty = || hosts.iter().filter(|h| h.vms == 0);
                empty()
                    .find(|h| fits(h, total_cpu, total_mem))
                    .or_else(|| empty().next())
                    .map(|h| h.name.clone())
                    .ok_or_else(|| SchedulerError::Infeasible("no unused hosts; cannot isolate experiment".into()))?
            }
        };

        let names: Vec<String> = spec.topology.hostnames().map(str::to_string).collect();
        for node in names {
            spec.schedule_node(&node, &chosen)?;
        }
        Ok(())
    }
}
