//! Co-locate nodes that share a VLAN.

use std::collections::HashMap;

use rangeplane_cluster::Hosts;
use rangeplane_types::{ExperimentSpec, Node};
use tracing::debug;

use crate::error::{SchedulerError, SchedulerResult};
use crate::registry::Scheduler;

/// Keys a node by the VLAN of its first interface.
///
/// Each unscheduled node goes to the first host already holding its VLAN
/// that still has memory for it; otherwise to the host with the least
/// committed memory, which then joins that VLAN's host list.
pub struct SubnetCompute;

fn first_vlan(node: &Node) -> SchedulerResult<&str> {
    node.network
        .interfaces
        .first()
        .map(|iface| iface.vlan.as_str())
        .ok_or_else(|| SchedulerError::NoInterfaces(node.hostname().to_string()))
}

impl Scheduler for SubnetCompute {
    fn name(&self) -> &str {
        "subnet-compute"
    }

    fn schedule(&self, spec: &mut ExperimentSpec, mut hosts: Hosts) -> SchedulerResult<()> {
        let mut by_vlan: HashMap<String, Vec<String>> = HashMap::new();
        let mut pending = Vec::new();

        for node in &spec.topology.nodes {
            let vlan = first_vlan(node)?;
            match spec.scheduled_host(node.hostname()) {
                Some(host) => {
                    hosts.incr_host_mem_commit(host, i64::from(node.hardware.memory))?;
                    by_vlan.entry(vlan.to_string()).or_default().push(host.to_string());
                }
                None => pending.push((node.hostname().to_string(), vlan.to_string(), u64::from(node.hardware.memory))),
            }
        }

        hosts.sort_by_committed_mem(true);

        for (node, vlan, memory) in pending {
            let shared = by_vlan.get(&vlan).and_then(|names| {
                names
                    .iter()
                    .filter_map(|name| hosts.find(name))
                    .find(|h| h.mem_commit + memory < h.mem_total)
                    .map(|h| h.name.clone())
            });

            let host = match shared {
                Some(host) => host,
                None => {
                    let host = hosts[0].name.clone();
                    by_vlan.entry(vlan.clone()).or_default().push(host.clone());
                    host
                }
            };

            debug!(%node, %host, %vlan, "subnet placement");
            spec.schedule_node(&node, &host)?;
            hosts.incr_host_mem_commit(&host, memory as i64)?;
            hosts.sort_by_committed_mem(true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{assigned, hosts, spec};
    use crate::registry::SchedulerRegistry;

    const NODES: [&str; 4] = ["foo", "bar", "sucka", "fish"];

    fn run(spec: &mut ExperimentSpec, hosts: &Hosts) -> SchedulerResult<()> {
        SchedulerRegistry::with_defaults().schedule("subnet-compute", spec, hosts)
    }

    #[test]
    fn shared_vlans_land_together() {
        let mut spec = spec();
        run(&mut spec, &hosts(&[0, 0, 0, 0, 0])).unwrap();
        assert_eq!(assigned(&spec, &NODES), ["compute0", "compute1", "compute0", "compute1"]);
    }

    #[test]
    fn manual_placement_seeds_its_vlan() {
        let mut spec = spec();
        spec.schedules.insert("bar".into(), "compute4".into());
        run(&mut spec, &hosts(&[0, 0, 0, 0, 0])).unwrap();
        assert_eq!(assigned(&spec, &NODES), ["compute0", "compute4", "compute0", "compute4"]);
    }

    #[test]
    fn full_host_spills_to_least_committed() {
        let mut cluster = hosts(&[0, 0]);
        for host in cluster.iter_mut() {
            host.mem_total = 1024;
        }
        let mut spec = spec();
        run(&mut spec, &cluster).unwrap();
        assert_eq!(assigned(&spec, &NODES), ["compute0", "compute1", "compute1", "compute0"]);
    }

    #[test]
    fn nodes_without_interfaces_fail() {
        let mut spec = spec();
        spec.topology.nodes[2].network.interfaces.clear();
        let err = run(&mut spec, &hosts(&[0, 0])).unwrap_err();
        assert!(matches!(err, SchedulerError::NoInterfaces(node) if node == "sucka"));
    }
}
