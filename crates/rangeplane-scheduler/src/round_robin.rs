//! Spread nodes across hosts by VM count.

use rangeplane_cluster::Hosts;
use rangeplane_types::ExperimentSpec;
use tracing::debug;

use crate::error::SchedulerResult;
use crate::registry::Scheduler;

/// Places each unscheduled node on the host a cursor points at, walking
/// hosts in ascending VM-count order.
///
/// Manually scheduled nodes are counted against their hosts first. After
/// each placement the cursor moves on once the current host holds more VMs
/// than the next one, and wraps to the start once the last host holds more
/// than the first.
pub struct RoundRobin;

impl Scheduler for RoundRobin {
    fn name(&self) -> &str {
        "round-robin"
    }

    fn schedule(&self, spec: &mut ExperimentSpec, mut hosts: Hosts) -> SchedulerResult<()> {
        for host in spec.schedules.values() {
            hosts.incr_host_vms(host, 1)?;
        }
        hosts.sort_by_vms(true);

        let unscheduled: Vec<String> = spec
            .topology
            .hostnames()
            .filter(|n| !spec.schedules.contains_key(*n))
            .map(str::to_string)
            .collect();

        let mut idx = 0;
        for node in unscheduled {
            let host = hosts[idx].name.clone();
            debug!(%node, %host, "round-robin placement");
            spec.schedule_node(&node, &host)?;
            hosts[idx].vms += 1;

            let next = if idx + 1 < hosts.len() { idx + 1 } else { 0 };
            if hosts[idx].vms > hosts[next].vms {
                idx = next;
            }
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

    #[test]
    fn idle_cluster_gets_one_node_per_host() {
        let mut spec = spec();
        SchedulerRegistry::with_defaults()
            .schedule("round-robin", &mut spec, &hosts(&[0, 0, 0, 0, 0]))
            .unwrap();
        assert_eq!(assigned(&spec, &NODES), vec!["compute0", "compute1", "compute2", "compute3"]);
    }

    #[test]
    fn loaded_hosts_are_filled_last() {
        let mut spec = spec();
        SchedulerRegistry::with_defaults()
            .schedule("round-robin", &mut spec, &hosts(&[0, 3, 2, 0, 0]))
            .unwrap();
        assert_eq!(assigned(&spec, &NODES), vec!["compute0", "compute3", "compute4", "compute4"]);
    }

    #[test]
    fn manual_placements_count_against_hosts() {
        let mut spec = spec();
        spec.schedules.insert("sucka".into(), "compute0".into());
        SchedulerRegistry::with_defaults()
            .schedule("round-robin", &mut spec, &hosts(&[0, 3, 2, 0, 0]))
            .unwrap();
        assert_eq!(assigned(&spec, &NODES), vec!["compute3", "compute4", "compute0", "compute4"]);
    }

    #[test]
    fn cursor_wraps_around() {
        let mut spec = spec();
        SchedulerRegistry::with_defaults()
            .schedule("round-robin", &mut spec, &hosts(&[0, 0]))
            .unwrap();
        assert_eq!(assigned(&spec, &NODES), vec!["compute0", "compute1", "compute1", "compute0"]);
    }
}
