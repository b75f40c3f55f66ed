//! The scheduler trait and registry.

use std::collections::BTreeMap;

use rangeplane_cluster::Hosts;
use rangeplane_types::ExperimentSpec;
use tracing::{debug, info};

use crate::error::{SchedulerError, SchedulerResult};
use crate::{IsolateExperiment, RoundRobin, SubnetCompute};

/// A node-placement algorithm.
///
/// `hosts` is a private copy holding only schedulable hosts; the scheduler
/// may adjust its counters while planning. Assignments already in
/// `spec.schedules` refer to offered hosts and must be honoured.
pub trait Scheduler: Send + Sync {
    fn name(&self) -> &str;

    fn schedule(&self, spec: &mut ExperimentSpec, hosts: Hosts) -> SchedulerResult<()>;
}

#[derive(Default)]
pub struct SchedulerRegistry {
    schedulers: BTreeMap<String, Box<dyn Scheduler>>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in algorithms.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for scheduler in [
            Box::new(RoundRobin) as Box<dyn Scheduler>,
            Box::new(IsolateExperiment),
            Box::new(SubnetCompute),
        ] {
            registry.schedulers.insert(scheduler.name().to_string(), scheduler);
        }
        registry
    }

    pub fn register(&mut self, scheduler: impl Scheduler + 'static) -> SchedulerResult<()> {
        let name = scheduler.name().to_string();
        if self.schedulers.contains_key(&name) {
            return Err(SchedulerError::Duplicate(name));
        }
        debug!(%name, "registered scheduler");
        self.schedulers.insert(name, Box::new(scheduler));
        Ok(())
    }

    /// Registered scheduler names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.schedulers.keys().map(String::as_str).collect()
    }

    /// Run the named scheduler against a snapshot of `hosts`.
    pub fn schedule(&self, name: &str, spec: &mut ExperimentSpec, hosts: &Hosts) -> SchedulerResult<()> {
        let scheduler = self
            .schedulers
            .get(name)
            .ok_or_else(|| SchedulerError::NotFound(name.to_string()))?;

        if spec.topology.nodes.is_empty() {
            return Err(SchedulerError::NoNodes);
        }
        let offered = hosts.schedulable();
        if offered.is_empty() {
            return Err(SchedulerError::NoHosts);
        }

        let topology = &spec.topology;
        spec.schedules.retain(|node, host| {
            let keep = topology.find_node(node).is_some() && offered.find(host).is_some();
            if !keep {
                debug!(%node, %host, "discarding stale assignment");
            }
            keep
        });

        scheduler.schedule(spec, offered.clone())?;

        for node in spec.topology.hostnames() {
            match spec.scheduled_host(node) {
                Some(host) if offered.find(host).is_some() => {}
                _ => {
                    return Err(SchedulerError::Incomplete {
                        scheduler: name.to_string(),
                        node: node.to_string(),
                    });
                }
            }
        }

        info!(
            experiment = %spec.experiment_name,
            scheduler = %name,
            nodes = spec.schedules.len(),
            "experiment scheduled"
        );
        Ok(())
    }
}
