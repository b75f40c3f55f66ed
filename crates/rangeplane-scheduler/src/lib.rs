//! rangeplane-scheduler — assigning topology nodes to cluster hosts.
//!
//! A [`Scheduler`] is a named algorithm that fills an experiment's schedule
//! map (node hostname to cluster host). The [`SchedulerRegistry`] looks
//! schedulers up by name and wraps every run with the same bookkeeping:
//!
//! 1. Only schedulable hosts are offered, as a private copy of the counters.
//! 2. Assignments to hosts that no longer exist (or to nodes no longer in the
//!    topology) are discarded so they get re-planned.
//! 3. After the algorithm runs, every node must be assigned to an offered
//!    host.
//!
//! # Algorithms
//!
//! | Name | Strategy |
//! |---|---|
//! | `round-robin` | spread nodes over hosts by VM count |
//! | `isolate-experiment` | place the whole experiment on one empty host |
//! | `subnet-compute` | co-locate nodes sharing a VLAN, least committed memory first |

pub mod error;
pub mod isolate;
pub mod registry;
pub mod round_robin;
pub mod subnet_compute;

#[cfg(test)]
mod fixtures;

pub use error::{SchedulerError, SchedulerResult};
pub use isolate::IsolateExperiment;
pub use registry::{Scheduler, SchedulerRegistry};
pub use round_robin::RoundRobin;
pub use subnet_compute::SubnetCompute;
