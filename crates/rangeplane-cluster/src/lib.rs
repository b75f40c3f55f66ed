//! rangeplane-cluster — the boundary to the cluster that runs VMs.
//!
//! # Components
//!
//! - **Hosts** — per-host CPU/memory/VM counters with stable sorts and
//!   named increments, the bookkeeping schedulers bin-pack against.
//! - **ClusterBackend** — the narrow command/response interface the control
//!   plane drives: load a script, launch queued VMs, per-VM control,
//!   interface and capture management, and state queries.
//! - **Script** — renders an experiment into the line-oriented command
//!   script a backend loads.
//! - **SimCluster** — an in-process backend that interprets those scripts
//!   against a fixed set of hosts. Used by the CLI's local mode and tests.

pub mod backend;
pub mod error;
pub mod host;
pub mod script;
pub mod sim;

pub use backend::{Capture, ClusterBackend, VmInfo, VmState};
pub use error::{ClusterError, ClusterResult};
pub use host::{Host, Hosts};
pub use script::{render_script, script_path, write_script};
pub use sim::SimCluster;
