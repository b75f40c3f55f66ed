//! rangeplane-experiment — the experiment lifecycle controller.
//!
//! # Architecture
//!
//! ```text
//!  caller ──► Controller ──► LockCache        experiment|<name>, vm|<exp>/<vm>
//!                 │
//!                 ├──► DocumentStore           topologies, scenarios, experiments
//!                 ├──► UpgraderRegistry        older documents to stored versions
//!                 ├──► AppRegistry             configure / pre-start / post-start / cleanup
//!                 ├──► SchedulerRegistry       node to host assignment
//!                 └──► ClusterBackend          scripts, launches, VM control
//! ```
//!
//! Registries are built once at process start and shared by `Arc`. Every
//! public entry point returns a [`Failure`] on error: the typed
//! [`ExperimentError`] plus a correlation ID that is also logged.

pub mod config;
pub mod controller;
pub mod error;
pub mod progress;
pub mod vlan;
pub mod vm;

pub use config::ControllerConfig;
pub use controller::{Applied, Controller, CreateRequest, StartRequest};
pub use error::{ExperimentError, ExperimentResult, Failure};
pub use progress::{StartHandle, start_detached};
pub use vlan::VlanRange;
pub use vm::capture_path;
