//! Version 1 shapes: the stored version for topologies, experiments,
//! images, users and roles, and the legacy scenario shape.

mod experiment;
mod image;
pub mod scenario;
mod topology;
mod user;

pub use experiment::{DRY_RUN_SUFFIX, ExperimentSpec, ExperimentStatus, VlanSpec};
pub use image::ImageSpec;
pub use topology::{
    DEFAULT_BRIDGE, Drive, General, Hardware, Injection, Interface, Network, Node, Route,
    TopologySpec,
};
pub use user::{Policy, RoleSpec, UserSpec};
