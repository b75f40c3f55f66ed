//! rangeplane-types — versioned configuration documents.
//!
//! Every persisted object (topologies, scenarios, experiments, images, users,
//! roles) travels as a [`Document`]: an untyped envelope carrying an
//! `apiVersion`, a [`Kind`], [`Metadata`] and a JSON `spec` (plus `status` for
//! stateful kinds). This crate turns those envelopes into typed shapes.
//!
//! # Versions
//!
//! | Kind | Stored | Legacy (upgrade input only) |
//! |---|---|---|
//! | Topology | v1 | v0 |
//! | Scenario | v2 | v1 |
//! | Experiment | v1 | |
//! | Image / User / Role | v1 | |
//!
//! Decoding is strict: a document that is not at its kind's stored version is
//! rejected by the `decode_*` functions and must go through the
//! [`UpgraderRegistry`], which knows how to move older shapes forward (and may
//! fan one document out into several).

pub mod de;
pub mod decode;
pub mod document;
pub mod error;
pub mod experiment;
pub mod upgrade;
pub mod v0;
pub mod v1;
pub mod v2;
pub mod version;

pub use decode::{
    decode_experiment, decode_image, decode_role, decode_scenario, decode_topology, decode_user,
    validate_document,
};
pub use document::{API_GROUP, Document, Kind, Metadata, document_key};
pub use error::{TypesError, TypesResult};
pub use experiment::{Experiment, SCENARIO_ANNOTATION, TOPOLOGY_ANNOTATION};
pub use upgrade::{Upgrader, UpgraderRegistry, upgrader_key};
pub use v1::{
    Drive, ExperimentSpec, ExperimentStatus, General, Hardware, ImageSpec, Injection, Interface,
    Network, Node, Policy, RoleSpec, Route, TopologySpec, UserSpec, VlanSpec,
};
pub use v2::{AppHost, ScenarioApp, ScenarioSpec};
pub use version::VersionedSpec;
