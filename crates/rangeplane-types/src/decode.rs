//! Strict decoding of stored-version documents into typed specs.
//!
//! These functions refuse documents that are not at their kind's stored
//! version; callers holding older documents go through
//! [`UpgraderRegistry`](crate::UpgraderRegistry) first.

use serde::de::DeserializeOwned;

use crate::document::{Document, Kind};
use crate::error::{TypesError, TypesResult};
use crate::experiment::Experiment;
use crate::v1::{ExperimentStatus, ImageSpec, RoleSpec, TopologySpec, UserSpec};
use crate::v2::ScenarioSpec;
use crate::version::from_value;

pub(crate) fn ensure_current(doc: &Document, kind: Kind) -> TypesResult<()> {
    if doc.kind != kind {
        return Err(TypesError::KindMismatch {
            expected: kind,
            found: doc.kind,
        });
    }
    if !doc.is_current() {
        return Err(TypesError::VersionMismatch {
            kind,
            name: doc.name().to_string(),
            expected: kind.stored_version(),
            found: doc.version().to_string(),
        });
    }
    Ok(())
}

fn decode_spec<T: DeserializeOwned>(doc: &Document, kind: Kind) -> TypesResult<T> {
    ensure_current(doc, kind)?;
    from_value(kind, doc.version(), &doc.spec)
}

pub fn decode_topology(doc: &Document) -> TypesResult<TopologySpec> {
    decode_spec(doc, Kind::Topology)
}

pub fn decode_scenario(doc: &Document) -> TypesResult<ScenarioSpec> {
    decode_spec(doc, Kind::Scenario)
}

pub fn decode_image(doc: &Document) -> TypesResult<ImageSpec> {
    decode_spec(doc, Kind::Image)
}

pub fn decode_user(doc: &Document) -> TypesResult<UserSpec> {
    decode_spec(doc, Kind::User)
}

pub fn decode_role(doc: &Document) -> TypesResult<RoleSpec> {
    decode_spec(doc, Kind::Role)
}

/// Decode an experiment's spec and status. A missing status decodes as a
/// stopped experiment.
pub fn decode_experiment(doc: &Document) -> TypesResult<Experiment> {
    let spec = decode_spec(doc, Kind::Experiment)?;
    let status: ExperimentStatus = match &doc.status {
        Some(status) if !status.is_null() => from_value(Kind::Experiment, doc.version(), status)?,
        _ => ExperimentStatus::default(),
    };
    Ok(Experiment {
        metadata: doc.metadata.clone(),
        spec,
        status,
    })
}

/// Validate a stored-version document of any kind.
pub fn validate_document(doc: &Document) -> TypesResult<()> {
    let problems = match doc.kind {
        Kind::Topology => decode_topology(doc)?.validate(),
        Kind::Scenario => decode_scenario(doc)?.validate(),
        Kind::Experiment => return decode_experiment(doc)?.spec.validate(),
        Kind::Image => decode_image(doc)?.validate(),
        Kind::User => decode_user(doc)?.validate(),
        Kind::Role => decode_role(doc)?.validate(),
    };
    if problems.is_empty() {
        Ok(())
    } else {
        Err(TypesError::Validation(problems))
    }
}
