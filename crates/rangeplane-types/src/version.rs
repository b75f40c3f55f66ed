//! Tagged union over every known (kind, version) spec shape.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::document::Kind;
use crate::error::{TypesError, TypesResult};
use crate::{v0, v1, v2};

/// A spec decoded into the shape matching its document's kind and version.
///
/// Legacy variants can be decoded but not encoded; they exist only so the
/// upgraders have something typed to read.
#[derive(Debug, Clone)]
pub enum VersionedSpec {
    TopologyV0(v0::TopologySpec),
    TopologyV1(v1::TopologySpec),
    ScenarioV1(v1::scenario::ScenarioSpec),
    ScenarioV2(v2::ScenarioSpec),
    ExperimentV1(Box<v1::ExperimentSpec>),
    ImageV1(v1::ImageSpec),
    UserV1(v1::UserSpec),
    RoleV1(v1::RoleSpec),
}

impl VersionedSpec {
    pub fn decode(kind: Kind, version: &str, spec: &Value) -> TypesResult<Self> {
        let decoded = match (kind, version) {
            (Kind::Topology, "v0") => Self::TopologyV0(from_value(kind, version, spec)?),
            (Kind::Topology, "v1") => Self::TopologyV1(from_value(kind, version, spec)?),
            (Kind::Scenario, "v1") => Self::ScenarioV1(from_value(kind, version, spec)?),
            (Kind::Scenario, "v2") => Self::ScenarioV2(from_value(kind, version, spec)?),
            (Kind::Experiment, "v1") => Self::ExperimentV1(Box::new(from_value(kind, version, spec)?)),
            (Kind::Image, "v1") => Self::ImageV1(from_value(kind, version, spec)?),
            (Kind::User, "v1") => Self::UserV1(from_value(kind, version, spec)?),
            (Kind::Role, "v1") => Self::RoleV1(from_value(kind, version, spec)?),
            _ => {
                return Err(TypesError::UnknownVersion {
                    kind,
                    version: version.to_string(),
                });
            }
        };
        Ok(decoded)
    }

    pub fn kind(&self) -> Kind {
        match self {
            Self::TopologyV0(_) | Self::TopologyV1(_) => Kind::Topology,
            Self::ScenarioV1(_) | Self::ScenarioV2(_) => Kind::Scenario,
            Self::ExperimentV1(_) => Kind::Experiment,
            Self::ImageV1(_) => Kind::Image,
            Self::UserV1(_) => Kind::User,
            Self::RoleV1(_) => Kind::Role,
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            Self::TopologyV0(_) => "v0",
            Self::ScenarioV2(_) => "v2",
            _ => "v1",
        }
    }

    pub fn is_current(&self) -> bool {
        self.version() == self.kind().stored_version()
    }

    pub fn encode(&self) -> TypesResult<Value> {
        let kind = self.kind();
        match self {
            Self::TopologyV0(_) | Self::ScenarioV1(_) => Err(TypesError::ReadOnlyVersion {
                kind,
                version: self.version(),
            }),
            Self::TopologyV1(s) => to_value(kind, s),
            Self::ScenarioV2(s) => to_value(kind, s),
            Self::ExperimentV1(s) => to_value(kind, s),
            Self::ImageV1(s) => to_value(kind, s),
            Self::UserV1(s) => to_value(kind, s),
            Self::RoleV1(s) => to_value(kind, s),
        }
    }
}

pub(crate) fn from_value<T: DeserializeOwned>(kind: Kind, version: &str, spec: &Value) -> TypesResult<T> {
    T::deserialize(spec).map_err(|e| TypesError::Decode {
        kind,
        version: version.to_string(),
        message: e.to_string(),
    })
}

fn to_value<T: Serialize>(kind: Kind, spec: &T) -> TypesResult<Value> {
    serde_json::to_value(spec).map_err(|e| TypesError::Encode {
        kind,
        message: e.to_string(),
    })
}
