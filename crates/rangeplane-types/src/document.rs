//! The untyped document envelope shared by every kind.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TypesError, TypesResult};

/// API group prefixed to every `apiVersion`.
pub const API_GROUP: &str = "rangeplane.dev";

/// Every kind of document the control plane persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Topology,
    Scenario,
    Experiment,
    Image,
    User,
    Role,
}

impl Kind {
    pub const ALL: [Kind; 6] = [
        Kind::Topology,
        Kind::Scenario,
        Kind::Experiment,
        Kind::Image,
        Kind::User,
        Kind::Role,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Topology => "Topology",
            Kind::Scenario => "Scenario",
            Kind::Experiment => "Experiment",
            Kind::Image => "Image",
            Kind::User => "User",
            Kind::Role => "Role",
        }
    }

    /// The version new documents of this kind are written at.
    pub fn stored_version(&self) -> &'static str {
        match self {
            Kind::Scenario => "v2",
            _ => "v1",
        }
    }

    /// Full `apiVersion` string for the stored version.
    pub fn api_version(&self) -> String {
        format!("{API_GROUP}/{}", self.stored_version())
    }

    /// Only experiments carry a mutable status block.
    pub fn has_status(&self) -> bool {
        matches!(self, Kind::Experiment)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypesError::UnknownKind(s.to_string()))
    }
}

/// Name, timestamps and free-form annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Metadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// A persisted configuration document.
///
/// `spec` is kept as raw JSON so documents at any version can be stored,
/// listed and upgraded without knowing their typed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub api_version: String,
    pub kind: Kind,
    pub metadata: Metadata,
    #[serde(default)]
    pub spec: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl Document {
    /// An empty document at the kind's stored version.
    pub fn new(kind: Kind, name: impl Into<String>) -> Self {
        Self::raw(kind, kind.stored_version(), Metadata::named(name), Value::Null)
    }

    /// A document with an explicit version and an untyped spec.
    pub fn raw(kind: Kind, version: &str, metadata: Metadata, spec: Value) -> Self {
        Self {
            api_version: format!("{API_GROUP}/{version}"),
            kind,
            metadata,
            spec,
            status: None,
        }
    }

    /// Encode a typed spec at the kind's stored version.
    pub fn from_spec<T: Serialize>(kind: Kind, metadata: Metadata, spec: &T) -> TypesResult<Self> {
        let spec = serde_json::to_value(spec).map_err(|e| TypesError::Encode {
            kind,
            message: e.to_string(),
        })?;
        Ok(Self::raw(kind, kind.stored_version(), metadata, spec))
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// The version component of `apiVersion` (`v1` for `rangeplane.dev/v1`).
    pub fn version(&self) -> &str {
        self.api_version
            .rsplit_once('/')
            .map_or(self.api_version.as_str(), |(_, v)| v)
    }

    pub fn is_current(&self) -> bool {
        self.version() == self.kind.stored_version()
    }

    pub fn key(&self) -> String {
        document_key(self.kind, self.name())
    }
}

/// Storage key for a document: `kind/name`, kind lowercased.
pub fn document_key(kind: Kind, name: &str) -> String {
    format!("{}/{}", kind.as_str().to_lowercase(), name)
}
