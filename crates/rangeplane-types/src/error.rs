//! Error types for document decoding, validation and upgrades.

use thiserror::Error;

use crate::document::Kind;

/// Result type alias for document model operations.
pub type TypesResult<T> = Result<T, TypesError>;

/// Errors raised while decoding, validating or upgrading documents.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("unknown kind {0}")]
    UnknownKind(String),

    #[error("unknown version {version} for {kind}")]
    UnknownVersion { kind: Kind, version: String },

    #[error("expected a {expected} document, got {found}")]
    KindMismatch { expected: Kind, found: Kind },

    #[error("{kind} {name} is stored at version {found}, current version is {expected}")]
    VersionMismatch {
        kind: Kind,
        name: String,
        expected: &'static str,
        found: String,
    },

    #[error("decoding {version} {kind} spec: {message}")]
    Decode {
        kind: Kind,
        version: String,
        message: String,
    },

    #[error("encoding {kind} spec: {message}")]
    Encode { kind: Kind, message: String },

    #[error("{kind} {version} is a read-only upgrade input")]
    ReadOnlyVersion { kind: Kind, version: &'static str },

    #[error("no upgrader found for {0}")]
    NoUpgraderFound(String),

    #[error("an upgrader is already registered for {0}")]
    DuplicateUpgrader(String),

    #[error("upgrading {key}: {message}")]
    UpgradeFailed { key: String, message: String },

    #[error("experiment {name} cannot be decoded ({message}); {remediation}")]
    Irrecoverable {
        name: String,
        message: String,
        remediation: &'static str,
    },

    #[error("invalid VLAN configuration: {0}")]
    Vlan(String),

    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("node {0} not found in topology")]
    NodeNotFound(String),
}
