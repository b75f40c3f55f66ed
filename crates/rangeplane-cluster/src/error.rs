//! Error types for cluster backend calls and host bookkeeping.

use thiserror::Error;

/// Result type alias for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("host {0} not found")]
    HostNotFound(String),

    #[error("namespace {0} not found")]
    NamespaceNotFound(String),

    #[error("VM {vm} not found in namespace {namespace}")]
    VmNotFound { namespace: String, vm: String },

    #[error("script line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("no schedulable hosts available")]
    NoHosts,

    #[error("backend command failed: {0}")]
    Command(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
