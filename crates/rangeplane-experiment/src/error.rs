//! Lifecycle error taxonomy and correlated failures.

use std::fmt;

use rangeplane_apps::AppError;
use rangeplane_cluster::ClusterError;
use rangeplane_lock::LockError;
use rangeplane_scheduler::SchedulerError;
use rangeplane_store::StoreError;
use rangeplane_types::{Kind, TypesError};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Result type alias for lifecycle operations.
pub type ExperimentResult<T> = Result<T, ExperimentError>;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("{kind} {name} not found")]
    NotFound { kind: Kind, name: String },

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: Kind, name: String },

    #[error("VM {vm} not found in experiment {experiment}")]
    VmNotFound { experiment: String, vm: String },

    #[error("experiment {name} is already running (started at {started})")]
    AlreadyRunning { name: String, started: String },

    #[error("experiment {0} is not running")]
    NotRunning(String),

    #[error("scenario {scenario} is for topology {expected}, not {topology}")]
    Mismatch {
        scenario: String,
        expected: String,
        topology: String,
    },

    #[error("scenario verification failed: {}", .0.join("; "))]
    Verification(Vec<String>),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("no upgrader found for {0}")]
    NoUpgraderFound(String),

    #[error("upgrade failed: {0}")]
    UpgradeFailed(#[source] TypesError),

    #[error("scheduling failed: {0}")]
    Scheduling(#[from] SchedulerError),

    #[error("app pipeline failed: {0}")]
    AppFailure(#[from] AppError),

    #[error("cluster backend failed: {0}")]
    Backend(#[from] ClusterError),

    #[error(transparent)]
    LockConflict(#[from] LockError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store error: {0}")]
    Store(#[source] StoreError),

    #[error("operation aborted: {0}")]
    Aborted(String),
}

impl ExperimentError {
    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExperimentError::LockConflict(_))
    }
}

impl From<StoreError> for ExperimentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, name } => ExperimentError::NotFound { kind, name },
            StoreError::AlreadyExists { kind, name } => ExperimentError::AlreadyExists { kind, name },
            other => ExperimentError::Store(other),
        }
    }
}

impl From<TypesError> for ExperimentError {
    fn from(err: TypesError) -> Self {
        match err {
            TypesError::NoUpgraderFound(key) => ExperimentError::NoUpgraderFound(key),
            TypesError::Validation(problems) => ExperimentError::ValidationFailed(problems.join("; ")),
            TypesError::NodeNotFound(_) | TypesError::Vlan(_) => ExperimentError::InvalidRequest(err.to_string()),
            e @ (TypesError::UpgradeFailed { .. } | TypesError::Irrecoverable { .. } | TypesError::DuplicateUpgrader(_)) => {
                ExperimentError::UpgradeFailed(e)
            }
            other => ExperimentError::ValidationFailed(other.to_string()),
        }
    }
}

/// An error returned across the control-plane boundary, tagged with a
/// correlation ID that also appears in the server-side log entry.
#[derive(Debug)]
pub struct Failure {
    id: Uuid,
    error: ExperimentError,
}

impl Failure {
    /// Assign a correlation ID and log the error, with its full source
    /// chain, under it.
    pub fn new(error: ExperimentError) -> Self {
        let id = Uuid::new_v4();
        error!(
            correlation_id = %id,
            retryable = error.is_retryable(),
            error = %error,
            detail = ?error,
            "request failed"
        );
        Self { id, error }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn error(&self) -> &ExperimentError {
        &self.error
    }

    pub fn into_error(self) -> ExperimentError {
        self.error
    }

    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ref {})", self.error, self.id)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<ExperimentError> for Failure {
    fn from(error: ExperimentError) -> Self {
        Failure::new(error)
    }
}
