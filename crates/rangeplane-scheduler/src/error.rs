use rangeplane_cluster::ClusterError;
use rangeplane_types::TypesError;
use thiserror::Error;

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler {0} not found")]
    NotFound(String),

    #[error("scheduler {0} is already registered")]
    Duplicate(String),

    #[error("no VMs defined for experiment")]
    NoNodes,

    #[error("no schedulable hosts")]
    NoHosts,

    #[error("node {0} has no network interfaces")]
    NoInterfaces(String),

    #[error("no feasible placement: {0}")]
    Infeasible(String),

    #[error("scheduler {scheduler} left node {node} unassigned")]
    Incomplete { scheduler: String, node: String },

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Spec(#[from] TypesError),
}
