use thiserror::Error;

use crate::key::LockStatus;

pub type LockResult<T> = Result<T, LockError>;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("{key} is locked ({status})")]
    Conflict { key: String, status: LockStatus },
}
